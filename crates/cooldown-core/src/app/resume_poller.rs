//! ResumePoller - 期限が来た遅延ジョブを本来のキューへ移す
//!
//! # 設計
//! - 1 回分の処理は `promote_due()`（テストでは ManualClock と組み合わせて直接呼ぶ）
//! - enqueue に失敗したジョブは同じ発火時刻で再登録し、次の周回で再試行する

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::ports::{Clock, QueueStore, SchedulerBackend, StoreError};

pub struct ResumePoller {
    backend: Arc<dyn SchedulerBackend>,
    store: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl ResumePoller {
    pub fn new(
        backend: Arc<dyn SchedulerBackend>,
        store: Arc<dyn QueueStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            backend,
            store,
            clock,
            interval,
        }
    }

    /// Move every due job into its queue. Returns how many were moved.
    pub async fn promote_due(&self) -> Result<usize, StoreError> {
        let due = self.backend.take_due(self.clock.now()).await?;
        let mut promoted = 0;

        for job in due {
            let id = job.envelope.id();
            match self.store.enqueue(&job.queue, job.envelope.clone()).await {
                Ok(()) => {
                    debug!(job = %id, queue = %job.queue, "delayed job promoted");
                    promoted += 1;
                }
                Err(err) => {
                    warn!(job = %id, queue = %job.queue, error = %err, "promotion failed; rescheduling");
                    if let Err(err) = self
                        .backend
                        .schedule_at(job.fire_at, &job.queue, job.envelope)
                        .await
                    {
                        error!(job = %id, error = %err, "delayed job lost");
                    }
                }
            }
        }
        Ok(promoted)
    }

    pub fn spawn(self) -> PollerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                if let Err(err) = self.promote_due().await {
                    warn!(error = %err, "resume poll failed");
                }
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
        });
        PollerHandle { shutdown_tx, join }
    }
}

pub struct PollerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl PollerHandle {
    pub async fn shutdown_and_join(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.join.await {
            error!(error = %err, "resume poller panicked");
        }
    }
}
