use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::domain::JobId;
use crate::error::JobError;
use crate::ports::QueueStore;
use crate::runtime::Dispatcher;

/// Pulls envelopes off queues and runs them through the dispatcher.
///
/// Dequeue is destructive: a job that fails here is not retried by the
/// worker. Rate-limited jobs come back only because their adapter requeued
/// them.
pub struct Worker {
    store: Arc<dyn QueueStore>,
    dispatcher: Dispatcher,
}

impl Worker {
    pub fn new(store: Arc<dyn QueueStore>, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Run the first available job, polling `queues` in order.
    ///
    /// `Ok(None)` when every queue was empty.
    pub async fn work_one(&self, queues: &[String]) -> Result<Option<JobId>, JobError> {
        for queue in queues {
            let Some(envelope) = self.store.dequeue(queue).await? else {
                continue;
            };
            let id = envelope.id();
            debug!(job = %id, queue = %queue, handler = %envelope.handler(), "job dequeued");

            if let Err(err) = self.dispatcher.execute(&envelope).await {
                warn!(job = %id, queue = %queue, handler = %envelope.handler(), error = %err, "job failed");
                return Err(err);
            }
            return Ok(Some(id));
        }
        Ok(None)
    }
}

/// Worker group handle.
/// - `request_shutdown()` で全ワーカーが新しいジョブを取らなくなる
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers sharing `worker`, each polling `queues` in order.
    pub fn spawn(n: usize, worker: Arc<Worker>, queues: Vec<String>, idle: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let queues: Arc<[String]> = queues.into();

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let worker = Arc::clone(&worker);
            let queues = Arc::clone(&queues);
            let mut rx = shutdown_rx.clone();

            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, worker, &queues, idle, &mut rx).await;
            }));
        }

        Self { shutdown_tx, joins }
    }

    /// In-flight jobs finish; no new ones are taken.
    pub fn request_shutdown(&self) {
        // receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(err) = join.await {
                error!(error = %err, "worker task panicked");
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    worker: Arc<Worker>,
    queues: &[String],
    idle: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    debug!(worker_id, ?queues, "worker started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match worker.work_one(queues).await {
            Ok(Some(_)) => continue,
            // 失敗はログ済み。次のジョブへ
            Err(_) => continue,
            Ok(None) => {}
        }

        // 何もなければ少し待つ。shutdown が来たら即座に抜ける
        tokio::select! {
            _ = shutdown_rx.changed() => {}
            _ = tokio::time::sleep(idle) => {}
        }
    }
    debug!(worker_id, "worker stopped");
}
