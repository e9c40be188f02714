use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{RateLimitable, StateMachine};
use crate::config::{CooldownConfig, ExecutionMode, LeaseConfig};
use crate::domain::{JobEnvelope, JobId, QueueIdentity, QueueState};
use crate::error::{CooldownError, JobError};
use crate::ports::{DistributedMutex, QueueStore, with_lock};

/// Result of [`RateLimitedQueue::around_execution`].
#[derive(Debug, PartialEq, Eq)]
pub enum Execution<T> {
    /// The queue was active and the body ran.
    Ran(T),

    /// The queue was paused; the job went to the paused queue instead.
    Parked,
}

/// Lock-guarded routing of submissions into the live or the paused queue.
///
/// The lease is one per coordinator configuration (`LeaseConfig::name`), not
/// per queue: pause/resume are rare and fast, so one lock is enough.
pub struct RateLimitedQueue {
    machine: StateMachine,
    store: Arc<dyn QueueStore>,
    mutex: Arc<dyn DistributedMutex>,
    lease: LeaseConfig,
    mode: ExecutionMode,
}

impl RateLimitedQueue {
    pub fn new(
        name: impl Into<String>,
        config: &CooldownConfig,
        store: Arc<dyn QueueStore>,
        mutex: Arc<dyn DistributedMutex>,
    ) -> Self {
        let queue = QueueIdentity::new(name, &config.keys);
        Self {
            machine: StateMachine::new(queue, Arc::clone(&store), config.mode),
            store,
            mutex,
            lease: config.lease.clone(),
            mode: config.mode,
        }
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.machine
    }

    pub async fn state(&self) -> Result<QueueState, CooldownError> {
        self.machine.state().await
    }

    /// Guard for a job that is about to run.
    ///
    /// If the queue was paused after this job was dequeued, the job is
    /// re-submitted to the paused queue and `body` is not run.
    pub async fn around_execution<T, F, Fut>(
        &self,
        handler: &str,
        args: &[Value],
        body: F,
    ) -> Result<Execution<T>, JobError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, JobError>>,
    {
        let parked = self
            .locked(|| async {
                let paused = self.machine.is_paused(false).await?;
                if paused {
                    let envelope = JobEnvelope::new(handler, args.to_vec());
                    self.store
                        .enqueue(self.queue().paused_name(), envelope)
                        .await?;
                }
                Ok::<bool, CooldownError>(paused)
            })
            .await?;

        if parked {
            debug!(queue = %self.queue().name(), handler, "queue paused; job parked before running");
            return Ok(Execution::Parked);
        }
        body().await.map(Execution::Ran)
    }

    #[instrument(
        name = "rate_limited.submit",
        skip(self, args),
        fields(queue = %self.machine.queue().name())
    )]
    async fn submit(
        &self,
        handler: &str,
        args: Vec<Value>,
        default_if_unknown: bool,
    ) -> Result<JobId, CooldownError> {
        let envelope = JobEnvelope::new(handler, args);
        let id = envelope.id();

        self.locked(|| async move {
            let paused = self.machine.is_paused(default_if_unknown).await?;
            let target = if paused {
                self.queue().paused_name()
            } else {
                self.queue().name()
            };
            self.store.enqueue(target, envelope).await?;
            debug!(job = %id, routed_to = target, paused, "job routed");
            Ok(id)
        })
        .await
    }

    async fn locked<T, F, Fut>(&self, body: F) -> Result<T, CooldownError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CooldownError>>,
    {
        match self.mode {
            ExecutionMode::Synchronous => body().await,
            ExecutionMode::Queued => with_lock(self.mutex.as_ref(), &self.lease, body).await,
        }
    }
}

#[async_trait]
impl RateLimitable for RateLimitedQueue {
    fn queue(&self) -> &QueueIdentity {
        self.machine.queue()
    }

    // rename はリース内で行う。enqueue の状態確認と push の間に割り込ませない
    async fn pause(&self) -> Result<bool, CooldownError> {
        self.locked(|| self.machine.pause()).await
    }

    async fn resume(&self) -> Result<bool, CooldownError> {
        self.locked(|| self.machine.resume()).await
    }

    async fn is_paused(&self, default_if_unknown: bool) -> Result<bool, CooldownError> {
        self.machine.is_paused(default_if_unknown).await
    }

    async fn enqueue(&self, handler: &str, args: Vec<Value>) -> Result<JobId, CooldownError> {
        self.submit(handler, args, false).await
    }

    async fn requeue(&self, handler: &str, args: Vec<Value>) -> Result<JobId, CooldownError> {
        // このジョブが最後の 1 件だった場合、キューは空（Unknown）になっている。
        // その場合は paused 扱いにして、即時再実行の空回りを避ける
        self.submit(handler, args, true).await
    }
}
