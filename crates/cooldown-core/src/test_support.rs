//! Shared test doubles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Notify, Semaphore};

use crate::config::{CooldownConfig, LeaseConfig};
use crate::domain::JobEnvelope;
use crate::error::JobError;
use crate::impls::{InMemoryMutex, InMemoryQueueStore};
use crate::ports::{QueueStore, RenameOutcome, StoreError};
use crate::rate_limited::RateLimitedQueue;
use crate::runtime::JobHandler;

/// Config with short lease timings.
pub fn fast_config() -> CooldownConfig {
    CooldownConfig {
        lease: LeaseConfig {
            wait_secs: 2,
            expire_secs: 10,
            poll_interval_ms: 5,
            ..LeaseConfig::default()
        },
        resume_queue: Some("unpause".to_string()),
        ..CooldownConfig::default()
    }
}

pub fn rate_limited_queue(name: &str, store: Arc<dyn QueueStore>) -> Arc<RateLimitedQueue> {
    Arc::new(RateLimitedQueue::new(
        name,
        &fast_config(),
        store,
        Arc::new(InMemoryMutex::default()),
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Enqueue {
        queue: String,
        handler: String,
        args: Vec<Value>,
    },
    Dequeue(String),
    Exists(String),
    Rename(String, String),
    Len(String),
}

/// In-memory store that records every call and can be told to fail.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryQueueStore,
    calls: Mutex<Vec<StoreCall>>,
    rename_failure: Mutex<Option<String>>,
    exists_failure: Mutex<Option<String>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryQueueStore {
        &self.inner
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_renames_with(&self, message: &str) {
        *self.rename_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_exists_with(&self, message: &str) {
        *self.exists_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Put one job into `queue` without recording it.
    pub async fn seed(&self, queue: &str) {
        self.inner
            .enqueue(queue, JobEnvelope::new("Seed", vec![]))
            .await
            .unwrap();
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl QueueStore for RecordingStore {
    async fn enqueue(&self, queue: &str, envelope: JobEnvelope) -> Result<(), StoreError> {
        self.record(StoreCall::Enqueue {
            queue: queue.to_string(),
            handler: envelope.handler().to_string(),
            args: envelope.args().to_vec(),
        });
        self.inner.enqueue(queue, envelope).await
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<JobEnvelope>, StoreError> {
        self.record(StoreCall::Dequeue(queue.to_string()));
        self.inner.dequeue(queue).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.record(StoreCall::Exists(key.to_string()));
        if let Some(message) = self.exists_failure.lock().unwrap().clone() {
            return Err(StoreError::Command(message));
        }
        self.inner.exists(key).await
    }

    async fn rename_if_absent(&self, src: &str, dst: &str) -> Result<RenameOutcome, StoreError> {
        self.record(StoreCall::Rename(src.to_string(), dst.to_string()));
        if let Some(message) = self.rename_failure.lock().unwrap().clone() {
            return Err(StoreError::Command(message));
        }
        self.inner.rename_if_absent(src, dst).await
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        self.record(StoreCall::Len(key.to_string()));
        self.inner.len(key).await
    }
}

/// Store whose pushes onto one queue can be held mid-flight.
pub struct GatedStore {
    inner: Arc<InMemoryQueueStore>,
    gated: String,
    closed: AtomicBool,
    entered: Notify,
    gate: Semaphore,
}

impl GatedStore {
    pub fn new(inner: Arc<InMemoryQueueStore>, gated: &str) -> Self {
        Self {
            inner,
            gated: gated.to_string(),
            closed: AtomicBool::new(false),
            entered: Notify::new(),
            gate: Semaphore::new(0),
        }
    }

    /// Hold the next push onto the gated queue until [`GatedStore::open`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn open(&self) {
        self.closed.store(false, Ordering::SeqCst);
        self.gate.add_permits(1);
    }

    /// Resolves once a push is being held.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }
}

#[async_trait]
impl QueueStore for GatedStore {
    async fn enqueue(&self, queue: &str, envelope: JobEnvelope) -> Result<(), StoreError> {
        if queue == self.gated && self.closed.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.gate.acquire().await.unwrap().forget();
        }
        self.inner.enqueue(queue, envelope).await
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<JobEnvelope>, StoreError> {
        self.inner.dequeue(queue).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    async fn rename_if_absent(&self, src: &str, dst: &str) -> Result<RenameOutcome, StoreError> {
        self.inner.rename_if_absent(src, dst).await
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        self.inner.len(key).await
    }
}

/// Records the args of every call and succeeds.
#[derive(Default)]
pub struct CountingHandler {
    calls: Mutex<Vec<Vec<Value>>>,
}

impl CountingHandler {
    pub fn calls(&self) -> Vec<Vec<Value>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobHandler for CountingHandler {
    async fn perform(&self, args: &[Value]) -> Result<(), JobError> {
        self.calls.lock().unwrap().push(args.to_vec());
        Ok(())
    }
}

/// Always fails with `JobError::Failed`.
pub struct FailingHandler {
    message: String,
}

impl FailingHandler {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl JobHandler for FailingHandler {
    async fn perform(&self, _args: &[Value]) -> Result<(), JobError> {
        Err(JobError::failed(self.message.clone()))
    }
}
