//! QueueStore port - 名前付き FIFO キューと atomic rename
//!
//! # 設計原則
//! - キュー名（論理名）で enqueue/dequeue する
//! - 物理キー（prefix 付き）で exists / rename を行う
//! - rename は「宛先が無く、元が有る」ときだけ成功する（上書きしない）

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::JobEnvelope;

/// Result of a rename-if-absent attempt.
///
/// Both refusals are values, not errors: they are the expected answers when a
/// queue is empty or already in the requested state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,

    /// The source key does not exist.
    SourceMissing,

    /// The destination key already exists; nothing was overwritten.
    TargetExists,
}

/// Fatal store failures. Never interpreted as queue state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("store command error: {0}")]
    Command(String),

    #[error("envelope serialization error: {0}")]
    Serialization(String),
}

/// Backing queue store.
///
/// Empty queues must not exist: once the last envelope is removed the key is
/// gone, exactly like a Redis list.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append an envelope to the tail of `queue` (a logical name).
    async fn enqueue(&self, queue: &str, envelope: JobEnvelope) -> Result<(), StoreError>;

    /// Pop the head of `queue`, if any.
    async fn dequeue(&self, queue: &str) -> Result<Option<JobEnvelope>, StoreError>;

    /// Does the physical `key` exist?
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically rename `src` to `dst` when `src` exists and `dst` does not.
    async fn rename_if_absent(&self, src: &str, dst: &str) -> Result<RenameOutcome, StoreError>;

    /// Number of envelopes under the physical `key` (0 when absent).
    async fn len(&self, key: &str) -> Result<usize, StoreError>;
}
