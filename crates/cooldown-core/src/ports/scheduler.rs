//! SchedulerBackend port - 永続化された遅延実行
//!
//! resume タイマーはプロセス外に保存される必要がある（別プロセスで発火しうる）。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::queue_store::StoreError;
use crate::domain::JobEnvelope;

/// An envelope waiting for its fire time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledJob {
    pub fire_at: DateTime<Utc>,
    pub queue: String,
    pub envelope: JobEnvelope,
}

#[async_trait]
pub trait SchedulerBackend: Send + Sync {
    /// Capability check. When false, nothing should be scheduled.
    fn supports_delayed_dispatch(&self) -> bool;

    /// Persist `envelope` to be delivered to `queue` at `fire_at`.
    async fn schedule_at(
        &self,
        fire_at: DateTime<Utc>,
        queue: &str,
        envelope: JobEnvelope,
    ) -> Result<(), StoreError>;

    /// Remove and return every job whose fire time is at or before `now`.
    ///
    /// Each scheduled job is handed to exactly one caller, even with several
    /// pollers racing.
    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>, StoreError>;
}
