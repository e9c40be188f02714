//! Rate-limited queues.
//!
//! A rate-limited queue is paused by renaming its live list to a paused twin
//! and resumed by renaming it back. Nothing else records the state, so there
//! is no flag that can disagree with where the jobs actually are.
//!
//! - [`StateMachine`]: pause / resume / is_paused on one queue
//! - [`RateLimitedQueue`]: lock-guarded enqueue / requeue on top of it
//! - [`ResumeScheduler`] + [`ResumeJob`]: delayed, persisted resume

mod coordinator;
mod resume;
mod state_machine;

pub use self::coordinator::{Execution, RateLimitedQueue};
pub use self::resume::{RESUME_HANDLER, ResumeJob, ResumeScheduler};
pub use self::state_machine::StateMachine;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{JobId, QueueIdentity};
use crate::error::CooldownError;
use crate::registry::Registry;

/// Capability of a queue that can be paused when its upstream API pushes back.
///
/// Implemented once, by [`RateLimitedQueue`]; provider adapters hold one
/// rather than re-implementing it.
#[async_trait]
pub trait RateLimitable: Send + Sync {
    fn queue(&self) -> &QueueIdentity;

    /// Park the live queue under the coordinator lease. `false` when there
    /// was nothing to park.
    async fn pause(&self) -> Result<bool, CooldownError>;

    /// Release the paused queue under the coordinator lease. `false` when
    /// there was nothing to release.
    async fn resume(&self) -> Result<bool, CooldownError>;

    async fn is_paused(&self, default_if_unknown: bool) -> Result<bool, CooldownError>;

    /// Submit a new job; an unknown state counts as active.
    async fn enqueue(&self, handler: &str, args: Vec<Value>) -> Result<JobId, CooldownError>;

    /// Re-submit a job that just hit a rate limit; an unknown state counts
    /// as paused.
    async fn requeue(&self, handler: &str, args: Vec<Value>) -> Result<JobId, CooldownError>;
}

/// Owners that resume timers can name.
pub type OwnerRegistry = Registry<dyn RateLimitable>;
