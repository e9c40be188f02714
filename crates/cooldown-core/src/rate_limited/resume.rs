use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{OwnerRegistry, RateLimitable};
use crate::domain::JobEnvelope;
use crate::error::{CooldownError, JobError};
use crate::ports::SchedulerBackend;
use crate::runtime::JobHandler;

/// Handler name under which [`ResumeJob`] is registered.
pub const RESUME_HANDLER: &str = "Cooldown::Resume";

/// Schedules and fires delayed resumes.
///
/// A resume timer only stores the owner's *name*: it may fire in another
/// process, where the owner is looked up again in that process's registry.
pub struct ResumeScheduler {
    backend: Arc<dyn SchedulerBackend>,
    owners: Arc<OwnerRegistry>,
    resume_queue: Option<String>,
}

impl ResumeScheduler {
    pub fn new(
        backend: Arc<dyn SchedulerBackend>,
        owners: Arc<OwnerRegistry>,
        resume_queue: Option<String>,
    ) -> Self {
        Self {
            backend,
            owners,
            resume_queue,
        }
    }

    pub fn owners(&self) -> &OwnerRegistry {
        &self.owners
    }

    pub fn resume_queue(&self) -> Option<&str> {
        self.resume_queue.as_deref()
    }

    /// Register a one-shot resume of `owner` at `fire_at`.
    ///
    /// Returns `false` without scheduling anything when the backend cannot
    /// delay jobs or no resume queue is configured; the owner then stays
    /// paused until resumed by hand.
    pub async fn schedule_resume(
        &self,
        fire_at: DateTime<Utc>,
        owner: &str,
    ) -> Result<bool, CooldownError> {
        // 発火時に解決できない名前は、ここで弾いておく
        self.resolve_owner(owner)?;

        let Some(queue) = self.resume_queue.as_deref() else {
            debug!(owner, "no resume queue configured; resume not scheduled");
            return Ok(false);
        };
        if !self.backend.supports_delayed_dispatch() {
            debug!(owner, "scheduler backend cannot delay jobs; resume not scheduled");
            return Ok(false);
        }

        let envelope = JobEnvelope::new(RESUME_HANDLER, vec![json!(owner)]);
        self.backend.schedule_at(fire_at, queue, envelope).await?;
        info!(owner, %fire_at, queue, "resume scheduled");
        Ok(true)
    }

    pub fn resolve_owner(&self, name: &str) -> Result<Arc<dyn RateLimitable>, CooldownError> {
        self.owners.resolve(name)
    }

    /// Resume the named owner. Firing twice is harmless: the second rename
    /// finds nothing to move.
    pub async fn on_fire(&self, owner: &str) -> Result<bool, CooldownError> {
        let resumed = self.resolve_owner(owner)?.resume().await?;
        debug!(owner, resumed, "resume timer fired");
        Ok(resumed)
    }
}

/// The job a resume timer enqueues. `args[0]` is the owner name.
pub struct ResumeJob {
    scheduler: Arc<ResumeScheduler>,
}

impl ResumeJob {
    pub fn new(scheduler: Arc<ResumeScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl JobHandler for ResumeJob {
    async fn perform(&self, args: &[Value]) -> Result<(), JobError> {
        let owner = args.first().and_then(Value::as_str).ok_or_else(|| {
            JobError::InvalidArguments(format!(
                "{RESUME_HANDLER} expects the owner name as its first argument, got {args:?}"
            ))
        })?;
        self.scheduler.on_fire(owner).await?;
        Ok(())
    }
}
