//! Provider adapters
//!
//! 1 つの外部 API につき 1 つの rate-limited キューを持ち、
//! そこに流れるジョブを実行して、API からの「待て」を pause + 遅延 resume + requeue に変換する。
//!
//! # エンベロープ形式
//! - handler = アダプタ自身の名前
//! - args = `[実際に呼ぶ handler 名, 元の引数...]`
//!
//! # プロバイダ固有の部分
//! - キュー名と「どのエラーが rate limit か」だけ（[`RateLimitClassifier`]）

pub mod angellist;
pub mod evernote;
pub mod twitter;

pub use self::angellist::{AngellistClassifier, AngellistError, AngellistQueue};
pub use self::evernote::{EdamErrorCode, EdamSystemException, EvernoteClassifier, EvernoteQueue};
pub use self::twitter::{TwitterClassifier, TwitterError, TwitterQueue};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::domain::JobId;
use crate::error::{CooldownError, JobError};
use crate::ports::Clock;
use crate::rate_limited::{Execution, RateLimitable, RateLimitedQueue, ResumeScheduler};
use crate::runtime::{Dispatcher, HandlerRef, JobHandler};

/// What a provider error means for the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Stop the queue. `None` means the provider did not say for how long.
    RateLimited { retry_after: Option<Duration> },
    Other,
}

pub trait RateLimitClassifier: Send + Sync + 'static {
    /// Queue every job of this provider goes through.
    const QUEUE: &'static str;

    fn classify(&self, error: &JobError) -> Classification;
}

/// Collaborators shared by every adapter in a process.
#[derive(Clone)]
pub struct AdapterContext {
    pub resume: Arc<ResumeScheduler>,

    /// Resolves the handlers adapters wrap (never the adapters themselves).
    pub bodies: Dispatcher,

    pub clock: Arc<dyn Clock>,
    pub default_cooldown: Duration,
}

/// Adapter for one rate-limited provider.
pub struct ApiQueue<C: RateLimitClassifier> {
    name: String,
    classifier: C,
    queue: Arc<RateLimitedQueue>,
    context: AdapterContext,
}

impl<C: RateLimitClassifier> ApiQueue<C> {
    /// `name` is both the adapter's handler name and the owner name resume
    /// timers use, so it must be registered in both registries.
    pub fn new(
        name: impl Into<String>,
        classifier: C,
        queue: Arc<RateLimitedQueue>,
        context: AdapterContext,
    ) -> Self {
        Self {
            name: name.into(),
            classifier,
            queue,
            context,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> &Arc<RateLimitedQueue> {
        &self.queue
    }

    /// Submit `handler(args...)` through this provider's queue.
    pub async fn enqueue(&self, handler: &str, args: Vec<Value>) -> Result<JobId, CooldownError> {
        self.queue.enqueue(&self.name, wrap_target(handler, args)).await
    }

    /// Pause the queue and schedule its resume at `fire_at`.
    ///
    /// The resume is scheduled even when the pause found nothing to move:
    /// another worker may have paused first, and its timer may not exist.
    pub async fn pause_until(&self, fire_at: DateTime<Utc>) -> Result<bool, CooldownError> {
        let paused = self.queue.pause().await?;
        let scheduled = self.context.resume.schedule_resume(fire_at, &self.name).await?;
        info!(adapter = %self.name, paused, scheduled, %fire_at, "rate limited; queue paused");
        Ok(scheduled)
    }

    async fn cool_down(&self, retry_after: Option<Duration>, args: &[Value]) -> Result<(), JobError> {
        let cooldown = retry_after.unwrap_or(self.context.default_cooldown);
        let fire_at = chrono::Duration::from_std(cooldown)
            .ok()
            .and_then(|delta| self.context.clock.now().checked_add_signed(delta))
            .ok_or_else(|| JobError::failed(format!("cool-down out of range: {cooldown:?}")))?;

        self.pause_until(fire_at).await?;
        self.queue.requeue(&self.name, args.to_vec()).await?;
        Ok(())
    }
}

/// Adapter envelope args: the target handler name, then its own args.
pub fn wrap_target(handler: &str, args: Vec<Value>) -> Vec<Value> {
    let mut wrapped = Vec::with_capacity(args.len() + 1);
    wrapped.push(json!(handler));
    wrapped.extend(args);
    wrapped
}

fn split_target(args: &[Value]) -> Result<(&str, &[Value]), JobError> {
    match args.split_first() {
        Some((Value::String(target), rest)) => Ok((target.as_str(), rest)),
        _ => Err(JobError::InvalidArguments(format!(
            "adapter jobs start with the target handler name, got {args:?}"
        ))),
    }
}

#[async_trait]
impl<C: RateLimitClassifier> JobHandler for ApiQueue<C> {
    #[instrument(name = "adapter.perform", skip_all, fields(adapter = %self.name))]
    async fn perform(&self, args: &[Value]) -> Result<(), JobError> {
        let (target, params) = split_target(args)?;
        let bodies = &self.context.bodies;

        let outcome = self
            .queue
            .around_execution(&self.name, args, || {
                bodies.dispatch(HandlerRef::named(target), params)
            })
            .await;

        let err = match outcome {
            Ok(Execution::Ran(())) | Ok(Execution::Parked) => return Ok(()),
            Err(err) => err,
        };
        match self.classifier.classify(&err) {
            Classification::RateLimited { retry_after } => self.cool_down(retry_after, args).await,
            Classification::Other => {
                warn!(target_handler = target, error = %err, "job failed");
                Err(err)
            }
        }
    }
}
