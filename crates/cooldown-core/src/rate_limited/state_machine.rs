use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::ExecutionMode;
use crate::domain::{QueueIdentity, QueueState};
use crate::error::CooldownError;
use crate::ports::{QueueStore, RenameOutcome};

/// Pause/resume state of exactly one queue, expressed only through the
/// store's rename and existence primitives.
///
/// The rename is atomic in the store, but it must not land between another
/// writer's state check and its push. `RateLimitedQueue` runs both under the
/// coordinator lease; use it rather than these primitives directly.
#[derive(Clone)]
pub struct StateMachine {
    queue: QueueIdentity,
    store: Arc<dyn QueueStore>,
    mode: ExecutionMode,
}

impl StateMachine {
    pub fn new(queue: QueueIdentity, store: Arc<dyn QueueStore>, mode: ExecutionMode) -> Self {
        Self { queue, store, mode }
    }

    pub fn queue(&self) -> &QueueIdentity {
        &self.queue
    }

    /// Rename live -> paused.
    pub async fn pause(&self) -> Result<bool, CooldownError> {
        self.transition(self.queue.live_key(), self.queue.paused_key(), "pause")
            .await
    }

    /// Rename paused -> live, releasing every parked job at once.
    pub async fn resume(&self) -> Result<bool, CooldownError> {
        self.transition(self.queue.paused_key(), self.queue.live_key(), "resume")
            .await
    }

    /// Derived state. The live key is checked first; the paused key only
    /// when the live key is absent.
    pub async fn state(&self) -> Result<QueueState, CooldownError> {
        if self.store.exists(self.queue.live_key()).await? {
            return Ok(QueueState::Active);
        }
        if self.store.exists(self.queue.paused_key()).await? {
            return Ok(QueueState::Paused);
        }
        Ok(QueueState::Unknown)
    }

    /// `default_if_unknown` is returned when neither key exists.
    pub async fn is_paused(&self, default_if_unknown: bool) -> Result<bool, CooldownError> {
        if self.mode == ExecutionMode::Synchronous {
            return Ok(false);
        }
        Ok(self.state().await?.is_paused_or(default_if_unknown))
    }

    async fn transition(
        &self,
        src: &str,
        dst: &str,
        action: &'static str,
    ) -> Result<bool, CooldownError> {
        match self.store.rename_if_absent(src, dst).await? {
            RenameOutcome::Renamed => {
                info!(queue = %self.queue.name(), action, "queue transitioned");
                Ok(true)
            }
            RenameOutcome::SourceMissing => {
                debug!(queue = %self.queue.name(), action, key = %src, "nothing to rename");
                Ok(false)
            }
            RenameOutcome::TargetExists => {
                // 両方のキーが存在する = 不変条件違反。自動修復はしない
                let src_len = self.store.len(src).await?;
                let dst_len = self.store.len(dst).await?;
                error!(
                    queue = %self.queue.name(),
                    action,
                    src = %src,
                    dst = %dst,
                    src_len,
                    dst_len,
                    "rename refused: live and paused keys both exist"
                );
                Ok(false)
            }
        }
    }
}
