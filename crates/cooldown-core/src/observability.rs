//! Logging setup and status views.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::domain::QueueState;
use crate::error::CooldownError;
use crate::ports::QueueStore;
use crate::rate_limited::{RateLimitable, RateLimitedQueue};

/// Initialize tracing for the process, filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub queue: String,
    pub state: QueueState,
    pub live_len: usize,
    pub paused_len: usize,
}

impl QueueSnapshot {
    /// Read both physical keys of `queue`.
    ///
    /// Not atomic: a rename between the reads can show the same jobs twice
    /// or not at all. Good enough for status output.
    pub async fn capture(
        queue: &RateLimitedQueue,
        store: &dyn QueueStore,
    ) -> Result<Self, CooldownError> {
        let identity = queue.queue();
        Ok(Self {
            queue: identity.name().to_string(),
            state: queue.state().await?,
            live_len: store.len(identity.live_key()).await?,
            paused_len: store.len(identity.paused_key()).await?,
        })
    }

    pub fn total(&self) -> usize {
        self.live_len + self.paused_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryQueueStore;
    use crate::test_support::rate_limited_queue;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn init_twice_is_harmless() {
        init();
        init();
    }

    #[tokio::test]
    async fn snapshot_follows_the_jobs_across_a_pause() {
        let store = Arc::new(InMemoryQueueStore::default());
        let queue = rate_limited_queue("snap", store.clone());
        queue.enqueue("Echo", vec![json!(1)]).await.unwrap();
        queue.enqueue("Echo", vec![json!(2)]).await.unwrap();

        let before = QueueSnapshot::capture(&queue, store.as_ref()).await.unwrap();
        queue.pause().await.unwrap();
        let after = QueueSnapshot::capture(&queue, store.as_ref()).await.unwrap();

        assert_eq!((before.state, before.live_len, before.paused_len), (QueueState::Active, 2, 0));
        assert_eq!((after.state, after.live_len, after.paused_len), (QueueState::Paused, 0, 2));
        assert_eq!(after.total(), before.total());
        assert_eq!(
            serde_json::to_value(&after).unwrap()["state"],
            json!("paused")
        );
    }
}
