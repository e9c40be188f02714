//! Redis-backed ports (feature `redis`).
//!
//! Key layout matches Resque: every queue is a Redis list under
//! `<prefix><queue>`, and pause/resume is `RENAMENX` between the live and the
//! paused list.
//!
//! The blocking `redis::Connection` is driven from `spawn_blocking`, so none of
//! these block the async runtime. One connection is opened per operation.

mod mutex;
mod scheduler;
mod store;

pub use self::mutex::RedisMutex;
pub use self::scheduler::RedisScheduler;
pub use self::store::RedisQueueStore;

use std::sync::Arc;

use crate::ports::StoreError;

/// Run `op` on a fresh connection inside the blocking pool.
pub(crate) async fn with_connection<T, F>(client: &Arc<redis::Client>, op: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&mut redis::Connection) -> Result<T, StoreError> + Send + 'static,
{
    let client = Arc::clone(client);
    tokio::task::spawn_blocking(move || {
        let mut conn = client
            .get_connection()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        op(&mut conn)
    })
    .await
    .map_err(|e| StoreError::Command(format!("redis worker task failed: {e}")))?
}

pub(crate) fn command_error(err: redis::RedisError) -> StoreError {
    if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        StoreError::Connection(err.to_string())
    } else {
        StoreError::Command(err.to_string())
    }
}

pub(crate) fn open_client(url: &str) -> Result<Arc<redis::Client>, StoreError> {
    redis::Client::open(url)
        .map(Arc::new)
        .map_err(|e| StoreError::Connection(e.to_string()))
}
