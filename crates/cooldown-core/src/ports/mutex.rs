//! DistributedMutex port - プロセス間の排他制御
//!
//! acquire は最大待ち時間つき、lease は自動失効つき。
//! 保持者がクラッシュしても expire 後には他の worker が取得できる。

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::config::LeaseConfig;
use crate::domain::LeaseToken;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out after {waited:?} waiting for lock {name}")]
    Timeout { name: String, waited: Duration },

    #[error("lock backend error: {0}")]
    Backend(String),
}

/// A held lock. Only the token that acquired it can release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    name: String,
    token: LeaseToken,
}

impl LockLease {
    pub fn new(name: impl Into<String>, token: LeaseToken) -> Self {
        Self {
            name: name.into(),
            token,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> LeaseToken {
        self.token
    }
}

#[async_trait]
pub trait DistributedMutex: Send + Sync {
    /// Block up to `wait` for the named lock; the lease lapses after `expire`.
    async fn acquire(
        &self,
        name: &str,
        wait: Duration,
        expire: Duration,
    ) -> Result<LockLease, LockError>;

    /// Release a lease. Releasing an already expired lease is not an error.
    async fn release(&self, lease: LockLease) -> Result<(), LockError>;
}

/// Run `body` while holding the configured lock.
///
/// The lease is released on every exit path. If both the body and the release
/// fail, the body's error wins and the release failure is logged.
pub async fn with_lock<T, E, F, Fut>(
    mutex: &dyn DistributedMutex,
    config: &LeaseConfig,
    body: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<LockError>,
{
    let lease = mutex
        .acquire(&config.name, config.wait(), config.expire())
        .await?;

    let result = body().await;

    match (result, mutex.release(lease).await) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release_err)) => Err(release_err.into()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(release_err)) => {
            warn!(lock = %config.name, error = %release_err, "lease release failed after body error");
            Err(err)
        }
    }
}
