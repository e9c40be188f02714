use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::Instant;

use super::{open_client, with_connection};
use crate::domain::LeaseToken;
use crate::ports::{DistributedMutex, LockError, LockLease, StoreError};

/// Deletes the key only if it still holds our token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// `SET name token NX PX expire` lock with polling acquisition.
#[derive(Clone)]
pub struct RedisMutex {
    client: Arc<redis::Client>,
    poll_interval: Duration,
}

impl RedisMutex {
    pub fn new(redis_url: impl AsRef<str>, poll_interval: Duration) -> Result<Self, LockError> {
        let client =
            open_client(redis_url.as_ref()).map_err(|e| LockError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            poll_interval,
        })
    }

    async fn try_acquire(&self, name: &str, expire: Duration) -> Result<Option<LockLease>, LockError> {
        let token = LeaseToken::generate();
        let key = name.to_string();
        let value = token.to_string();
        let expire_ms = expire.as_millis().max(1) as u64;

        let reply = with_connection(&self.client, move |conn| {
            redis::cmd("SET")
                .arg(&key)
                .arg(&value)
                .arg("NX")
                .arg("PX")
                .arg(expire_ms)
                .query::<Option<String>>(conn)
                .map_err(|e| StoreError::Command(e.to_string()))
        })
        .await
        .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(reply.map(|_| LockLease::new(name, token)))
    }
}

#[async_trait]
impl DistributedMutex for RedisMutex {
    async fn acquire(
        &self,
        name: &str,
        wait: Duration,
        expire: Duration,
    ) -> Result<LockLease, LockError> {
        let started = Instant::now();
        loop {
            if let Some(lease) = self.try_acquire(name, expire).await? {
                return Ok(lease);
            }

            let waited = started.elapsed();
            if waited >= wait {
                return Err(LockError::Timeout {
                    name: name.to_string(),
                    waited,
                });
            }
            let jitter_cap = (self.poll_interval.as_millis() as u64 / 2).max(1);
            let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
            let nap = (self.poll_interval + Duration::from_millis(jitter)).min(wait - waited);
            tokio::time::sleep(nap).await;
        }
    }

    async fn release(&self, lease: LockLease) -> Result<(), LockError> {
        let key = lease.name().to_string();
        let token = lease.token().to_string();
        with_connection(&self.client, move |conn| {
            redis::Script::new(RELEASE_SCRIPT)
                .key(&key)
                .arg(&token)
                .invoke::<i64>(conn)
                .map(|_| ())
                .map_err(|e| StoreError::Command(e.to_string()))
        })
        .await
        .map_err(|e| LockError::Backend(e.to_string()))
    }
}
