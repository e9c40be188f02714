//! InMemoryMutex - 単一プロセス内の DistributedMutex
//!
//! Redis 版と同じく「取れるまでポーリング、期限切れの lease は奪える」動作。
//! 複数 worker を同一プロセスで動かすテスト・デモ用。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::LeaseToken;
use crate::ports::{DistributedMutex, LockError, LockLease};

#[derive(Debug, Clone, Copy)]
struct Holder {
    token: LeaseToken,
    expires_at: Instant,
}

pub struct InMemoryMutex {
    held: Mutex<HashMap<String, Holder>>,
    poll_interval: Duration,
}

impl InMemoryMutex {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
            poll_interval,
        }
    }

    /// Is `name` held by a lease that has not yet expired?
    pub async fn is_held(&self, name: &str) -> bool {
        let held = self.held.lock().await;
        held.get(name)
            .is_some_and(|holder| holder.expires_at > Instant::now())
    }

    async fn try_acquire(&self, name: &str, expire: Duration) -> Option<LockLease> {
        let mut held = self.held.lock().await;
        let now = Instant::now();

        if let Some(holder) = held.get(name)
            && holder.expires_at > now
        {
            return None;
        }

        let token = LeaseToken::generate();
        held.insert(
            name.to_string(),
            Holder {
                token,
                expires_at: now + expire,
            },
        );
        Some(LockLease::new(name, token))
    }

    fn next_sleep(&self) -> Duration {
        let jitter_cap = (self.poll_interval.as_millis() as u64 / 2).max(1);
        let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
        self.poll_interval + Duration::from_millis(jitter)
    }
}

impl Default for InMemoryMutex {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

#[async_trait]
impl DistributedMutex for InMemoryMutex {
    async fn acquire(
        &self,
        name: &str,
        wait: Duration,
        expire: Duration,
    ) -> Result<LockLease, LockError> {
        let started = Instant::now();
        loop {
            if let Some(lease) = self.try_acquire(name, expire).await {
                return Ok(lease);
            }

            let waited = started.elapsed();
            if waited >= wait {
                return Err(LockError::Timeout {
                    name: name.to_string(),
                    waited,
                });
            }
            let nap = self.next_sleep().min(wait - waited);
            tokio::time::sleep(nap).await;
        }
    }

    async fn release(&self, lease: LockLease) -> Result<(), LockError> {
        let mut held = self.held.lock().await;
        // 期限切れ後に他者が取り直していたら、その lease は消さない
        if held
            .get(lease.name())
            .is_some_and(|holder| holder.token == lease.token())
        {
            held.remove(lease.name());
        }
        Ok(())
    }
}
