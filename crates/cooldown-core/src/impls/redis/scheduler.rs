use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{command_error, open_client, with_connection};
use crate::domain::JobEnvelope;
use crate::ports::{ScheduledJob, SchedulerBackend, StoreError};

const DEFAULT_SCHEDULE_KEY: &str = "cooldown:delayed";

/// Sorted set member. The envelope id keeps members unique.
#[derive(Debug, Serialize, Deserialize)]
struct Member {
    fire_at: DateTime<Utc>,
    queue: String,
    envelope: JobEnvelope,
}

/// Persistent delayed dispatch: a sorted set scored by fire time (ms).
///
/// `take_due` claims each member with `ZREM`, so when several pollers race
/// only the one whose `ZREM` removed the member delivers it.
#[derive(Clone)]
pub struct RedisScheduler {
    client: Arc<redis::Client>,
    key: String,
}

impl RedisScheduler {
    pub fn new(redis_url: impl AsRef<str>, key: Option<String>) -> Result<Self, StoreError> {
        Ok(Self {
            client: open_client(redis_url.as_ref())?,
            key: key.unwrap_or_else(|| DEFAULT_SCHEDULE_KEY.to_string()),
        })
    }
}

#[async_trait]
impl SchedulerBackend for RedisScheduler {
    fn supports_delayed_dispatch(&self) -> bool {
        true
    }

    async fn schedule_at(
        &self,
        fire_at: DateTime<Utc>,
        queue: &str,
        envelope: JobEnvelope,
    ) -> Result<(), StoreError> {
        let member = serde_json::to_string(&Member {
            fire_at,
            queue: queue.to_string(),
            envelope,
        })
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let key = self.key.clone();
        let score = fire_at.timestamp_millis();

        with_connection(&self.client, move |conn| {
            redis::cmd("ZADD")
                .arg(&key)
                .arg(score)
                .arg(&member)
                .query::<i64>(conn)
                .map(|_| ())
                .map_err(command_error)
        })
        .await
    }

    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>, StoreError> {
        let key = self.key.clone();
        let max_score = now.timestamp_millis();

        let claimed = with_connection(&self.client, move |conn| {
            let members: Vec<String> = redis::cmd("ZRANGEBYSCORE")
                .arg(&key)
                .arg("-inf")
                .arg(max_score)
                .query(conn)
                .map_err(command_error)?;

            let mut claimed = Vec::with_capacity(members.len());
            for member in members {
                let removed: i64 = redis::cmd("ZREM")
                    .arg(&key)
                    .arg(&member)
                    .query(conn)
                    .map_err(command_error)?;
                if removed == 1 {
                    claimed.push(member);
                }
            }
            Ok(claimed)
        })
        .await?;

        let mut due = Vec::with_capacity(claimed.len());
        for raw in claimed {
            match serde_json::from_str::<Member>(&raw) {
                Ok(member) => due.push(ScheduledJob {
                    fire_at: member.fire_at,
                    queue: member.queue,
                    envelope: member.envelope,
                }),
                // 読めないメンバーは既に ZREM 済み。永遠に再試行しないようログだけ残す
                Err(e) => warn!(key = %self.key, error = %e, "dropping undecodable scheduled job"),
            }
        }
        Ok(due)
    }
}
