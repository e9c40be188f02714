use std::sync::Arc;

use async_trait::async_trait;

use super::{command_error, open_client, with_connection};
use crate::domain::{JobEnvelope, KeyLayout};
use crate::ports::{QueueStore, RenameOutcome, StoreError};

/// Resque-compatible queue store: RPUSH to enqueue, LPOP to dequeue,
/// RENAMENX for pause/resume.
#[derive(Clone)]
pub struct RedisQueueStore {
    client: Arc<redis::Client>,
    layout: KeyLayout,
}

impl RedisQueueStore {
    /// # Arguments
    ///
    /// * `redis_url` - e.g. "redis://localhost:6379"
    /// * `layout` - key prefix and paused suffix shared with the coordinator
    pub fn new(redis_url: impl AsRef<str>, layout: KeyLayout) -> Result<Self, StoreError> {
        Ok(Self {
            client: open_client(redis_url.as_ref())?,
            layout,
        })
    }
}

/// `RENAMENX` on a missing source answers `ERR no such key`.
pub(crate) fn is_no_such_key(err: &redis::RedisError) -> bool {
    err.kind() == redis::ErrorKind::ResponseError
        && (err
            .detail()
            .is_some_and(|d| d.trim().eq_ignore_ascii_case("no such key"))
            || err.to_string().contains("no such key"))
}

fn encode(envelope: &JobEnvelope) -> Result<String, StoreError> {
    serde_json::to_string(envelope).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode(raw: &str) -> Result<JobEnvelope, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn enqueue(&self, queue: &str, envelope: JobEnvelope) -> Result<(), StoreError> {
        let key = self.layout.key_for(queue);
        let payload = encode(&envelope)?;
        with_connection(&self.client, move |conn| {
            redis::cmd("RPUSH")
                .arg(&key)
                .arg(&payload)
                .query::<i64>(conn)
                .map(|_| ())
                .map_err(command_error)
        })
        .await
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<JobEnvelope>, StoreError> {
        let key = self.layout.key_for(queue);
        let raw = with_connection(&self.client, move |conn| {
            redis::cmd("LPOP")
                .arg(&key)
                .query::<Option<String>>(conn)
                .map_err(command_error)
        })
        .await?;
        raw.as_deref().map(decode).transpose()
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let key = key.to_string();
        with_connection(&self.client, move |conn| {
            redis::cmd("EXISTS")
                .arg(&key)
                .query::<i64>(conn)
                .map(|n| n > 0)
                .map_err(command_error)
        })
        .await
    }

    async fn rename_if_absent(&self, src: &str, dst: &str) -> Result<RenameOutcome, StoreError> {
        let (src, dst) = (src.to_string(), dst.to_string());
        with_connection(&self.client, move |conn| {
            match redis::cmd("RENAMENX").arg(&src).arg(&dst).query::<i64>(conn) {
                Ok(1) => Ok(RenameOutcome::Renamed),
                Ok(_) => Ok(RenameOutcome::TargetExists),
                Err(e) if is_no_such_key(&e) => Ok(RenameOutcome::SourceMissing),
                Err(e) => Err(command_error(e)),
            }
        })
        .await
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        let key = key.to_string();
        with_connection(&self.client, move |conn| {
            redis::cmd("LLEN")
                .arg(&key)
                .query::<usize>(conn)
                .map_err(command_error)
        })
        .await
    }
}
