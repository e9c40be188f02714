//! InMemoryQueueStore - 開発・テスト用のキューストア
//!
//! # 実装詳細
//! - HashMap<物理キー, VecDeque<JobEnvelope>> でキューを管理
//! - 空になったキーは削除する（Redis の list と同じ挙動）
//! - rename は 1 回のロック区間で判定と移動を行うので atomic

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{JobEnvelope, KeyLayout};
use crate::ports::{QueueStore, RenameOutcome, StoreError};

pub struct InMemoryQueueStore {
    layout: KeyLayout,
    keys: Arc<Mutex<HashMap<String, VecDeque<JobEnvelope>>>>,
}

impl InMemoryQueueStore {
    pub fn new(layout: KeyLayout) -> Self {
        Self {
            layout,
            keys: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Snapshot of the envelopes under a physical key, head first.
    pub async fn jobs_at(&self, key: &str) -> Vec<JobEnvelope> {
        let keys = self.keys.lock().await;
        keys.get(key)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every physical key currently present, sorted.
    pub async fn existing_keys(&self) -> Vec<String> {
        let keys = self.keys.lock().await;
        let mut names: Vec<String> = keys.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for InMemoryQueueStore {
    fn default() -> Self {
        Self::new(KeyLayout::default())
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn enqueue(&self, queue: &str, envelope: JobEnvelope) -> Result<(), StoreError> {
        let key = self.layout.key_for(queue);
        let mut keys = self.keys.lock().await;
        keys.entry(key).or_default().push_back(envelope);
        Ok(())
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<JobEnvelope>, StoreError> {
        let key = self.layout.key_for(queue);
        let mut keys = self.keys.lock().await;

        let Some(list) = keys.get_mut(&key) else {
            return Ok(None);
        };
        let envelope = list.pop_front();
        if list.is_empty() {
            keys.remove(&key);
        }
        Ok(envelope)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let keys = self.keys.lock().await;
        Ok(keys.contains_key(key))
    }

    async fn rename_if_absent(&self, src: &str, dst: &str) -> Result<RenameOutcome, StoreError> {
        let mut keys = self.keys.lock().await;

        if !keys.contains_key(src) {
            return Ok(RenameOutcome::SourceMissing);
        }
        if keys.contains_key(dst) {
            return Ok(RenameOutcome::TargetExists);
        }
        if let Some(list) = keys.remove(src) {
            keys.insert(dst.to_string(), list);
        }
        Ok(RenameOutcome::Renamed)
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        let keys = self.keys.lock().await;
        Ok(keys.get(key).map_or(0, VecDeque::len))
    }
}
