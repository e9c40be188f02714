//! In-memory scheduler backends.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::JobEnvelope;
use crate::ports::{ScheduledJob, SchedulerBackend, StoreError};

/// Heap entry; reversed ordering turns `BinaryHeap` into a min-heap on
/// `(fire_at, seq)`.
#[derive(Debug)]
struct Entry {
    seq: u64,
    job: ScheduledJob,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.job.fire_at == other.job.fire_at && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .job
            .fire_at
            .cmp(&self.job.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct SchedulerState {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

/// Delayed dispatch held in process memory.
///
/// Good enough for tests and single-process demos; it does not survive a
/// restart, which is what `RedisScheduler` (feature `redis`) is for.
#[derive(Default)]
pub struct InMemoryScheduler {
    state: Mutex<SchedulerState>,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything still waiting, earliest first.
    pub async fn pending(&self) -> Vec<ScheduledJob> {
        let state = self.state.lock().await;
        let mut entries: Vec<&Entry> = state.heap.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|e| e.job.clone()).collect()
    }
}

#[async_trait]
impl SchedulerBackend for InMemoryScheduler {
    fn supports_delayed_dispatch(&self) -> bool {
        true
    }

    async fn schedule_at(
        &self,
        fire_at: DateTime<Utc>,
        queue: &str,
        envelope: JobEnvelope,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Entry {
            seq,
            job: ScheduledJob {
                fire_at,
                queue: queue.to_string(),
                envelope,
            },
        });
        Ok(())
    }

    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>, StoreError> {
        let mut state = self.state.lock().await;
        let mut due = Vec::new();
        while state.heap.peek().is_some_and(|e| e.job.fire_at <= now) {
            if let Some(entry) = state.heap.pop() {
                due.push(entry.job);
            }
        }
        Ok(due)
    }
}

/// A backend without delayed dispatch. Resume must then come from elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledScheduler;

#[async_trait]
impl SchedulerBackend for DisabledScheduler {
    fn supports_delayed_dispatch(&self) -> bool {
        false
    }

    async fn schedule_at(
        &self,
        _fire_at: DateTime<Utc>,
        queue: &str,
        _envelope: JobEnvelope,
    ) -> Result<(), StoreError> {
        Err(StoreError::Command(format!(
            "delayed dispatch is not supported (queue {queue})"
        )))
    }

    async fn take_due(&self, _now: DateTime<Utc>) -> Result<Vec<ScheduledJob>, StoreError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn resume(owner: &str) -> JobEnvelope {
        JobEnvelope::new("cooldown::Resume", vec![json!(owner)])
    }

    #[tokio::test]
    async fn take_due_returns_only_elapsed_jobs_in_time_order() {
        let scheduler = InMemoryScheduler::new();
        scheduler.schedule_at(at(30), "unpause", resume("b")).await.unwrap();
        scheduler.schedule_at(at(10), "unpause", resume("a")).await.unwrap();
        scheduler.schedule_at(at(90), "unpause", resume("c")).await.unwrap();

        let due = scheduler.take_due(at(30)).await.unwrap();
        let owners: Vec<_> = due.iter().map(|j| j.envelope.args()[0].clone()).collect();
        assert_eq!(owners, vec![json!("a"), json!("b")]);

        let pending = scheduler.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fire_at, at(90));
    }

    #[tokio::test]
    async fn due_jobs_are_handed_out_once() {
        let scheduler = InMemoryScheduler::new();
        scheduler.schedule_at(at(0), "unpause", resume("a")).await.unwrap();

        assert_eq!(scheduler.take_due(at(5)).await.unwrap().len(), 1);
        assert!(scheduler.take_due(at(5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_fire_time_keeps_insertion_order() {
        let scheduler = InMemoryScheduler::new();
        scheduler.schedule_at(at(0), "unpause", resume("first")).await.unwrap();
        scheduler.schedule_at(at(0), "unpause", resume("second")).await.unwrap();

        let due = scheduler.take_due(at(0)).await.unwrap();
        assert_eq!(due[0].envelope.args()[0], json!("first"));
        assert_eq!(due[1].envelope.args()[0], json!("second"));
    }

    #[test]
    fn disabled_scheduler_reports_no_capability() {
        assert!(!DisabledScheduler.supports_delayed_dispatch());
    }
}
