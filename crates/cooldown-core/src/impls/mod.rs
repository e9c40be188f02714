//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryQueueStore / InMemoryMutex / InMemoryScheduler**: テスト・デモ用
//! - **DisabledScheduler**: 遅延実行を持たないバックエンド
//! - **RedisQueueStore / RedisMutex / RedisScheduler**: 本番用（feature `redis`）

pub mod inmem_mutex;
pub mod inmem_scheduler;
pub mod inmem_store;

#[cfg(feature = "redis")]
pub mod redis;

pub use self::inmem_mutex::InMemoryMutex;
pub use self::inmem_scheduler::{DisabledScheduler, InMemoryScheduler};
pub use self::inmem_store::InMemoryQueueStore;

#[cfg(feature = "redis")]
pub use self::redis::{RedisMutex, RedisQueueStore, RedisScheduler};
