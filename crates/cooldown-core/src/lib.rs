//! cooldown-core
//!
//! Rate-limited job queues: when an upstream API says "too many requests",
//! stop dispatching its jobs, keep them, and start again after a cool-down.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, envelope, queue identity, derived state）
//! - **ports**: 抽象化レイヤー（QueueStore, DistributedMutex, SchedulerBackend, Clock）
//! - **impls**: 実装（in-memory はテスト・デモ用、Redis は feature `redis`）
//! - **rate_limited**: pause/resume の状態機械、ロック付き enqueue/requeue、遅延 resume
//! - **apis**: プロバイダごとのアダプタ（Twitter, AngelList, Evernote）
//! - **app**: ビルダーと resume poller
//! - **typed**: 型付きジョブ API

pub mod apis;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod rate_limited;
pub mod registry;
pub mod runtime;
pub mod typed;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::app::{BuildError, Cooldown, CooldownBuilder};
pub use crate::config::{CooldownConfig, ExecutionMode};
pub use crate::error::{CooldownError, JobError};
pub use crate::rate_limited::{RateLimitable, RateLimitedQueue};
pub use crate::runtime::JobHandler;
