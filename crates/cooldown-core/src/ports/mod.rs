//! Ports - 外部コラボレータへのインターフェース
//!
//! 各 trait は外部システム（Redis などのキューストア、分散 mutex、
//! 遅延実行スケジューラ）への境界を定義し、実装の詳細を隠蔽します。
//!
//! # 前提
//! - キューストアの atomic rename が唯一の状態遷移手段
//! - check-then-enqueue の複合操作だけが mutex を必要とする

pub mod clock;
pub mod mutex;
pub mod queue_store;
pub mod scheduler;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::mutex::{DistributedMutex, LockError, LockLease, with_lock};
pub use self::queue_store::{QueueStore, RenameOutcome, StoreError};
pub use self::scheduler::{ScheduledJob, SchedulerBackend};
