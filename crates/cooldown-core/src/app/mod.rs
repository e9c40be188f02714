//! App - アプリケーション層
//!
//! ports と rate_limited / apis を組み合わせて、1 プロセス分の構成を組み立てます。
//!
//! # 主要コンポーネント
//! - **CooldownBuilder**: 構築とワイヤリング（起動時検証つき）
//! - **Cooldown**: 組み立て済みのアプリ（enqueue, worker, poller, snapshot）
//! - **ResumePoller**: 期限が来た resume タイマーをキューへ移すループ

pub mod builder;
pub mod resume_poller;

pub use self::builder::{BuildError, Cooldown, CooldownBuilder};
pub use self::resume_poller::{PollerHandle, ResumePoller};
