//! Typed - 型付きジョブ API
//!
//! handler 名の typo を型で排除し、引数の形を静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Job` trait, `Perform<J>` trait - 型安全
//! - **内部（Dyn）**: `JobHandler` trait - object-safe, 引数は JSON のまま

pub mod handler;
pub mod job;

pub use self::handler::{Perform, TypedHandler};
pub use self::job::Job;
