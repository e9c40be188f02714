//! Derived queue state.

use serde::{Deserialize, Serialize};

/// Observable state of a rate-limited queue.
///
/// Never persisted: it is computed from which physical key exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// The live key exists.
    Active,

    /// The paused key exists and the live key does not.
    Paused,

    /// Neither key exists (never used, or fully drained).
    Unknown,
}

impl QueueState {
    /// Collapse to a paused flag, resolving `Unknown` with the caller's default.
    pub fn is_paused_or(self, default_if_unknown: bool) -> bool {
        match self {
            QueueState::Active => false,
            QueueState::Paused => true,
            QueueState::Unknown => default_if_unknown,
        }
    }
}
