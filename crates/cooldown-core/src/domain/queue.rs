//! Queue identity: one logical name, two physical keys.

use serde::{Deserialize, Serialize};

/// How logical queue names map onto physical store keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyLayout {
    /// Prepended to every queue name to form the physical key.
    pub prefix: String,

    /// Appended to a queue name to form its paused twin.
    pub paused_suffix: String,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self {
            prefix: "queue:".to_string(),
            paused_suffix: "_paused".to_string(),
        }
    }
}

impl KeyLayout {
    pub fn key_for(&self, queue: &str) -> String {
        format!("{}{}", self.prefix, queue)
    }

    pub fn paused_name(&self, queue: &str) -> String {
        format!("{}{}", queue, self.paused_suffix)
    }
}

/// A named queue resolved to its live and paused physical keys.
///
/// Invariant: at most one of the two keys exists in the backing store at any
/// instant. Transitions between them only ever happen through a rename that
/// refuses to overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueIdentity {
    name: String,
    paused_name: String,
    live_key: String,
    paused_key: String,
}

impl QueueIdentity {
    pub fn new(name: impl Into<String>, layout: &KeyLayout) -> Self {
        let name = name.into();
        let paused_name = layout.paused_name(&name);
        Self {
            live_key: layout.key_for(&name),
            paused_key: layout.key_for(&paused_name),
            paused_name,
            name,
        }
    }

    /// Logical (live) queue name, as passed to `QueueStore::enqueue`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical name of the paused twin.
    pub fn paused_name(&self) -> &str {
        &self.paused_name
    }

    pub fn live_key(&self) -> &str {
        &self.live_key
    }

    pub fn paused_key(&self) -> &str {
        &self.paused_key
    }
}
