//! Configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::KeyLayout;
use crate::error::CooldownError;

/// How the coordinator treats queue state and locking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Normal operation: consult the store under the distributed lock.
    #[default]
    Queued,

    /// Inline/test operation: queues are never considered paused and the
    /// mutex is bypassed.
    Synchronous,
}

/// Parameters of the mutex lease guarding check-then-enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// Lock name; scope it per deployment when several systems share a store.
    pub name: String,
    pub wait_secs: u64,
    pub expire_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            name: "cooldown::rate_limited".to_string(),
            wait_secs: 60,
            expire_secs: 120,
            poll_interval_ms: 50,
        }
    }
}

impl LeaseConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn expire(&self) -> Duration {
        Duration::from_secs(self.expire_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub poll_interval_ms: u64,
}

impl PollConfig {
    pub fn every(ms: u64) -> Self {
        Self {
            poll_interval_ms: ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::every(100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    pub keys: KeyLayout,
    pub lease: LeaseConfig,
    pub mode: ExecutionMode,

    /// Queue that receives resume jobs. `None` disables delayed resume.
    pub resume_queue: Option<String>,

    /// Cool-down used when a provider does not say how long to wait.
    pub default_cooldown_secs: u64,

    pub worker: PollConfig,
    pub scheduler: PollConfig,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            keys: KeyLayout::default(),
            lease: LeaseConfig::default(),
            mode: ExecutionMode::Queued,
            resume_queue: None,
            default_cooldown_secs: 3600,
            worker: PollConfig::every(100),
            scheduler: PollConfig::every(1000),
        }
    }
}

impl CooldownConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, CooldownError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| CooldownError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CooldownError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CooldownError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn default_cooldown(&self) -> Duration {
        Duration::from_secs(self.default_cooldown_secs)
    }

    fn validate(&self) -> Result<(), CooldownError> {
        if self.keys.paused_suffix.is_empty() {
            return Err(CooldownError::Config(
                "keys.paused_suffix must not be empty".to_string(),
            ));
        }
        if self.lease.name.is_empty() {
            return Err(CooldownError::Config("lease.name must not be empty".to_string()));
        }
        if self.lease.expire_secs == 0 {
            return Err(CooldownError::Config(
                "lease.expire_secs must be positive".to_string(),
            ));
        }
        if matches!(&self.resume_queue, Some(q) if q.is_empty()) {
            return Err(CooldownError::Config(
                "resume_queue must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
