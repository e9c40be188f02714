//! JobEnvelope - キュー間を移動する実行単位

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::JobId;

/// The unit stored in a physical queue: a handler name plus its ordered,
/// opaque arguments.
///
/// An envelope is consumed exactly once by the worker that dequeues it.
/// Re-submitting a job (requeue, parking) always builds a new envelope, so
/// the same payload comes back under a new id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    id: JobId,
    handler: String,
    #[serde(default)]
    args: Vec<Value>,
}

impl JobEnvelope {
    pub fn new(handler: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            id: JobId::generate(),
            handler: handler.into(),
            args,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }
}
