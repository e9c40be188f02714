use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::JobEnvelope;
use crate::error::{CooldownError, JobError};
use crate::registry::Registry;

/// A job body.
///
/// Takes the envelope's ordered args as-is, so the handler decodes them
/// however it likes (positional JSON values, a single struct, ...).
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn perform(&self, args: &[Value]) -> Result<(), JobError>;
}

/// Registry of job handlers (name -> handler).
pub type HandlerRegistry = Registry<dyn JobHandler>;

/// How a caller points at a handler: a live reference or a name to resolve.
#[derive(Clone)]
pub enum HandlerRef {
    Direct(Arc<dyn JobHandler>),
    Named(String),
}

impl HandlerRef {
    pub fn named(name: impl Into<String>) -> Self {
        HandlerRef::Named(name.into())
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerRef::Direct(_) => f.write_str("HandlerRef::Direct(..)"),
            HandlerRef::Named(name) => write!(f, "HandlerRef::Named({name:?})"),
        }
    }
}

impl From<&str> for HandlerRef {
    fn from(name: &str) -> Self {
        HandlerRef::Named(name.to_string())
    }
}

impl From<String> for HandlerRef {
    fn from(name: String) -> Self {
        HandlerRef::Named(name)
    }
}

impl From<Arc<dyn JobHandler>> for HandlerRef {
    fn from(handler: Arc<dyn JobHandler>) -> Self {
        HandlerRef::Direct(handler)
    }
}

/// Dispatcher resolves handlers and runs them.
///
/// It never interprets failures: whatever the handler returns is what the
/// caller gets.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn resolve(&self, handler: &HandlerRef) -> Result<Arc<dyn JobHandler>, CooldownError> {
        match handler {
            HandlerRef::Direct(h) => Ok(Arc::clone(h)),
            HandlerRef::Named(name) => self.registry.resolve(name),
        }
    }

    pub async fn dispatch(&self, handler: HandlerRef, args: &[Value]) -> Result<(), JobError> {
        let handler = self.resolve(&handler)?;
        handler.perform(args).await
    }

    /// Execute one dequeued envelope.
    pub async fn execute(&self, envelope: &JobEnvelope) -> Result<(), JobError> {
        self.dispatch(HandlerRef::named(envelope.handler()), envelope.args())
            .await
    }
}
