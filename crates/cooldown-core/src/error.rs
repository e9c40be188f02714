use std::error::Error as StdError;

use thiserror::Error;

use crate::ports::{LockError, StoreError};

/// Infrastructure-level failure of the coordinator.
///
/// None of these are retried or swallowed: the coordinator never guesses a
/// queue's state after an ambiguous error.
#[derive(Debug, Error)]
pub enum CooldownError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("unknown handler: {0}")]
    UnknownHandler(String),

    #[error("duplicate handler: {0}")]
    DuplicateHandler(String),

    #[error("invalid handler name: {0:?}")]
    InvalidName(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// What a job body returns when it fails.
///
/// Provider adapters look inside `Upstream` (by downcasting) to decide whether
/// a failure is a rate limit; everything else passes through untouched.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Upstream(Box<dyn StdError + Send + Sync>),

    #[error("invalid job arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Infrastructure(#[from] CooldownError),

    #[error("{0}")]
    Failed(String),
}

impl JobError {
    /// Wrap a provider/client error so adapters can classify it.
    pub fn upstream<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        JobError::Upstream(Box::new(error))
    }

    pub fn failed(message: impl Into<String>) -> Self {
        JobError::Failed(message.into())
    }

    /// The upstream error as `E`, if that is what this wraps.
    pub fn downcast_upstream<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        match self {
            JobError::Upstream(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<StoreError> for JobError {
    fn from(err: StoreError) -> Self {
        JobError::Infrastructure(CooldownError::Store(err))
    }
}

impl From<LockError> for JobError {
    fn from(err: LockError) -> Self {
        JobError::Infrastructure(CooldownError::Lock(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[derive(Debug, Error)]
    #[error("other")]
    struct Other;

    #[test]
    fn downcast_finds_the_wrapped_type_only() {
        let err = JobError::upstream(Boom);
        assert!(err.downcast_upstream::<Boom>().is_some());
        assert!(err.downcast_upstream::<Other>().is_none());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn non_upstream_errors_never_downcast() {
        let err = JobError::failed("nope");
        assert!(err.downcast_upstream::<Boom>().is_none());
    }

    #[test]
    fn unknown_handler_message_names_the_handler() {
        let err = CooldownError::UnknownHandler("Acme::Missing".to_string());
        assert!(err.to_string().contains("Acme::Missing"));
    }
}
