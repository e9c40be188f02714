use std::time::Duration;

use thiserror::Error;

use super::{ApiQueue, Classification, RateLimitClassifier};
use crate::error::JobError;

/// Subset of EDAM error codes a job body is likely to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdamErrorCode {
    Unknown,
    BadDataFormat,
    PermissionDenied,
    InternalError,
    DataRequired,
    QuotaReached,
    AuthExpired,
    RateLimitReached,
}

/// `EDAMSystemException`. Only `RateLimitReached` carries a duration.
#[derive(Debug, Error)]
#[error("EDAM system exception {error_code:?}")]
pub struct EdamSystemException {
    pub error_code: EdamErrorCode,
    pub message: Option<String>,
    pub rate_limit_duration: Option<Duration>,
}

impl EdamSystemException {
    pub fn rate_limited(duration: Duration) -> Self {
        Self {
            error_code: EdamErrorCode::RateLimitReached,
            message: None,
            rate_limit_duration: Some(duration),
        }
    }

    pub fn with_code(error_code: EdamErrorCode) -> Self {
        Self {
            error_code,
            message: None,
            rate_limit_duration: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EvernoteClassifier;

impl RateLimitClassifier for EvernoteClassifier {
    const QUEUE: &'static str = "evernote_api";

    fn classify(&self, error: &JobError) -> Classification {
        match error.downcast_upstream::<EdamSystemException>() {
            Some(e) if e.error_code == EdamErrorCode::RateLimitReached => {
                Classification::RateLimited {
                    retry_after: e.rate_limit_duration,
                }
            }
            _ => Classification::Other,
        }
    }
}

pub type EvernoteQueue = ApiQueue<EvernoteClassifier>;
