use std::time::Duration;

use thiserror::Error;

use super::{ApiQueue, Classification, RateLimitClassifier};
use crate::error::JobError;

/// Errors a Twitter client surfaces to job bodies.
#[derive(Debug, Error)]
pub enum TwitterError {
    /// HTTP 429.
    #[error("too many requests")]
    TooManyRequests { reset_in: Option<Duration> },

    /// HTTP 420, the legacy rate-limit status.
    #[error("enhance your calm")]
    EnhanceYourCalm { reset_in: Option<Duration> },

    #[error("twitter request failed: {0}")]
    Request(String),
}

/// Both rate-limit statuses wait for the provider's `reset_in`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwitterClassifier;

impl RateLimitClassifier for TwitterClassifier {
    const QUEUE: &'static str = "twitter_api";

    fn classify(&self, error: &JobError) -> Classification {
        match error.downcast_upstream::<TwitterError>() {
            Some(
                TwitterError::TooManyRequests { reset_in }
                | TwitterError::EnhanceYourCalm { reset_in },
            ) => Classification::RateLimited {
                retry_after: *reset_in,
            },
            _ => Classification::Other,
        }
    }
}

pub type TwitterQueue = ApiQueue<TwitterClassifier>;
