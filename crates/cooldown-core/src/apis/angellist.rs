use std::time::Duration;

use thiserror::Error;

use super::{ApiQueue, Classification, RateLimitClassifier};
use crate::error::JobError;

/// AngelList does not say when the limit resets; wait a full hour.
pub const ANGELLIST_COOLDOWN: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum AngellistError {
    #[error("too many requests: {0}")]
    TooManyRequests(String),

    #[error("angellist request failed: {0}")]
    Request(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AngellistClassifier;

impl RateLimitClassifier for AngellistClassifier {
    const QUEUE: &'static str = "angellist_api";

    fn classify(&self, error: &JobError) -> Classification {
        match error.downcast_upstream::<AngellistError>() {
            Some(AngellistError::TooManyRequests(_)) => Classification::RateLimited {
                retry_after: Some(ANGELLIST_COOLDOWN),
            },
            _ => Classification::Other,
        }
    }
}

pub type AngellistQueue = ApiQueue<AngellistClassifier>;
