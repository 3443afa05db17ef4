//! Stage error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur invoking a planning/critique/lookup stage
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Stage API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Retry budget exhausted for {stage}: {last}")]
    BudgetExhausted { stage: String, last: String },

    #[error("Invalid stage response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StageError {
    /// Check if this is a rate limit error
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, StageError::RateLimited { .. })
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            StageError::RateLimited { .. } => true,
            StageError::Api { status, .. } => *status >= 500,
            StageError::Network(_) => true,
            StageError::Timeout(_) => true,
            StageError::BudgetExhausted { .. } => false,
            StageError::InvalidResponse(_) => false,
            StageError::Json(_) => false,
        }
    }

    /// Get the retry duration if this is a rate limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            StageError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
