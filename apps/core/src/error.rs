use std::io;
use thiserror::Error;

/// Application-wide error type, consolidating all possible errors into a single enum.
#[derive(Debug, Error)]
pub enum AppError {
    /// Represents errors originating from the key/value store, typically from `sqlx`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents errors raised while applying the storage migrations.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents standard input/output errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Represents failures while talking to the completion endpoint before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a non-success answer from the upstream completion endpoint.
    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Represents failures inside the LLM actor (closed channels, dropped responders).
    #[error("Actor error: {0}")]
    Actor(String),

    /// Represents data validation errors (e.g., empty input, mismatched quiz answers).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Represents configuration-related errors (e.g., malformed environment variables).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Represents unexpected internal errors that indicate a bug.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Represents errors from operations that did not complete in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Represents an error indicating that a rate limit has been exceeded.
    #[error("Rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

impl AppError {
    /// Whether the failed operation is worth another attempt.
    ///
    /// Timeouts, throttling (429) and server-side failures (5xx) are transient;
    /// everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Timeout(_) => true,
            AppError::Upstream { status, .. } => *status == 429 || *status >= 500,
            AppError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout(format!("Operation timed out: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON error: {}", err))
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Config(format!("URL parse error: {}", err))
    }
}

/// Only the configuration is validated with `validator`, so its failures are configuration errors.
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Config(format!("Invalid configuration: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_retryable_statuses() {
        let throttled = AppError::Upstream { status: 429, message: "slow down".into() };
        let unavailable = AppError::Upstream { status: 503, message: "busy".into() };
        let bad_request = AppError::Upstream { status: 400, message: "bad".into() };

        assert!(throttled.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(!bad_request.is_retryable());
    }

    #[test]
    fn test_validation_is_not_retryable() {
        assert!(!AppError::Validation("empty".into()).is_retryable());
        assert!(!AppError::RateLimited { retry_after_secs: 1 }.is_retryable());
        assert!(AppError::Timeout("chunk".into()).is_retryable());
    }
}
