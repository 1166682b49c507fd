//! Error taxonomy for the indexing pipeline.
//!
//! Failures fall into four classes that drive the resilience wrappers:
//! transient errors are retried, permanent errors are counted and
//! skipped, and the two synthetic classes (`CircuitOpen`, `RateLimited`)
//! are raised by the wrappers themselves without touching the upstream.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Connection failures, timeouts, HTTP 5xx and 429. Retried.
    #[error("transient upstream error: {0}")]
    Transient(String),

    /// Other 4xx responses and malformed payloads. Not retried.
    #[error("permanent upstream error: {0}")]
    Permanent(String),

    /// Raised without attempting the call while the breaker is open.
    #[error("circuit open: upstream calls suspended")]
    CircuitOpen,

    /// Raised when the rate limiter's wait would exceed its bound.
    #[error("rate limited: required wait exceeds maximum")]
    RateLimited,
}

impl PipelineError {
    /// Whether the retry wrapper should attempt the call again.
    ///
    /// The synthetic classes are deliberately non-retryable here: the
    /// breaker has its own reset timeout and the limiter has already
    /// decided the wait is too long.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Transient(_))
    }

    /// Classify an HTTP status into the taxonomy.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        if status.as_u16() == 429 || status.is_server_error() {
            PipelineError::Transient(format!("{}: HTTP {}", context, status))
        } else {
            PipelineError::Permanent(format!("{}: HTTP {}", context, status))
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        // Connect/timeout failures are transient; body decode failures
        // mean a malformed response and are permanent.
        if err.is_connect() || err.is_timeout() || err.is_request() {
            PipelineError::Transient(err.to_string())
        } else if let Some(status) = err.status() {
            PipelineError::from_status(status, "request")
        } else if err.is_decode() || err.is_body() {
            PipelineError::Permanent(err.to_string())
        } else {
            PipelineError::Transient(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_429_are_transient() {
        assert!(PipelineError::from_status(reqwest::StatusCode::BAD_GATEWAY, "x").is_retryable());
        assert!(
            PipelineError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "x").is_retryable()
        );
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(!PipelineError::from_status(reqwest::StatusCode::NOT_FOUND, "x").is_retryable());
        assert!(!PipelineError::from_status(reqwest::StatusCode::BAD_REQUEST, "x").is_retryable());
    }

    #[test]
    fn synthetic_classes_are_not_retryable() {
        assert!(!PipelineError::CircuitOpen.is_retryable());
        assert!(!PipelineError::RateLimited.is_retryable());
    }
}
