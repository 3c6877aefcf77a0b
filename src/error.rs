// src/error.rs

//! Unified error handling for the review core.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for review operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Weight vector rejected; scoring refuses to run
    #[error("Invalid analysis weights (sum {sum:.2}%): {}", violations.join("; "))]
    InvalidWeights { sum: f64, violations: Vec<String> },

    /// Rule pattern could not be compiled
    #[error("Invalid pattern in rule '{rule_id}': {message}")]
    Pattern { rule_id: String, message: String },

    /// Breaker is open; the call never reached the network
    #[error("Circuit breaker is OPEN for {endpoint}: service unavailable")]
    CircuitOpen { endpoint: String },

    /// Remote service answered with a non-success status
    #[error("{message}")]
    Http { status: u16, message: String },

    /// Connection reset, refused or otherwise dropped
    #[error("Could not connect to the analysis service: {0}")]
    Connection(String),

    /// Request or overall operation deadline elapsed
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// Retryable failures persisted through every attempt
    #[error("Analysis service unavailable at {endpoint} after {attempts} attempts: {last}")]
    ServiceUnavailable {
        endpoint: String,
        attempts: u32,
        last: String,
    },

    /// Bearer token could not be obtained
    #[error("Authentication token error: {0}")]
    Token(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a pattern compilation error for a rule.
    pub fn pattern(rule_id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Pattern {
            rule_id: rule_id.into(),
            message: message.to_string(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Map an HTTP status to a user-presentable error.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let message = match status {
            400 => format!("Invalid request: {detail}"),
            401 => "Not authorized to access the analysis service".to_string(),
            403 => "Access denied to the analysis service".to_string(),
            404 => "Endpoint not found on the analysis service".to_string(),
            429 => "Rate limit exceeded on the analysis service".to_string(),
            500 => format!("Internal error in the analysis service: {detail}"),
            503 => "Analysis service temporarily unavailable".to_string(),
            _ => format!("HTTP error {status}: {detail}"),
        };
        Self::Http { status, message }
    }

    /// Whether a failed call is worth another attempt.
    ///
    /// Connection drops, timeouts, 5xx and 429 are transient; every other
    /// 4xx and all local errors are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Whether the error is a remote-call outcome the breaker should count.
    pub fn trips_breaker(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Timeout { .. }
                | Self::Http { .. }
                | Self::ServiceUnavailable { .. }
        )
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout("HTTP request", Duration::ZERO)
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::Validation(format!("Malformed response body: {err}"))
        } else {
            Self::Config(format!("Request configuration error: {err}"))
        }
    }
}
