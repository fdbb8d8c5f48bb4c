//! Structured error types for Herald
//!
//! Provides type-safe error handling for the model-service client
//! and configuration validation, with user-friendly messages.

use std::time::Duration;
use thiserror::Error;

/// Primary error type for Herald operations
#[derive(Error, Debug)]
pub enum HeraldError {
    // =========================================================================
    // Provider / API Errors
    // =========================================================================
    /// Authentication/authorization errors
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Rate limit exceeded (429)
    #[error("rate limit exceeded: {limit_type}")]
    RateLimitExceeded {
        limit_type: String,
        retry_after: Option<Duration>,
    },

    /// Provider returned an error
    #[error("provider error: {status} - {message}")]
    ProviderError { status: u16, message: String },

    /// Provider answered with a body we could not understand
    #[error("malformed response from {provider}: {message}")]
    MalformedResponse { provider: String, message: String },

    // =========================================================================
    // Execution Errors
    // =========================================================================
    /// Operation was cancelled through its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Missing required config
    #[error("missing required configuration: {key}")]
    MissingConfig { key: String },

    // =========================================================================
    // Network / System Errors
    // =========================================================================
    /// Network/connection error
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Timeout
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Service unavailable (maintenance, 503)
    #[error("service temporarily unavailable")]
    ServiceUnavailable { retry_after: Option<Duration> },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal system error
    #[error("internal error: {message}")]
    Internal { message: String },

    // =========================================================================
    // External Error Wrappers
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl HeraldError {
    /// Check if error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } => true,
            Self::Timeout { .. } => true,
            Self::ServiceUnavailable { .. } => true,
            Self::RateLimitExceeded { .. } => true,

            Self::ProviderError { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),

            Self::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),

            // Never retry these
            Self::Unauthorized { .. }
            | Self::MalformedResponse { .. }
            | Self::Cancelled
            | Self::InvalidConfig { .. }
            | Self::MissingConfig { .. }
            | Self::Internal { .. }
            | Self::Json(_)
            | Self::Http(_) => false,
        }
    }

    /// Delay the provider asked for before the next attempt (Retry-After)
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => *retry_after,
            Self::ServiceUnavailable { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized { .. } => {
                "Authentication failed. Please check your API key.".to_string()
            }
            Self::RateLimitExceeded { .. } => {
                "Rate limit exceeded. Please try again later.".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Classify an HTTP status returned by a provider
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized { message },
            429 => Self::RateLimitExceeded {
                limit_type: message,
                retry_after,
            },
            503 => Self::ServiceUnavailable { retry_after },
            _ => Self::ProviderError { status, message },
        }
    }
}

impl From<serde_json::Error> for HeraldError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<reqwest::Error> for HeraldError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                duration: Duration::from_secs(0),
            };
        }
        if err.is_connect() || err.is_request() {
            return Self::ConnectionFailed {
                message: err.to_string(),
            };
        }
        Self::Http(err.to_string())
    }
}

/// Result type alias using HeraldError
pub type Result<T> = std::result::Result<T, HeraldError>;
