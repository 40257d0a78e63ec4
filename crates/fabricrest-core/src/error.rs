//! Executor-level error types.

use thiserror::Error;

/// Errors that can occur while executing an API request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection refused, timeout, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-2xx response from the controller, passed through unmodified.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The caller's cancellation token fired before the call completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Returns `true` if this error is transport-level and transient.
    ///
    /// API-level errors and cancellation are never retryable; any transport
    /// retry is the executor implementation's own concern, not a caller's.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}
