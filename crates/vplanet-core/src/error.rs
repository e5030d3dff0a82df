//! Error types for the calendar API client
//!
//! Mutation and read errors are surfaced to callers unmodified. Errors
//! internal to the sync engine (push channel, polling, listener panics)
//! are logged and recovered locally, never raised through these types.

use thiserror::Error;

/// Errors returned by calendar REST operations
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network-level failure (connect, timeout, TLS, body read)
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server replied with the error envelope (`success: false`)
    #[error("API error {code}: {message}")]
    Api {
        message: String,
        code: String,
        details: Option<serde_json::Value>,
    },

    /// Server replied `success: true` but the data field was missing
    #[error("API response marked successful but carried no data")]
    MissingData,

    /// Response body was not a valid envelope
    #[error("Failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL cannot be joined with an endpoint path
    #[error("Invalid API base URL: {0}")]
    InvalidBase(#[from] url::ParseError),
}

impl ApiError {
    /// True for failures worth retrying at the HTTP layer (pure network
    /// errors, not server-reported ones).
    pub fn is_network(&self) -> bool {
        match self {
            ApiError::Transport(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
