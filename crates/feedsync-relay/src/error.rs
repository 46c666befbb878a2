//! Error types for the relay client.

use thiserror::Error;

/// Errors that can occur talking to the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Connection, TLS, timeout or body transfer failure.
    #[error("network error: {0}")]
    Network(String),

    /// The feed snapshot changed on the relay since our last sync (HTTP 412).
    #[error("precondition failed: remote feeds changed")]
    PreconditionFailed,

    /// Any other non-success status.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// A success response whose body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The relay base URL is not a usable http(s) URL.
    #[error("invalid relay url: {0}")]
    InvalidUrl(String),
}

impl RelayError {
    /// Whether this is an optimistic-concurrency conflict.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed)
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
