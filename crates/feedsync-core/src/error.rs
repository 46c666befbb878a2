//! Error types for FeedSync Core.

use thiserror::Error;

/// Core errors that can occur while encoding the data model.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    EncodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
