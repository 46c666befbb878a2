//! Error types for the sync engine.

use feedsync_core::CoreError;
use feedsync_crypto::CryptoError;
use feedsync_relay::RelayError;
use feedsync_store::StoreError;
use thiserror::Error;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No sync chain is configured. A quiescent state, not a failure.
    #[error("sync chain is not configured")]
    NotConfigured,

    /// Decryption or encryption failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Relay unreachable or answered with an error.
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Feed encoding failed.
    #[error("encoding error: {0}")]
    Encoding(#[from] CoreError),

    /// Feed push still conflicted after re-pulling once.
    #[error("feed push conflicted again after re-pull")]
    Conflict,
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
