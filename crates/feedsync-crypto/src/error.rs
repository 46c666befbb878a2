//! Error types for the crypto envelope.

use thiserror::Error;

/// Errors that can occur while sealing or opening payloads.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Ciphertext failed authentication (tampered or wrong key).
    #[error("decryption error: {0}")]
    DecryptionError(String),

    /// Key string could not be decoded.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Envelope or plaintext is not in the expected shape.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
