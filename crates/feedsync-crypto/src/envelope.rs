//! Encrypted payload envelope.
//!
//! Relay payloads are plaintext JSON sealed into an [`EncryptedPayload`],
//! which is then CBOR + base64 encoded into a single string.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, Result};
use crate::key::{EncryptionNonce, SecretKey};

/// Format identifier for encrypted payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// ChaCha20-Poly1305 with 256-bit key.
    ChaCha20Poly1305 = 1,
}

/// An encrypted payload envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Encryption algorithm used.
    pub format: EncryptionFormat,

    /// Nonce used for encryption (unique per encryption).
    pub nonce: EncryptionNonce,

    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Encrypt plaintext with the given key.
    pub fn encrypt(plaintext: &[u8], key: &SecretKey) -> Result<Self> {
        let nonce = EncryptionNonce::generate();
        let ciphertext = key.encrypt(plaintext, &nonce)?;

        Ok(Self {
            format: EncryptionFormat::ChaCha20Poly1305,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt with the given key.
    pub fn decrypt(&self, key: &SecretKey) -> Result<Vec<u8>> {
        match self.format {
            EncryptionFormat::ChaCha20Poly1305 => key.decrypt(&self.ciphertext, &self.nonce),
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CryptoError::SerializationError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CryptoError::Malformed(e.to_string()))
    }

    /// Encode for a JSON string field.
    pub fn to_wire(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }

    /// Decode from a JSON string field.
    pub fn from_wire(wire: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(wire.trim())
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

/// Seal a string. Returns the wire form.
pub fn encrypt_string(plaintext: &str, key: &SecretKey) -> Result<String> {
    EncryptedPayload::encrypt(plaintext.as_bytes(), key)?.to_wire()
}

/// Open a string sealed with [`encrypt_string`].
pub fn decrypt_string(wire: &str, key: &SecretKey) -> Result<String> {
    let plaintext = EncryptedPayload::from_wire(wire)?.decrypt(key)?;
    String::from_utf8(plaintext).map_err(|e| CryptoError::Malformed(e.to_string()))
}

/// Serialize a value to JSON and seal it.
pub fn encrypt_json<T: Serialize>(value: &T, key: &SecretKey) -> Result<String> {
    let json =
        serde_json::to_string(value).map_err(|e| CryptoError::SerializationError(e.to_string()))?;
    encrypt_string(&json, key)
}

/// Open a sealed JSON document and deserialize it.
pub fn decrypt_json<T: DeserializeOwned>(wire: &str, key: &SecretKey) -> Result<T> {
    let json = decrypt_string(wire, key)?;
    serde_json::from_str(&json).map_err(|e| CryptoError::Malformed(e.to_string()))
}
