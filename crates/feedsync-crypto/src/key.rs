//! The shared chain key and its transportable string form.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CryptoError, Result};

/// Length of a [`SecretKey`] in bytes.
pub const KEY_LEN: usize = 32;

/// A 256-bit symmetric key for ChaCha20-Poly1305, shared by every device
/// in a chain.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Encrypt data with this key.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;

        cipher
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))
    }

    /// Decrypt data with this key.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CryptoError::DecryptionError(e.to_string()))?;

        cipher
            .decrypt(Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|_| CryptoError::DecryptionError("authentication failed".into()))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; 12]);

impl EncryptionNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

/// Encode a key to its transportable form (standard base64).
pub fn encode_key(key: &SecretKey) -> String {
    STANDARD.encode(key.0)
}

/// Decode a key from its transportable form.
///
/// Surrounding whitespace is ignored, since keys are often pasted by hand.
pub fn decode_key(encoded: &str) -> Result<SecretKey> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let arr: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
        CryptoError::InvalidKey(format!(
            "invalid key length: expected {}, got {}",
            KEY_LEN,
            bytes.len()
        ))
    })?;

    Ok(SecretKey(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_codec_roundtrip() {
        let key = SecretKey::generate();
        let encoded = encode_key(&key);
        let decoded = decode_key(&encoded).unwrap();
        assert_eq!(key, decoded);
    }

    #[test]
    fn test_decode_trims_whitespace() {
        let key = SecretKey::from_bytes([7; KEY_LEN]);
        let encoded = format!("  {}\n", encode_key(&key));
        assert_eq!(decode_key(&encoded).unwrap(), key);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let short = STANDARD.encode([1u8; 16]);
        assert!(matches!(decode_key(&short), Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_key("not base64!"), Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let key1 = SecretKey::generate();
        let key2 = SecretKey::generate();
        let nonce = EncryptionNonce::generate();

        let ciphertext = key1.encrypt(b"secret", &nonce).unwrap();
        assert!(key2.decrypt(&ciphertext, &nonce).is_err());
    }

    #[test]
    fn test_debug_does_not_leak() {
        let key = SecretKey::from_bytes([0xab; KEY_LEN]);
        assert_eq!(format!("{:?}", key), "SecretKey(..)");
    }
}
