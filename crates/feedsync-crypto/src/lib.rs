//! # FeedSync Crypto
//!
//! The encryption envelope used for everything that crosses the relay.
//!
//! ## Overview
//!
//! All devices in a sync chain share one symmetric [`SecretKey`]. It is
//! generated when a chain is created and handed to other devices out of
//! band (as a string, see [`encode_key`] / [`decode_key`]). The relay only
//! ever sees ciphertext: device names, feed lists and read marks are
//! serialized to JSON, then sealed with ChaCha20-Poly1305.
//!
//! ## Wire Form
//!
//! An [`EncryptedPayload`] (format, nonce, ciphertext) is CBOR encoded and
//! then base64 encoded, so it fits a JSON string field.
//!
//! ## Usage
//!
//! ```rust
//! use feedsync_crypto::{decrypt_string, encrypt_string, SecretKey};
//!
//! let key = SecretKey::generate();
//! let sealed = encrypt_string("my phone", &key).unwrap();
//! assert_eq!(decrypt_string(&sealed, &key).unwrap(), "my phone");
//! ```

pub mod envelope;
pub mod error;
pub mod key;

pub use envelope::{
    decrypt_json, decrypt_string, encrypt_json, encrypt_string, EncryptedPayload,
    EncryptionFormat,
};
pub use error::{CryptoError, Result};
pub use key::{decode_key, encode_key, EncryptionNonce, SecretKey};
