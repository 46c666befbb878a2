//! Canonical encoding and content hashing of feed lists.
//!
//! Every device must compute the same hash for the same set of feeds, so
//! the encoding is fixed:
//! - Entries ordered by URL (byte-wise)
//! - Each entry is a CBOR map with small integer keys in ascending order
//! - Integers use ciborium's smallest encoding, no floats
//!
//! The hash is Blake3 over a domain tag followed by the CBOR array,
//! folded to a signed 64-bit number so it fits the relay's numeric hash
//! field.

use ciborium::value::Value;

use crate::error::{CoreError, Result};
use crate::feed::FeedEntry;
use crate::types::ContentHash;

/// Domain separation tag for feed list hashes.
const FEEDS_DOMAIN: &[u8] = b"feedsync-feeds-v1:";

/// Entry field keys. Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const URL: u64 = 0;
    pub const TITLE: u64 = 1;
    pub const CUSTOM_TITLE: u64 = 2;
    pub const TAG: u64 = 3;
    pub const IMAGE_URL: u64 = 4;
    pub const FULL_TEXT_BY_DEFAULT: u64 = 5;
    pub const NOTIFY: u64 = 6;
    pub const WHEN_MODIFIED: u64 = 7;
}

/// Encode a feed list to canonical CBOR bytes.
///
/// The input order does not matter; entries are sorted by URL first.
pub fn canonical_feed_bytes(entries: &[FeedEntry]) -> Result<Vec<u8>> {
    let mut ordered: Vec<&FeedEntry> = entries.iter().collect();
    ordered.sort_by(|a, b| a.url.as_bytes().cmp(b.url.as_bytes()));

    let value = Value::Array(ordered.into_iter().map(entry_to_cbor_value).collect());

    let mut buf = Vec::new();
    ciborium::into_writer(&value, &mut buf).map_err(|e| CoreError::EncodingError(e.to_string()))?;
    Ok(buf)
}

/// Compute the content hash of a feed list.
///
/// Never returns [`ContentHash::NONE`]; a zero fold is nudged to 1 so the
/// sentinel keeps meaning "never synced".
pub fn feed_list_hash(entries: &[FeedEntry]) -> Result<ContentHash> {
    let bytes = canonical_feed_bytes(entries)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(FEEDS_DOMAIN);
    hasher.update(&bytes);
    let digest = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    let folded = i64::from_le_bytes(head);

    Ok(ContentHash(if folded == 0 { 1 } else { folded }))
}

fn entry_to_cbor_value(entry: &FeedEntry) -> Value {
    let image_url = match &entry.image_url {
        Some(url) => Value::Text(url.clone()),
        None => Value::Null,
    };

    Value::Map(vec![
        (key(keys::URL), Value::Text(entry.url.clone())),
        (key(keys::TITLE), Value::Text(entry.title.clone())),
        (key(keys::CUSTOM_TITLE), Value::Text(entry.custom_title.clone())),
        (key(keys::TAG), Value::Text(entry.tag.clone())),
        (key(keys::IMAGE_URL), image_url),
        (key(keys::FULL_TEXT_BY_DEFAULT), Value::Bool(entry.full_text_by_default)),
        (key(keys::NOTIFY), Value::Bool(entry.notify)),
        (key(keys::WHEN_MODIFIED), Value::Integer(entry.when_modified.into())),
    ])
}

fn key(k: u64) -> Value {
    Value::Integer(k.into())
}
