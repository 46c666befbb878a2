//! Strong type definitions for the sync engine.
//!
//! Identifiers that travel unencrypted are newtypes so they cannot be mixed
//! up with ordinary integers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned numeric device identifier.
///
/// Zero means "not assigned yet".
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

impl DeviceId {
    /// The unassigned sentinel.
    pub const UNASSIGNED: Self = Self(0);

    /// Whether the relay has assigned this id.
    pub const fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for DeviceId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Content hash of a feed list.
///
/// Computed with [`crate::feed_list_hash`]. The relay stores it verbatim and
/// uses it as a weak ETag, so it is a plain signed 64-bit number on the wire.
/// Zero is reserved for "nothing synced yet".
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub i64);

impl ContentHash {
    /// The "never synced" sentinel.
    pub const NONE: Self = Self(0);

    /// Get the raw value.
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Whether this is the "never synced" sentinel.
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Render as a weak entity tag: `W/"<hash>"`.
    pub fn to_weak_etag(&self) -> String {
        format!("W/\"{}\"", self.0)
    }

    /// Parse a weak (or strong) entity tag back into a hash.
    pub fn from_etag(etag: &str) -> Option<Self> {
        let tag = etag.trim();
        let tag = tag.strip_prefix("W/").unwrap_or(tag);
        let tag = tag.strip_prefix('"')?.strip_suffix('"')?;
        tag.parse().ok().map(Self)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ContentHash {
    fn from(value: i64) -> Self {
        Self(value)
    }
}
