//! Read marks: one "article was read" action.

use serde::{Deserialize, Serialize};

use crate::feed::ReadItem;

/// Plaintext content of a read mark.
///
/// Serialized to JSON and encrypted before it reaches the relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadMark {
    pub feed_url: String,
    pub article_guid: String,
}

impl ReadMark {
    pub fn new(feed_url: impl Into<String>, article_guid: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            article_guid: article_guid.into(),
        }
    }
}

impl From<&ReadItem> for ReadMark {
    fn from(item: &ReadItem) -> Self {
        Self {
            feed_url: item.feed_url.clone(),
            article_guid: item.guid.clone(),
        }
    }
}

/// A decrypted read mark together with the relay's timestamp for it.
///
/// Ephemeral: applied once, then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadMarkEvent {
    pub mark: ReadMark,
    /// Relay-assigned timestamp (Unix ms).
    pub timestamp: i64,
}
