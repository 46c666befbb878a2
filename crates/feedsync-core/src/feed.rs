//! Feeds and feed items as seen by the sync engine.

use serde::{Deserialize, Serialize};

/// A locally stored feed subscription.
///
/// The URL is the stable identity across devices. `when_modified` is the
/// logical clock used for last-writer-wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    /// Feed URL (identity).
    pub url: String,
    /// Title as published by the feed.
    pub title: String,
    /// User-assigned title, empty when unset.
    pub custom_title: String,
    /// Tag (folder) the feed belongs to, empty when untagged.
    pub tag: String,
    /// Feed image, if any.
    pub image_url: Option<String>,
    /// Whether articles should be fetched as full text by default.
    pub full_text_by_default: bool,
    /// Whether new articles raise a notification.
    pub notify: bool,
    /// Last modification of any synced field (Unix ms).
    pub when_modified: i64,
    /// Last successful fetch of the feed (Unix ms). Local only, never synced.
    pub last_sync: i64,
}

impl Feed {
    /// Create an empty feed for the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            custom_title: String::new(),
            tag: String::new(),
            image_url: None,
            full_text_by_default: false,
            notify: false,
            when_modified: 0,
            last_sync: 0,
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Set the modification clock.
    pub fn modified_at(mut self, when_modified: i64) -> Self {
        self.when_modified = when_modified;
        self
    }
}

/// The synced projection of a [`Feed`].
///
/// This is exactly what is hashed and encrypted for the relay, so field
/// order and names are part of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub custom_title: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub full_text_by_default: bool,
    #[serde(default)]
    pub notify: bool,
    pub when_modified: i64,
}

impl FeedEntry {
    /// Copy the synced fields onto `base`, keeping its local-only fields.
    ///
    /// Pass `Feed::new(url)` as the base to materialize a brand new feed.
    pub fn apply_to(&self, base: Feed) -> Feed {
        Feed {
            url: self.url.clone(),
            title: self.title.clone(),
            custom_title: self.custom_title.clone(),
            tag: self.tag.clone(),
            image_url: self.image_url.clone(),
            full_text_by_default: self.full_text_by_default,
            notify: self.notify,
            when_modified: self.when_modified,
            ..base
        }
    }

    /// Materialize a new local feed from this entry.
    pub fn to_feed(&self) -> Feed {
        self.apply_to(Feed::new(self.url.clone()))
    }
}

impl From<&Feed> for FeedEntry {
    fn from(feed: &Feed) -> Self {
        Self {
            url: feed.url.clone(),
            title: feed.title.clone(),
            custom_title: feed.custom_title.clone(),
            tag: feed.tag.clone(),
            image_url: feed.image_url.clone(),
            full_text_by_default: feed.full_text_by_default,
            notify: feed.notify,
            when_modified: feed.when_modified,
        }
    }
}

/// An article belonging to a feed, with its local read state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// Local row id.
    pub id: i64,
    /// URL of the owning feed.
    pub feed_url: String,
    /// Article guid, unique within its feed.
    pub guid: String,
    /// Whether the user has read the article.
    pub read: bool,
    /// Whether the read state has been propagated to (or came from) the relay.
    pub read_mark_synced: bool,
}

/// A read article whose read mark still has to be pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadItem {
    /// Local row id, used to flag the item once pushed.
    pub item_id: i64,
    pub feed_url: String,
    pub guid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_keeps_local_only_fields() {
        let mut local = Feed::new("https://example.com/rss").with_title("Old");
        local.last_sync = 555;

        let remote = FeedEntry {
            title: "New".into(),
            when_modified: 10,
            ..FeedEntry::from(&local)
        };

        let merged = remote.apply_to(local);
        assert_eq!(merged.title, "New");
        assert_eq!(merged.when_modified, 10);
        assert_eq!(merged.last_sync, 555);
    }

    #[test]
    fn test_entry_json_is_camel_case() {
        let feed = Feed::new("https://example.com/rss").modified_at(3);
        let json = serde_json::to_string(&FeedEntry::from(&feed)).unwrap();
        assert!(json.contains("\"whenModified\":3"));
        assert!(json.contains("\"fullTextByDefault\":false"));
    }
}
