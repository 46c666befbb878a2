//! Store trait: the narrow repository interface the sync engine consumes.
//!
//! Implementations must give per-record atomicity: a single chain record
//! update, a device list replacement or a feed row write is never observed
//! half done.

use std::collections::BTreeSet;

use async_trait::async_trait;
use feedsync_core::{ContentHash, DeviceRecord, Feed, FeedEntry, ReadItem, SyncChainConfig};

use crate::error::Result;

/// The Store trait: async interface for the sync engine's local state.
///
/// All methods are async so SQLite can run on the blocking pool.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Sync Chain
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the stored chain record, if one was ever written.
    async fn get_sync_chain_config(&self) -> Result<Option<SyncChainConfig>>;

    /// Insert or overwrite the chain record.
    async fn update_sync_chain_config(&self, config: &SyncChainConfig) -> Result<()>;

    /// Reset to an unconfigured chain.
    ///
    /// Writes `default` as the chain record and clears every cache tied to
    /// the old chain: the device list, the remote feed snapshot and pending
    /// remote read marks. Feeds and items are kept.
    async fn replace_with_default_sync_chain(&self, default: &SyncChainConfig) -> Result<()>;

    /// Raise the read-mark high-water mark to `timestamp`.
    ///
    /// Never lowers it. No-op when there is no chain record.
    async fn update_latest_message_timestamp(&self, timestamp: i64) -> Result<()>;

    /// Record the feed hash agreed with the relay.
    ///
    /// No-op when there is no chain record.
    async fn update_last_feeds_remote_hash(&self, hash: ContentHash) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Feeds
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a feed by URL.
    async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>>;

    /// Insert or overwrite a feed, keyed by URL.
    async fn save_feed(&self, feed: &Feed) -> Result<()>;

    /// Delete a feed and its items. Returns whether a feed was removed.
    async fn delete_feed_by_url(&self, url: &str) -> Result<bool>;

    /// All feeds, ordered by URL.
    async fn get_all_feeds_ordered_by_url(&self) -> Result<Vec<Feed>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Read Marks
    // ─────────────────────────────────────────────────────────────────────────

    /// Items that are read but whose read mark has not been pushed, ordered
    /// by item id.
    async fn get_unsynced_read_items(&self) -> Result<Vec<ReadItem>>;

    /// Flag an item's read mark as pushed.
    async fn mark_item_synced(&self, item_id: i64) -> Result<()>;

    /// Apply a read mark received from another device.
    ///
    /// Returns `true` if a local item matched and is now read. On a miss the
    /// mark is kept as pending and `false` is returned; a miss is not an
    /// error.
    async fn apply_remote_read_mark(&self, feed_url: &str, guid: &str) -> Result<bool>;

    /// Apply pending marks whose item has since arrived. Returns how many
    /// were applied.
    async fn apply_pending_read_marks(&self) -> Result<usize>;

    /// Drop pending marks received before `older_than` (Unix ms). Returns
    /// how many were dropped.
    async fn prune_pending_read_marks(&self, older_than: i64) -> Result<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Devices
    // ─────────────────────────────────────────────────────────────────────────

    /// The cached device list, ordered by device id.
    async fn get_devices(&self) -> Result<Vec<DeviceRecord>>;

    /// Replace the cached device list.
    async fn replace_device_list(&self, devices: &[DeviceRecord]) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Remote Feed Snapshot
    // ─────────────────────────────────────────────────────────────────────────

    /// URLs seen in the last successful feed pull.
    async fn get_remote_feed_urls(&self) -> Result<BTreeSet<String>>;

    /// Replace the remote feed snapshot.
    async fn replace_remote_feed_url_snapshot(&self, urls: &BTreeSet<String>) -> Result<()>;
}

/// Extension methods for Store.
pub trait StoreExt: Store {
    /// The synced projection of every local feed, ordered by URL.
    fn get_feed_entries_ordered_by_url(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<FeedEntry>>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn get_feed_entries_ordered_by_url(&self) -> Result<Vec<FeedEntry>> {
        let feeds = self.get_all_feeds_ordered_by_url().await?;
        Ok(feeds.iter().map(FeedEntry::from).collect())
    }
}
