//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use feedsync_core::{
    now_millis, ContentHash, DeviceRecord, Feed, FeedItem, ReadItem, SyncChainConfig,
};

use crate::error::{Result, StoreError};
use crate::traits::Store;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// The single chain record.
    chain: Option<SyncChainConfig>,

    /// Feeds keyed by URL (BTreeMap keeps URL order).
    feeds: BTreeMap<String, Feed>,

    /// Items keyed by local id.
    items: BTreeMap<i64, FeedItem>,

    /// Last assigned item id.
    last_item_id: i64,

    /// Cached device list.
    devices: Vec<DeviceRecord>,

    /// URLs seen in the last feed pull.
    remote_feed_urls: BTreeSet<String>,

    /// Remote read marks with no matching item: (feed_url, guid) -> received_at.
    pending_read_marks: BTreeMap<(String, String), i64>,
}

impl MemoryStoreInner {
    fn find_item_mut(&mut self, feed_url: &str, guid: &str) -> Option<&mut FeedItem> {
        self.items
            .values_mut()
            .find(|item| item.feed_url == feed_url && item.guid == guid)
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Host-side helpers (not part of the engine's interface)
    // ─────────────────────────────────────────────────────────────────────────

    /// Add an article to an existing feed, unread.
    ///
    /// Returns the existing item if `(feed_url, guid)` is already present.
    pub fn add_item(&self, feed_url: &str, guid: &str) -> Result<FeedItem> {
        let mut inner = self.write()?;

        if !inner.feeds.contains_key(feed_url) {
            return Err(StoreError::NotFound(format!("feed {}", feed_url)));
        }
        if let Some(existing) = inner.find_item_mut(feed_url, guid) {
            return Ok(existing.clone());
        }

        inner.last_item_id += 1;
        let item = FeedItem {
            id: inner.last_item_id,
            feed_url: feed_url.to_string(),
            guid: guid.to_string(),
            read: false,
            read_mark_synced: false,
        };
        inner.items.insert(item.id, item.clone());
        Ok(item)
    }

    /// Mark an item read locally; its read mark becomes due for push.
    pub fn mark_item_read(&self, item_id: i64) -> Result<()> {
        let mut inner = self.write()?;
        let item = inner
            .items
            .get_mut(&item_id)
            .ok_or_else(|| StoreError::NotFound(format!("item {}", item_id)))?;
        item.read = true;
        item.read_mark_synced = false;
        Ok(())
    }

    /// Look up an item by feed URL and guid.
    pub fn get_item(&self, feed_url: &str, guid: &str) -> Result<Option<FeedItem>> {
        let inner = self.read()?;
        Ok(inner
            .items
            .values()
            .find(|item| item.feed_url == feed_url && item.guid == guid)
            .cloned())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_sync_chain_config(&self) -> Result<Option<SyncChainConfig>> {
        Ok(self.read()?.chain.clone())
    }

    async fn update_sync_chain_config(&self, config: &SyncChainConfig) -> Result<()> {
        self.write()?.chain = Some(config.clone());
        Ok(())
    }

    async fn replace_with_default_sync_chain(&self, default: &SyncChainConfig) -> Result<()> {
        let mut inner = self.write()?;
        inner.chain = Some(default.clone());
        inner.devices.clear();
        inner.remote_feed_urls.clear();
        inner.pending_read_marks.clear();
        Ok(())
    }

    async fn update_latest_message_timestamp(&self, timestamp: i64) -> Result<()> {
        let mut inner = self.write()?;
        if let Some(chain) = inner.chain.as_mut() {
            chain.latest_message_timestamp = chain.latest_message_timestamp.max(timestamp);
        }
        Ok(())
    }

    async fn update_last_feeds_remote_hash(&self, hash: ContentHash) -> Result<()> {
        let mut inner = self.write()?;
        if let Some(chain) = inner.chain.as_mut() {
            chain.last_feeds_remote_hash = hash;
        }
        Ok(())
    }

    async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        Ok(self.read()?.feeds.get(url).cloned())
    }

    async fn save_feed(&self, feed: &Feed) -> Result<()> {
        self.write()?.feeds.insert(feed.url.clone(), feed.clone());
        Ok(())
    }

    async fn delete_feed_by_url(&self, url: &str) -> Result<bool> {
        let mut inner = self.write()?;
        let removed = inner.feeds.remove(url).is_some();
        inner.items.retain(|_, item| item.feed_url != url);
        Ok(removed)
    }

    async fn get_all_feeds_ordered_by_url(&self) -> Result<Vec<Feed>> {
        Ok(self.read()?.feeds.values().cloned().collect())
    }

    async fn get_unsynced_read_items(&self) -> Result<Vec<ReadItem>> {
        let inner = self.read()?;
        Ok(inner
            .items
            .values()
            .filter(|item| item.read && !item.read_mark_synced)
            .map(|item| ReadItem {
                item_id: item.id,
                feed_url: item.feed_url.clone(),
                guid: item.guid.clone(),
            })
            .collect())
    }

    async fn mark_item_synced(&self, item_id: i64) -> Result<()> {
        if let Some(item) = self.write()?.items.get_mut(&item_id) {
            item.read_mark_synced = true;
        }
        Ok(())
    }

    async fn apply_remote_read_mark(&self, feed_url: &str, guid: &str) -> Result<bool> {
        let mut inner = self.write()?;

        if let Some(item) = inner.find_item_mut(feed_url, guid) {
            item.read = true;
            item.read_mark_synced = true;
            return Ok(true);
        }

        inner
            .pending_read_marks
            .entry((feed_url.to_string(), guid.to_string()))
            .or_insert_with(now_millis);
        Ok(false)
    }

    async fn apply_pending_read_marks(&self) -> Result<usize> {
        let mut inner = self.write()?;
        let pending: Vec<(String, String)> = inner.pending_read_marks.keys().cloned().collect();

        let mut applied = 0;
        for (feed_url, guid) in pending {
            if let Some(item) = inner.find_item_mut(&feed_url, &guid) {
                item.read = true;
                item.read_mark_synced = true;
                inner.pending_read_marks.remove(&(feed_url, guid));
                applied += 1;
            }
        }
        Ok(applied)
    }

    async fn prune_pending_read_marks(&self, older_than: i64) -> Result<usize> {
        let mut inner = self.write()?;
        let before = inner.pending_read_marks.len();
        inner
            .pending_read_marks
            .retain(|_, received_at| *received_at >= older_than);
        Ok(before - inner.pending_read_marks.len())
    }

    async fn get_devices(&self) -> Result<Vec<DeviceRecord>> {
        let mut devices = self.read()?.devices.clone();
        devices.sort_by_key(|d| d.device_id);
        Ok(devices)
    }

    async fn replace_device_list(&self, devices: &[DeviceRecord]) -> Result<()> {
        self.write()?.devices = devices.to_vec();
        Ok(())
    }

    async fn get_remote_feed_urls(&self) -> Result<BTreeSet<String>> {
        Ok(self.read()?.remote_feed_urls.clone())
    }

    async fn replace_remote_feed_url_snapshot(&self, urls: &BTreeSet<String>) -> Result<()> {
        self.write()?.remote_feed_urls = urls.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedsync_core::DeviceId;

    fn joined_chain() -> SyncChainConfig {
        SyncChainConfig::unconfigured("https://relay.example", "phone", "a2V5")
            .joined("chain", DeviceId(1))
    }

    #[tokio::test]
    async fn test_chain_record_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get_sync_chain_config().await.unwrap().is_none());

        let chain = joined_chain();
        store.update_sync_chain_config(&chain).await.unwrap();
        assert_eq!(store.get_sync_chain_config().await.unwrap(), Some(chain));
    }

    #[tokio::test]
    async fn test_high_water_mark_never_decreases() {
        let store = MemoryStore::new();
        store.update_sync_chain_config(&joined_chain()).await.unwrap();

        store.update_latest_message_timestamp(500).await.unwrap();
        store.update_latest_message_timestamp(100).await.unwrap();

        let chain = store.get_sync_chain_config().await.unwrap().unwrap();
        assert_eq!(chain.latest_message_timestamp, 500);
    }

    #[tokio::test]
    async fn test_feeds_ordered_by_url() {
        let store = MemoryStore::new();
        store.save_feed(&Feed::new("https://b.example")).await.unwrap();
        store.save_feed(&Feed::new("https://a.example")).await.unwrap();

        let urls: Vec<String> = store
            .get_all_feeds_ordered_by_url()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.url)
            .collect();
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
    }

    #[tokio::test]
    async fn test_delete_feed_removes_items() {
        let store = MemoryStore::new();
        store.save_feed(&Feed::new("u")).await.unwrap();
        store.add_item("u", "g1").unwrap();

        assert!(store.delete_feed_by_url("u").await.unwrap());
        assert!(!store.delete_feed_by_url("u").await.unwrap());
        assert!(store.get_item("u", "g1").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsynced_read_items() {
        let store = MemoryStore::new();
        store.save_feed(&Feed::new("u")).await.unwrap();
        let a = store.add_item("u", "a").unwrap();
        let b = store.add_item("u", "b").unwrap();
        store.add_item("u", "c").unwrap();

        store.mark_item_read(a.id).unwrap();
        store.mark_item_read(b.id).unwrap();

        let unsynced = store.get_unsynced_read_items().await.unwrap();
        assert_eq!(unsynced.len(), 2);

        store.mark_item_synced(a.id).await.unwrap();
        let unsynced = store.get_unsynced_read_items().await.unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].guid, "b");
    }

    #[tokio::test]
    async fn test_remote_read_mark_pending_then_applied() {
        let store = MemoryStore::new();
        store.save_feed(&Feed::new("u")).await.unwrap();

        assert!(!store.apply_remote_read_mark("u", "later").await.unwrap());
        assert_eq!(store.apply_pending_read_marks().await.unwrap(), 0);

        store.add_item("u", "later").unwrap();
        assert_eq!(store.apply_pending_read_marks().await.unwrap(), 1);

        let item = store.get_item("u", "later").unwrap().unwrap();
        assert!(item.read);
        assert!(item.read_mark_synced);
        // Applied marks are not pushed back.
        assert!(store.get_unsynced_read_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prune_pending_read_marks() {
        let store = MemoryStore::new();
        store.apply_remote_read_mark("gone", "g").await.unwrap();

        assert_eq!(store.prune_pending_read_marks(0).await.unwrap(), 0);
        assert_eq!(store.prune_pending_read_marks(i64::MAX).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_with_default_clears_caches() {
        let store = MemoryStore::new();
        store.update_sync_chain_config(&joined_chain()).await.unwrap();
        store.save_feed(&Feed::new("u")).await.unwrap();
        store
            .replace_device_list(&[DeviceRecord {
                device_id: DeviceId(1),
                device_name: "phone".into(),
            }])
            .await
            .unwrap();
        store
            .replace_remote_feed_url_snapshot(&BTreeSet::from(["u".to_string()]))
            .await
            .unwrap();

        let default = SyncChainConfig::unconfigured("https://relay.example", "phone", "bmV3");
        store.replace_with_default_sync_chain(&default).await.unwrap();

        assert_eq!(store.get_sync_chain_config().await.unwrap(), Some(default));
        assert!(store.get_devices().await.unwrap().is_empty());
        assert!(store.get_remote_feed_urls().await.unwrap().is_empty());
        // Feeds survive leaving a chain.
        assert!(store.get_feed_by_url("u").await.unwrap().is_some());
    }

    #[test]
    fn test_add_item_requires_feed() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.add_item("missing", "g"),
            Err(StoreError::NotFound(_))
        ));
    }
}
