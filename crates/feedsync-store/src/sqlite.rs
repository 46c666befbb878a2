//! SQLite implementation of the Store trait.
//!
//! This is the persistent backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use feedsync_core::{
    now_millis, ContentHash, DeviceId, DeviceRecord, Feed, FeedItem, ReadItem, SyncChainConfig,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::Store;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All trait operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute a short operation on the connection from the calling thread.
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        f(&conn)
    }

    /// Execute an operation on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Host-side helpers (not part of the engine's interface)
    // ─────────────────────────────────────────────────────────────────────────

    /// Add an article to an existing feed, unread.
    ///
    /// Returns the existing item if `(feed_url, guid)` is already present.
    pub fn add_item(&self, feed_url: &str, guid: &str) -> Result<FeedItem> {
        self.with_conn(|conn| {
            let feed_exists: Option<String> = conn
                .query_row(
                    "SELECT url FROM feeds WHERE url = ?1",
                    params![feed_url],
                    |row| row.get(0),
                )
                .optional()?;
            if feed_exists.is_none() {
                return Err(StoreError::NotFound(format!("feed {}", feed_url)));
            }

            conn.execute(
                "INSERT OR IGNORE INTO feed_items (feed_url, guid) VALUES (?1, ?2)",
                params![feed_url, guid],
            )?;

            Ok(conn.query_row(
                "SELECT id, feed_url, guid, read, read_mark_synced
                 FROM feed_items WHERE feed_url = ?1 AND guid = ?2",
                params![feed_url, guid],
                row_to_item,
            )?)
        })
    }

    /// Mark an item read locally; its read mark becomes due for push.
    pub fn mark_item_read(&self, item_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE feed_items SET read = 1, read_mark_synced = 0 WHERE id = ?1",
                params![item_id],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("item {}", item_id)));
            }
            Ok(())
        })
    }

    /// Look up an item by feed URL and guid.
    pub fn get_item(&self, feed_url: &str, guid: &str) -> Result<Option<FeedItem>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, feed_url, guid, read, read_mark_synced
                     FROM feed_items WHERE feed_url = ?1 AND guid = ?2",
                    params![feed_url, guid],
                    row_to_item,
                )
                .optional()?)
        })
    }
}

// Row helpers

fn row_to_chain(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncChainConfig> {
    Ok(SyncChainConfig {
        relay_url: row.get("relay_url")?,
        sync_chain_id: row.get("sync_chain_id")?,
        device_id: DeviceId(row.get("device_id")?),
        device_name: row.get("device_name")?,
        secret_key: row.get("secret_key")?,
        latest_message_timestamp: row.get("latest_message_timestamp")?,
        last_feeds_remote_hash: ContentHash(row.get("last_feeds_remote_hash")?),
    })
}

fn row_to_feed(row: &rusqlite::Row<'_>) -> rusqlite::Result<Feed> {
    Ok(Feed {
        url: row.get("url")?,
        title: row.get("title")?,
        custom_title: row.get("custom_title")?,
        tag: row.get("tag")?,
        image_url: row.get("image_url")?,
        full_text_by_default: row.get("full_text_by_default")?,
        notify: row.get("notify")?,
        when_modified: row.get("when_modified")?,
        last_sync: row.get("last_sync")?,
    })
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeedItem> {
    Ok(FeedItem {
        id: row.get("id")?,
        feed_url: row.get("feed_url")?,
        guid: row.get("guid")?,
        read: row.get("read")?,
        read_mark_synced: row.get("read_mark_synced")?,
    })
}

fn write_chain(conn: &Connection, config: &SyncChainConfig) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO sync_remote (
            id, relay_url, sync_chain_id, device_id, device_name, secret_key,
            latest_message_timestamp, last_feeds_remote_hash
        ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            config.relay_url,
            config.sync_chain_id,
            config.device_id.0,
            config.device_name,
            config.secret_key,
            config.latest_message_timestamp,
            config.last_feeds_remote_hash.value(),
        ],
    )?;
    Ok(())
}

const FEED_COLUMNS: &str = "url, title, custom_title, tag, image_url, full_text_by_default,
     notify, when_modified, last_sync";

#[async_trait]
impl Store for SqliteStore {
    async fn get_sync_chain_config(&self) -> Result<Option<SyncChainConfig>> {
        self.blocking(|conn| {
            Ok(conn
                .query_row("SELECT * FROM sync_remote WHERE id = 1", [], row_to_chain)
                .optional()?)
        })
        .await
    }

    async fn update_sync_chain_config(&self, config: &SyncChainConfig) -> Result<()> {
        let config = config.clone();
        self.blocking(move |conn| write_chain(conn, &config)).await
    }

    async fn replace_with_default_sync_chain(&self, default: &SyncChainConfig) -> Result<()> {
        let default = default.clone();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            write_chain(&tx, &default)?;
            tx.execute("DELETE FROM sync_device", [])?;
            tx.execute("DELETE FROM remote_feed", [])?;
            tx.execute("DELETE FROM remote_read_mark", [])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn update_latest_message_timestamp(&self, timestamp: i64) -> Result<()> {
        self.blocking(move |conn| {
            conn.execute(
                "UPDATE sync_remote
                 SET latest_message_timestamp = MAX(latest_message_timestamp, ?1)
                 WHERE id = 1",
                params![timestamp],
            )?;
            Ok(())
        })
        .await
    }

    async fn update_last_feeds_remote_hash(&self, hash: ContentHash) -> Result<()> {
        self.blocking(move |conn| {
            conn.execute(
                "UPDATE sync_remote SET last_feeds_remote_hash = ?1 WHERE id = 1",
                params![hash.value()],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let url = url.to_string();
        self.blocking(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM feeds WHERE url = ?1", FEED_COLUMNS),
                    params![url],
                    row_to_feed,
                )
                .optional()?)
        })
        .await
    }

    async fn save_feed(&self, feed: &Feed) -> Result<()> {
        let feed = feed.clone();
        self.blocking(move |conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO feeds ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    FEED_COLUMNS
                ),
                params![
                    feed.url,
                    feed.title,
                    feed.custom_title,
                    feed.tag,
                    feed.image_url,
                    feed.full_text_by_default,
                    feed.notify,
                    feed.when_modified,
                    feed.last_sync,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_feed_by_url(&self, url: &str) -> Result<bool> {
        let url = url.to_string();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM feed_items WHERE feed_url = ?1", params![url])?;
            let removed = tx.execute("DELETE FROM feeds WHERE url = ?1", params![url])?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }

    async fn get_all_feeds_ordered_by_url(&self) -> Result<Vec<Feed>> {
        self.blocking(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM feeds ORDER BY url", FEED_COLUMNS))?;
            let feeds = stmt
                .query_map([], row_to_feed)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(feeds)
        })
        .await
    }

    async fn get_unsynced_read_items(&self) -> Result<Vec<ReadItem>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, feed_url, guid FROM feed_items
                 WHERE read = 1 AND read_mark_synced = 0
                 ORDER BY id",
            )?;
            let items = stmt
                .query_map([], |row| {
                    Ok(ReadItem {
                        item_id: row.get(0)?,
                        feed_url: row.get(1)?,
                        guid: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(items)
        })
        .await
    }

    async fn mark_item_synced(&self, item_id: i64) -> Result<()> {
        self.blocking(move |conn| {
            conn.execute(
                "UPDATE feed_items SET read_mark_synced = 1 WHERE id = ?1",
                params![item_id],
            )?;
            Ok(())
        })
        .await
    }

    async fn apply_remote_read_mark(&self, feed_url: &str, guid: &str) -> Result<bool> {
        let feed_url = feed_url.to_string();
        let guid = guid.to_string();
        self.blocking(move |conn| {
            let updated = conn.execute(
                "UPDATE feed_items SET read = 1, read_mark_synced = 1
                 WHERE feed_url = ?1 AND guid = ?2",
                params![feed_url, guid],
            )?;
            if updated > 0 {
                return Ok(true);
            }

            conn.execute(
                "INSERT OR IGNORE INTO remote_read_mark (feed_url, guid, received_at)
                 VALUES (?1, ?2, ?3)",
                params![feed_url, guid, now_millis()],
            )?;
            Ok(false)
        })
        .await
    }

    async fn apply_pending_read_marks(&self) -> Result<usize> {
        self.blocking(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE feed_items SET read = 1, read_mark_synced = 1
                 WHERE EXISTS (
                     SELECT 1 FROM remote_read_mark r
                     WHERE r.feed_url = feed_items.feed_url AND r.guid = feed_items.guid
                 )",
                [],
            )?;
            let applied = tx.execute(
                "DELETE FROM remote_read_mark
                 WHERE EXISTS (
                     SELECT 1 FROM feed_items i
                     WHERE i.feed_url = remote_read_mark.feed_url
                       AND i.guid = remote_read_mark.guid
                 )",
                [],
            )?;
            tx.commit()?;
            Ok(applied)
        })
        .await
    }

    async fn prune_pending_read_marks(&self, older_than: i64) -> Result<usize> {
        self.blocking(move |conn| {
            Ok(conn.execute(
                "DELETE FROM remote_read_mark WHERE received_at < ?1",
                params![older_than],
            )?)
        })
        .await
    }

    async fn get_devices(&self) -> Result<Vec<DeviceRecord>> {
        self.blocking(|conn| {
            let mut stmt =
                conn.prepare("SELECT device_id, device_name FROM sync_device ORDER BY device_id")?;
            let devices = stmt
                .query_map([], |row| {
                    Ok(DeviceRecord {
                        device_id: DeviceId(row.get(0)?),
                        device_name: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(devices)
        })
        .await
    }

    async fn replace_device_list(&self, devices: &[DeviceRecord]) -> Result<()> {
        let devices = devices.to_vec();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM sync_device", [])?;
            for device in &devices {
                tx.execute(
                    "INSERT OR REPLACE INTO sync_device (device_id, device_name) VALUES (?1, ?2)",
                    params![device.device_id.0, device.device_name],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_remote_feed_urls(&self) -> Result<BTreeSet<String>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare("SELECT url FROM remote_feed")?;
            let urls = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<BTreeSet<String>>>()?;
            Ok(urls)
        })
        .await
    }

    async fn replace_remote_feed_url_snapshot(&self, urls: &BTreeSet<String>) -> Result<()> {
        let urls = urls.clone();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM remote_feed", [])?;
            for url in &urls {
                tx.execute("INSERT INTO remote_feed (url) VALUES (?1)", params![url])?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn joined_chain() -> SyncChainConfig {
        SyncChainConfig::unconfigured("https://relay.example", "laptop", "a2V5")
            .joined("chain-1", DeviceId(2))
    }

    #[tokio::test]
    async fn test_chain_record_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.get_sync_chain_config().await.unwrap().is_none());

        let mut chain = joined_chain();
        chain.last_feeds_remote_hash = ContentHash(-77);
        store.update_sync_chain_config(&chain).await.unwrap();

        assert_eq!(store.get_sync_chain_config().await.unwrap(), Some(chain));
    }

    #[tokio::test]
    async fn test_metadata_updates_without_record_are_noops() {
        let store = SqliteStore::open_memory().unwrap();
        store.update_latest_message_timestamp(10).await.unwrap();
        store
            .update_last_feeds_remote_hash(ContentHash(5))
            .await
            .unwrap();
        assert!(store.get_sync_chain_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_feed_roundtrip_and_upsert() {
        let store = SqliteStore::open_memory().unwrap();
        let mut feed = Feed::new("https://example.com/rss")
            .with_title("Example")
            .with_tag("news")
            .modified_at(42);
        feed.image_url = Some("https://example.com/logo.png".into());
        feed.notify = true;
        store.save_feed(&feed).await.unwrap();

        assert_eq!(
            store.get_feed_by_url(&feed.url).await.unwrap(),
            Some(feed.clone())
        );

        let renamed = feed.clone().with_title("Renamed").modified_at(43);
        store.save_feed(&renamed).await.unwrap();
        let all = store.get_all_feeds_ordered_by_url().await.unwrap();
        assert_eq!(all, vec![renamed]);
    }

    #[tokio::test]
    async fn test_delete_feed_removes_items() {
        let store = SqliteStore::open_memory().unwrap();
        store.save_feed(&Feed::new("u")).await.unwrap();
        store.add_item("u", "g").unwrap();

        assert!(store.delete_feed_by_url("u").await.unwrap());
        assert!(!store.delete_feed_by_url("u").await.unwrap());
        assert!(store.get_item("u", "g").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_item_lifecycle() {
        let store = SqliteStore::open_memory().unwrap();
        store.save_feed(&Feed::new("u")).await.unwrap();
        let item = store.add_item("u", "g").unwrap();
        assert_eq!(store.add_item("u", "g").unwrap().id, item.id);

        store.mark_item_read(item.id).unwrap();
        let unsynced = store.get_unsynced_read_items().await.unwrap();
        assert_eq!(
            unsynced,
            vec![ReadItem {
                item_id: item.id,
                feed_url: "u".into(),
                guid: "g".into()
            }]
        );

        store.mark_item_synced(item.id).await.unwrap();
        assert!(store.get_unsynced_read_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_read_mark_hit_and_pending() {
        let store = SqliteStore::open_memory().unwrap();
        store.save_feed(&Feed::new("u")).await.unwrap();
        store.add_item("u", "present").unwrap();

        assert!(store.apply_remote_read_mark("u", "present").await.unwrap());
        assert!(!store.apply_remote_read_mark("u", "absent").await.unwrap());
        // Repeated miss keeps a single pending row.
        assert!(!store.apply_remote_read_mark("u", "absent").await.unwrap());

        let present = store.get_item("u", "present").unwrap().unwrap();
        assert!(present.read && present.read_mark_synced);

        store.add_item("u", "absent").unwrap();
        assert_eq!(store.apply_pending_read_marks().await.unwrap(), 1);
        assert_eq!(store.apply_pending_read_marks().await.unwrap(), 0);
        assert!(store.get_item("u", "absent").unwrap().unwrap().read);
    }

    #[tokio::test]
    async fn test_prune_pending_read_marks() {
        let store = SqliteStore::open_memory().unwrap();
        store.apply_remote_read_mark("gone", "g").await.unwrap();

        assert_eq!(store.prune_pending_read_marks(0).await.unwrap(), 0);
        assert_eq!(store.prune_pending_read_marks(i64::MAX).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_device_list_replaced() {
        let store = SqliteStore::open_memory().unwrap();
        let first = vec![
            DeviceRecord {
                device_id: DeviceId(3),
                device_name: "tablet".into(),
            },
            DeviceRecord {
                device_id: DeviceId(1),
                device_name: "phone".into(),
            },
        ];
        store.replace_device_list(&first).await.unwrap();
        let devices = store.get_devices().await.unwrap();
        assert_eq!(devices[0].device_id, DeviceId(1));
        assert_eq!(devices.len(), 2);

        store.replace_device_list(&first[..1]).await.unwrap();
        assert_eq!(store.get_devices().await.unwrap(), first[..1].to_vec());
    }

    #[tokio::test]
    async fn test_remote_snapshot_replaced() {
        let store = SqliteStore::open_memory().unwrap();
        let a = BTreeSet::from(["a".to_string(), "b".to_string()]);
        let b = BTreeSet::from(["c".to_string()]);

        store.replace_remote_feed_url_snapshot(&a).await.unwrap();
        store.replace_remote_feed_url_snapshot(&b).await.unwrap();
        assert_eq!(store.get_remote_feed_urls().await.unwrap(), b);
    }

    #[tokio::test]
    async fn test_replace_with_default_clears_caches() {
        let store = SqliteStore::open_memory().unwrap();
        store.update_sync_chain_config(&joined_chain()).await.unwrap();
        store
            .replace_device_list(&[DeviceRecord {
                device_id: DeviceId(2),
                device_name: "laptop".into(),
            }])
            .await
            .unwrap();
        store
            .replace_remote_feed_url_snapshot(&BTreeSet::from(["u".to_string()]))
            .await
            .unwrap();
        store.apply_remote_read_mark("u", "g").await.unwrap();

        let default = SyncChainConfig::unconfigured("https://relay.example", "laptop", "bmV3");
        store.replace_with_default_sync_chain(&default).await.unwrap();

        assert_eq!(store.get_sync_chain_config().await.unwrap(), Some(default));
        assert!(store.get_devices().await.unwrap().is_empty());
        assert!(store.get_remote_feed_urls().await.unwrap().is_empty());
        assert_eq!(store.prune_pending_read_marks(i64::MAX).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedsync.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.update_sync_chain_config(&joined_chain()).await.unwrap();
            store.save_feed(&Feed::new("u").modified_at(9)).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get_sync_chain_config().await.unwrap(),
            Some(joined_chain())
        );
        assert_eq!(
            store.get_feed_by_url("u").await.unwrap().map(|f| f.when_modified),
            Some(9)
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn high_water_mark_is_running_max(stamps in prop::collection::vec(0i64..1_000_000, 1..20)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let store = SqliteStore::open_memory().unwrap();
                store.update_sync_chain_config(&joined_chain()).await.unwrap();

                for &ts in &stamps {
                    store.update_latest_message_timestamp(ts).await.unwrap();
                }

                let chain = store.get_sync_chain_config().await.unwrap().unwrap();
                prop_assert_eq!(chain.latest_message_timestamp, stamps.iter().copied().max().unwrap());
                Ok(())
            })?;
        }
    }
}
