//! Test fixtures and helpers.
//!
//! Devices sharing one [`MemoryRelay`], each with its own [`MemoryStore`].

use std::sync::Arc;

use feedsync::{SyncClient, SyncSettings};
use feedsync_core::{Feed, FeedItem, SyncChainConfig};
use feedsync_relay::MemoryRelay;
use feedsync_store::{MemoryStore, Store};

/// Relay URL used by every fixture.
pub const TEST_RELAY_URL: &str = "https://relay.test";

/// A sync client over in-memory collaborators.
pub type TestClient = SyncClient<MemoryStore, MemoryRelay>;

/// Settings for a test device.
pub fn test_settings(device_name: &str) -> SyncSettings {
    SyncSettings {
        default_relay_url: TEST_RELAY_URL.to_string(),
        default_device_name: device_name.to_string(),
        ..SyncSettings::default()
    }
}

/// One device: a client with its own store, talking to a shared relay.
pub struct TestDevice {
    pub name: String,
    pub client: Arc<TestClient>,
}

impl TestDevice {
    /// A fresh, unconfigured device.
    pub fn new(relay: &MemoryRelay, name: &str) -> Self {
        Self::with_settings(relay, test_settings(name))
    }

    /// A fresh device with custom settings.
    pub fn with_settings(relay: &MemoryRelay, settings: SyncSettings) -> Self {
        Self {
            name: settings.default_device_name.clone(),
            client: Arc::new(SyncClient::new(
                Arc::new(MemoryStore::new()),
                relay.clone(),
                settings,
            )),
        }
    }

    /// The device's store.
    pub fn store(&self) -> &MemoryStore {
        self.client.store()
    }

    /// The stored chain record.
    pub async fn chain(&self) -> SyncChainConfig {
        self.store()
            .get_sync_chain_config()
            .await
            .expect("store failed")
            .expect("no chain record")
    }

    /// The stored secret key, as shared with joining devices.
    pub async fn secret_key(&self) -> String {
        self.chain().await.secret_key
    }

    /// Save a feed with a title and modification clock.
    pub async fn subscribe(&self, url: &str, title: &str, when_modified: i64) -> Feed {
        let feed = Feed::new(url).with_title(title).modified_at(when_modified);
        self.store().save_feed(&feed).await.expect("save feed");
        feed
    }

    /// Delete a feed locally.
    pub async fn unsubscribe(&self, url: &str) {
        self.store().delete_feed_by_url(url).await.expect("delete feed");
    }

    pub async fn feed(&self, url: &str) -> Option<Feed> {
        self.store().get_feed_by_url(url).await.expect("get feed")
    }

    /// URLs of all local feeds, in order.
    pub async fn feed_urls(&self) -> Vec<String> {
        self.store()
            .get_all_feeds_ordered_by_url()
            .await
            .expect("list feeds")
            .into_iter()
            .map(|feed| feed.url)
            .collect()
    }

    /// Add an article to an existing feed.
    pub fn add_article(&self, feed_url: &str, guid: &str) -> FeedItem {
        self.store().add_item(feed_url, guid).expect("add item")
    }

    /// Add articles to an existing feed and mark them read.
    pub fn read_articles<I, G>(&self, feed_url: &str, guids: I)
    where
        I: IntoIterator<Item = G>,
        G: AsRef<str>,
    {
        for guid in guids {
            let item = self.add_article(feed_url, guid.as_ref());
            self.store().mark_item_read(item.id).expect("mark read");
        }
    }

    /// Whether an article exists locally and is read.
    pub fn is_read(&self, feed_url: &str, guid: &str) -> bool {
        self.store()
            .get_item(feed_url, guid)
            .expect("get item")
            .map_or(false, |item| item.read)
    }
}

/// Devices joined to one chain.
pub struct TestChain {
    pub relay: MemoryRelay,
    pub sync_code: String,
    pub devices: Vec<TestDevice>,
}

impl TestChain {
    /// Create a chain on the first device and join the rest to it.
    pub async fn new(count: usize) -> Self {
        let relay = MemoryRelay::new();
        let mut devices = Vec::with_capacity(count);

        let first = TestDevice::new(&relay, "device-0");
        let sync_code = first.client.create().await.expect("create chain");
        let key = first.secret_key().await;
        devices.push(first);

        for i in 1..count {
            let device = TestDevice::new(&relay, &format!("device-{}", i));
            device.client.join(&sync_code, &key).await.expect("join chain");
            devices.push(device);
        }

        Self {
            relay,
            sync_code,
            devices,
        }
    }

    pub fn device(&self, index: usize) -> &TestDevice {
        &self.devices[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chain_devices_share_key() {
        let chain = TestChain::new(3).await;
        let key = chain.device(0).secret_key().await;

        for device in &chain.devices {
            let config = device.chain().await;
            assert!(config.has_sync_chain());
            assert_eq!(config.sync_chain_id, chain.sync_code);
            assert_eq!(config.secret_key, key);
            assert_eq!(config.device_name, device.name);
        }
    }

    #[tokio::test]
    async fn test_device_helpers() {
        let relay = MemoryRelay::new();
        let device = TestDevice::new(&relay, "phone");

        device.subscribe("https://a.example/rss", "A", 1).await;
        device.read_articles("https://a.example/rss", ["g1", "g2"]);
        device.add_article("https://a.example/rss", "g3");

        assert_eq!(device.feed_urls().await, vec!["https://a.example/rss"]);
        assert!(device.is_read("https://a.example/rss", "g1"));
        assert!(!device.is_read("https://a.example/rss", "g3"));
        assert!(!device.is_read("https://a.example/rss", "missing"));
    }
}
