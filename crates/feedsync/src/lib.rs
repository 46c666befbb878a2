//! # FeedSync
//!
//! Multi-device sync of feed subscriptions and read state through an
//! untrusted relay, end-to-end encrypted.
//!
//! ## Overview
//!
//! Devices that share a secret key form a *sync chain*. Each device keeps
//! its own store and talks to the relay independently:
//!
//! - **Feeds**: the whole feed list is pushed as one encrypted snapshot,
//!   guarded by a content hash used as a weak ETag. Pulled snapshots are
//!   reconciled with last-writer-wins on each feed's modification clock,
//!   with deletions tracked through the previously seen remote URLs.
//! - **Read marks**: each read article becomes an encrypted mark. Marks are
//!   pushed in batches and pulled past a high-water-mark timestamp.
//! - **Devices**: the relay's device list is mirrored locally.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use feedsync::{SyncClient, SyncSettings};
//! use feedsync_store::SqliteStore;
//!
//! let settings = SyncSettings::default();
//! let store = Arc::new(SqliteStore::open("feeds.db")?);
//! let client = Arc::new(SyncClient::new(store, settings.relay_factory()?, settings));
//!
//! let code = client.create().await?;
//! // ... on another device: client.join(&code, &key).await?
//!
//! let report = client.sync_all().await;
//! ```
//!
//! ## Re-exports
//!
//! - `feedsync::core` - Data model and content hashing
//! - `feedsync::crypto` - Key handling and the encryption envelope
//! - `feedsync::relay` - Relay trait, HTTP and in-memory relays
//! - `feedsync::store` - Store trait, SQLite and in-memory stores
//!
//! ## Error policy
//!
//! `create`, `join` and `remove_device` return errors to the caller.
//! `leave` only fails when the store does. The background operations
//! (`get_devices`, `get_feeds`, `send_updated_feeds`, `get_read`,
//! `mark_as_read`) log failures and return nothing; the next cycle retries.

pub mod config;
mod devices;
pub mod error;
mod feeds;
mod read_marks;
pub mod reconcile;
pub mod report;
mod session;

pub use config::SyncSettings;
pub use error::{Result, SyncError};
pub use reconcile::FeedPlan;
pub use report::{FeedPullStats, FeedPushOutcome, ReadPullStats, SyncReport, SyncStep};
pub use session::SyncClient;

// Re-export component crates
pub use feedsync_core as core;
pub use feedsync_crypto as crypto;
pub use feedsync_relay as relay;
pub use feedsync_store as store;

// Re-export commonly used types
pub use feedsync_core::{ContentHash, DeviceId, DeviceRecord, Feed, FeedEntry, SyncChainConfig};
pub use feedsync_relay::{HttpRelayFactory, MemoryRelay, RelayFactory};
pub use feedsync_store::{MemoryStore, SqliteStore, Store};
