//! # FeedSync Store
//!
//! Local state consumed by the sync engine: the sync chain record, feeds and
//! their items, the cached device list, the remote feed snapshot and pending
//! remote read marks.
//!
//! ## Overview
//!
//! The engine only ever talks to the [`Store`] trait, a narrow repository
//! interface. [`SqliteStore`] is the persistent backend; [`MemoryStore`] has
//! the same semantics and is used by tests.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`StoreExt`] - Convenience methods built on [`Store`]
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use feedsync_core::Feed;
//! use feedsync_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("feeds.db").unwrap();
//!     store.save_feed(&Feed::new("https://example.com/rss")).await.unwrap();
//!     let feeds = store.get_all_feeds_ordered_by_url().await.unwrap();
//!     assert_eq!(feeds.len(), 1);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Single chain record**: one row, replaced wholesale on create/join/leave
//! - **Monotonic high-water mark**: `update_latest_message_timestamp` never decreases
//! - **Pending read marks**: remote marks for items not yet present are kept
//!   and applied once the item arrives

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Store, StoreExt};
