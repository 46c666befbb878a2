//! # FeedSync Core
//!
//! Pure data model for the FeedSync engine: feeds, read marks, devices and
//! the sync chain record, plus the deterministic content hash used as an
//! optimistic-concurrency token.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Feed`] - A locally stored feed subscription
//! - [`FeedEntry`] - The synced projection of a feed (what gets hashed and encrypted)
//! - [`SyncChainConfig`] - Chain identity plus sync bookkeeping
//! - [`ContentHash`] - Numeric content hash of a feed list
//! - [`ReadMark`] / [`ReadMarkEvent`] - One read action, without and with its relay timestamp
//!
//! ## Hashing
//!
//! Feed lists are hashed over canonical CBOR in URL order. See [`canonical`].

pub mod canonical;
pub mod chain;
pub mod error;
pub mod feed;
pub mod read_mark;
pub mod time;
pub mod types;

pub use canonical::{canonical_feed_bytes, feed_list_hash};
pub use chain::{DeviceRecord, SyncChainConfig};
pub use error::{CoreError, Result};
pub use feed::{Feed, FeedEntry, FeedItem, ReadItem};
pub use read_mark::{ReadMark, ReadMarkEvent};
pub use time::{now_millis, EPOCH_MILLIS};
pub use types::{ContentHash, DeviceId};
