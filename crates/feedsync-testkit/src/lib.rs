//! # FeedSync Testkit
//!
//! Testing utilities for FeedSync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: devices over in-memory stores sharing one in-memory relay
//! - **Generators**: Proptest strategies for feeds, feed lists and read marks
//! - **Hash vectors**: named feed lists whose hashes every device must agree on
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use feedsync_testkit::TestChain;
//!
//! let chain = TestChain::new(2).await;
//! chain.device(0).subscribe("https://a.example/rss", "A", 1).await;
//! chain.device(0).client.send_updated_feeds().await;
//! chain.device(1).client.get_feeds().await;
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use feedsync_testkit::generators::feed_list;
//!
//! proptest! {
//!     #[test]
//!     fn hash_is_deterministic(list in feed_list(10)) {
//!         prop_assert_eq!(feed_list_hash(&list)?, feed_list_hash(&list)?);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{test_settings, TestChain, TestClient, TestDevice, TEST_RELAY_URL};
pub use generators::{feed_from_params, FeedParams};
pub use vectors::{all_vectors, hash_all_vectors, HashVector};
