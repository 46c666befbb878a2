//! Feed list hash vectors.
//!
//! Every device must agree on the hash of a feed list, or pushes would
//! conflict forever. These named lists pin down the cases that matter:
//! ordering, optional fields and near-identical entries. Each vector pins
//! its expected hash; no encoding change may move one.

use feedsync_core::{feed_list_hash, ContentHash, Feed, FeedEntry};

/// A named feed list.
#[derive(Debug, Clone)]
pub struct HashVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// The entries, in the order a device might hold them.
    pub feeds: Vec<FeedEntry>,
    /// The hash every device must compute for `feeds`.
    pub expected: i64,
}

fn entry(url: &str, title: &str, when_modified: i64) -> FeedEntry {
    FeedEntry::from(&Feed::new(url).with_title(title).modified_at(when_modified))
}

/// Get all hash vectors.
pub fn all_vectors() -> Vec<HashVector> {
    let mut with_image = entry("https://a.example/rss", "A", 1_736_870_400_000);
    with_image.image_url = Some("https://a.example/icon.png".into());

    let mut tagged = entry("https://a.example/rss", "A", 1_736_870_400_000);
    tagged.tag = "news".into();

    vec![
        HashVector {
            name: "empty list",
            feeds: vec![],
            expected: -4_509_198_469_533_053_486,
        },
        HashVector {
            name: "single feed",
            feeds: vec![entry("https://a.example/rss", "A", 1_736_870_400_000)],
            expected: 317_650_557_871_152_840,
        },
        HashVector {
            name: "single feed with image",
            feeds: vec![with_image],
            expected: 2_277_916_501_935_177_895,
        },
        HashVector {
            name: "single feed with tag",
            feeds: vec![tagged],
            expected: -6_770_061_540_986_465_493,
        },
        HashVector {
            name: "two feeds",
            feeds: vec![
                entry("https://a.example/rss", "A", 1_736_870_400_000),
                entry("https://b.example/atom", "B", 1_736_870_401_000),
            ],
            expected: -1_817_779_202_586_948_378,
        },
        HashVector {
            name: "two feeds, later clock",
            feeds: vec![
                entry("https://a.example/rss", "A", 1_736_870_400_000),
                entry("https://b.example/atom", "B", 1_736_870_401_001),
            ],
            expected: 9_105_687_447_480_549_711,
        },
    ]
}

/// Hash every vector.
pub fn hash_all_vectors() -> Vec<(&'static str, ContentHash)> {
    all_vectors()
        .into_iter()
        .map(|v| {
            let hash = feed_list_hash(&v.feeds).expect("feed lists always encode");
            (v.name, hash)
        })
        .collect()
}
