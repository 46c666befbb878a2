//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use feedsync_core::{Feed, FeedEntry, ReadMark};

/// Generate a feed URL.
pub fn feed_url() -> impl Strategy<Value = String> {
    ("[a-z]{1,8}", "[a-z0-9/]{0,12}")
        .prop_map(|(host, path)| format!("https://{}.example/{}", host, path))
}

/// Generate a modification clock.
pub fn when_modified() -> impl Strategy<Value = i64> {
    0i64..=1_800_000_000_000i64
}

/// Parameters for generating a feed.
#[derive(Debug, Clone)]
pub struct FeedParams {
    pub url: String,
    pub title: String,
    pub custom_title: String,
    pub tag: String,
    pub image_url: Option<String>,
    pub full_text_by_default: bool,
    pub notify: bool,
    pub when_modified: i64,
}

impl Arbitrary for FeedParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            feed_url(),
            "[A-Za-z ]{0,20}",
            "[A-Za-z ]{0,10}",
            "[a-z]{0,6}",
            proptest::option::of(feed_url()),
            any::<bool>(),
            any::<bool>(),
            when_modified(),
        )
            .prop_map(
                |(url, title, custom_title, tag, image_url, full_text_by_default, notify, when_modified)| {
                    FeedParams {
                        url,
                        title,
                        custom_title,
                        tag,
                        image_url,
                        full_text_by_default,
                        notify,
                        when_modified,
                    }
                },
            )
            .boxed()
    }
}

/// Build a feed from parameters.
pub fn feed_from_params(params: &FeedParams) -> Feed {
    let mut feed = Feed::new(params.url.clone())
        .with_title(params.title.clone())
        .with_tag(params.tag.clone())
        .modified_at(params.when_modified);
    feed.custom_title = params.custom_title.clone();
    feed.image_url = params.image_url.clone();
    feed.full_text_by_default = params.full_text_by_default;
    feed.notify = params.notify;
    feed
}

/// Generate a feed.
pub fn feed() -> impl Strategy<Value = Feed> {
    any::<FeedParams>().prop_map(|params| feed_from_params(&params))
}

/// Generate a feed entry.
pub fn feed_entry() -> impl Strategy<Value = FeedEntry> {
    feed().prop_map(|feed| FeedEntry::from(&feed))
}

/// Generate a feed list with unique URLs, ordered by URL.
pub fn feed_list(max_len: usize) -> impl Strategy<Value = Vec<FeedEntry>> {
    prop::collection::vec(feed_entry(), 0..=max_len).prop_map(|entries| {
        entries
            .into_iter()
            .map(|entry| (entry.url.clone(), entry))
            .collect::<BTreeMap<_, _>>()
            .into_values()
            .collect()
    })
}

/// Generate a read mark.
pub fn read_mark() -> impl Strategy<Value = ReadMark> {
    (feed_url(), "[a-z0-9-]{1,24}").prop_map(|(url, guid)| ReadMark::new(url, guid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedsync_core::feed_list_hash;
    use feedsync_crypto::{decrypt_json, encrypt_json, SecretKey};

    proptest! {
        #[test]
        fn test_hash_ignores_input_order(
            (ordered, shuffled) in feed_list(8).prop_flat_map(|l| (Just(l.clone()), Just(l).prop_shuffle()))
        ) {
            prop_assert_eq!(feed_list_hash(&ordered).unwrap(), feed_list_hash(&shuffled).unwrap());
        }

        #[test]
        fn test_hash_tracks_modification(list in feed_list(8), bump in 1i64..1000) {
            prop_assume!(!list.is_empty());
            let mut changed = list.clone();
            changed[0].when_modified += bump;
            prop_assert_ne!(feed_list_hash(&list).unwrap(), feed_list_hash(&changed).unwrap());
        }

        #[test]
        fn test_hash_is_never_none(list in feed_list(8)) {
            prop_assert!(!feed_list_hash(&list).unwrap().is_none());
        }

        #[test]
        fn test_read_mark_survives_envelope(mark in read_mark()) {
            let key = SecretKey::generate();
            let wire = encrypt_json(&mark, &key).unwrap();
            let back: ReadMark = decrypt_json(&wire, &key).unwrap();
            prop_assert_eq!(back, mark);
        }
    }
}
