//! Feed list reconciliation.
//!
//! Decides what a pulled remote snapshot does to the local feed set. The
//! decision is a pure function of three inputs:
//!
//! - the remote entries just decrypted
//! - the local feeds
//! - the URLs seen in the previous pull (`remotely_seen`)
//!
//! `remotely_seen` is what tells "deleted remotely" apart from "never
//! synced", and "deleted locally" apart from "new remotely":
//!
//! | in remote | in local | in remotely_seen | outcome                      |
//! |-----------|----------|------------------|------------------------------|
//! | no        | yes      | yes              | delete locally               |
//! | yes       | no       | no               | insert                       |
//! | yes       | no       | yes              | skip, deleted locally        |
//! | yes       | yes      | -                | last writer wins on modified |

use std::collections::{BTreeMap, BTreeSet};

use feedsync_core::{Feed, FeedEntry};

/// Local changes a pull should make.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPlan {
    /// URLs of local feeds deleted remotely.
    pub deletions: Vec<String>,
    /// Remote feeds new to this device.
    pub inserts: Vec<Feed>,
    /// Local feeds overwritten by a strictly newer remote copy.
    pub updates: Vec<Feed>,
    /// Remote feeds not re-added because they were deleted locally.
    pub skipped_locally_deleted: usize,
    /// Remote feeds whose local copy is as new or newer.
    pub kept_local: usize,
    /// The new remote snapshot: exactly the URLs of this pull.
    pub snapshot: BTreeSet<String>,
}

impl FeedPlan {
    /// Whether applying the plan would touch any local feed.
    pub fn is_noop(&self) -> bool {
        self.deletions.is_empty() && self.inserts.is_empty() && self.updates.is_empty()
    }
}

/// Plan the local changes for a pulled remote feed list.
///
/// Duplicate remote URLs are resolved by first occurrence.
pub fn plan(remote: &[FeedEntry], local: &[Feed], remotely_seen: &BTreeSet<String>) -> FeedPlan {
    let local: BTreeMap<&str, &Feed> = local.iter().map(|f| (f.url.as_str(), f)).collect();
    let mut plan = FeedPlan {
        snapshot: remote.iter().map(|e| e.url.clone()).collect(),
        ..FeedPlan::default()
    };

    plan.deletions = remotely_seen
        .iter()
        .filter(|url| !plan.snapshot.contains(*url) && local.contains_key(url.as_str()))
        .cloned()
        .collect();

    let mut handled = BTreeSet::new();
    for entry in remote {
        if !handled.insert(entry.url.as_str()) {
            continue;
        }

        match local.get(entry.url.as_str()) {
            None if remotely_seen.contains(&entry.url) => plan.skipped_locally_deleted += 1,
            None => plan.inserts.push(entry.to_feed()),
            Some(existing) if entry.when_modified > existing.when_modified => {
                plan.updates.push(entry.apply_to((*existing).clone()));
            }
            Some(_) => plan.kept_local += 1,
        }
    }

    plan
}
