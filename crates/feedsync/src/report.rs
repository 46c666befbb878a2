//! Outcome of a full sync cycle.

use std::fmt;

/// Steps of [`crate::SyncClient::sync_all`], in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    Initialize,
    Devices,
    PullFeeds,
    PushFeeds,
    PullReadMarks,
    ApplyPendingReadMarks,
    PushReadMarks,
    PrunePendingReadMarks,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialize => "initialize",
            Self::Devices => "devices",
            Self::PullFeeds => "pull feeds",
            Self::PushFeeds => "push feeds",
            Self::PullReadMarks => "pull read marks",
            Self::ApplyPendingReadMarks => "apply pending read marks",
            Self::PushReadMarks => "push read marks",
            Self::PrunePendingReadMarks => "prune pending read marks",
        };
        f.write_str(name)
    }
}

/// What a feed pull changed locally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPullStats {
    pub deleted: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Remote feeds not re-added because they were deleted locally.
    pub skipped_locally_deleted: usize,
    /// Remote feeds ignored because the local copy is as new or newer.
    pub kept_local: usize,
}

/// What a read-mark pull did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadPullStats {
    pub applied: usize,
    /// Marks whose item is not present locally yet.
    pub pending: usize,
    pub undecryptable: usize,
}

/// Report of a sync cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Whether a sync chain was configured. When false nothing else ran.
    pub configured: bool,
    /// Devices in the chain after refresh.
    pub device_count: usize,
    /// `None` when the remote snapshot was unchanged.
    pub feeds_pulled: Option<FeedPullStats>,
    /// Whether a new feed snapshot was pushed.
    pub feeds_pushed: bool,
    pub read_marks_received: ReadPullStats,
    pub pending_read_marks_applied: usize,
    pub read_marks_sent: usize,
    pub pending_read_marks_pruned: usize,
    /// Failed steps. Later steps still run after a failure.
    pub errors: Vec<(SyncStep, String)>,
}

impl SyncReport {
    /// Whether every step succeeded.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn record_error(&mut self, step: SyncStep, error: impl fmt::Display) {
        self.errors.push((step, error.to_string()));
    }

    /// Whether a given step failed.
    pub fn failed(&self, step: SyncStep) -> bool {
        self.errors.iter().any(|(s, _)| *s == step)
    }
}

/// Result of a feed push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPushOutcome {
    /// The local list hashes to the last agreed hash; nothing was sent.
    Unchanged,
    /// The relay accepted the list under this hash.
    Pushed(feedsync_core::ContentHash),
}
