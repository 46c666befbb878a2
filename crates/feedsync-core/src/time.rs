//! Wall-clock helpers. All timestamps are Unix milliseconds.

use std::time::{SystemTime, UNIX_EPOCH};

/// The epoch, used to reset the read-mark high-water mark.
pub const EPOCH_MILLIS: i64 = 0;

/// Get current time in milliseconds.
///
/// Clamps to the epoch if the system clock reads earlier than 1970.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(EPOCH_MILLIS)
}
