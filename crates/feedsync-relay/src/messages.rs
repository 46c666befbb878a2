//! Wire types for the relay's HTTP/JSON API.
//!
//! All bodies are JSON with camelCase keys. Anything confidential (device
//! names, feed lists, read marks) is carried as an opaque encrypted string;
//! chain id, device id, hashes and timestamps travel in the clear.

use serde::{Deserialize, Serialize};

use feedsync_core::{ContentHash, DeviceId, FeedEntry};

/// Request limits.
pub mod limits {
    /// Maximum read marks accepted in one `send_read_marks` call.
    pub const MAX_READ_MARKS_PER_REQUEST: usize = 100;
}

/// Header names carrying the caller's identity.
pub mod headers {
    /// Sync chain id (also the sync code).
    pub const SYNC_CHAIN_ID: &str = "X-FEEDER-ID";
    /// Calling device's id.
    pub const DEVICE_ID: &str = "X-FEEDER-DEVICE-ID";
}

/// Endpoint paths relative to the relay base URL.
pub mod paths {
    pub const CREATE: &str = "/api/v1/create";
    pub const JOIN: &str = "/api/v1/join";
    pub const DEVICES: &str = "/api/v1/devices";
    pub const FEEDS: &str = "/api/v1/feeds";
    pub const READ_MARKS: &str = "/api/v1/ereadmark";
}

/// Who is calling: sent as headers on every chain-scoped request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainIdentity {
    pub sync_chain_id: String,
    pub device_id: DeviceId,
}

impl ChainIdentity {
    pub fn new(sync_chain_id: impl Into<String>, device_id: DeviceId) -> Self {
        Self {
            sync_chain_id: sync_chain_id.into(),
            device_id,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chain membership
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `create` and `join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Encrypted device name.
    pub device_name: String,
}

/// Response of `create` and `join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub sync_code: String,
    pub device_id: DeviceId,
}

/// A device as the relay stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedDevice {
    pub device_id: DeviceId,
    /// Encrypted device name.
    pub device_name: String,
}

/// Response of `get_devices` and `remove_device`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListResponse {
    #[serde(default)]
    pub devices: Vec<EncryptedDevice>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Feeds
// ─────────────────────────────────────────────────────────────────────────────

/// Response of `get_feeds`.
///
/// A relay that has never received feeds answers with hash 0 and an empty
/// payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedsResponse {
    #[serde(default)]
    pub hash: ContentHash,
    #[serde(default)]
    pub encrypted: String,
}

/// Body of `update_feeds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFeedsRequest {
    pub content_hash: ContentHash,
    pub encrypted: String,
}

/// Response of `update_feeds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFeedsResponse {
    pub hash: ContentHash,
}

/// Plaintext of the encrypted feed snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedListPayload {
    pub feeds: Vec<FeedEntry>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Read marks
// ─────────────────────────────────────────────────────────────────────────────

/// A stored read mark with its relay timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedReadMark {
    pub encrypted: String,
    /// Relay-assigned timestamp (Unix ms).
    pub timestamp: i64,
}

/// Response of `get_read_marks`, ordered by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadMarksResponse {
    #[serde(default)]
    pub read_marks: Vec<EncryptedReadMark>,
}

/// One read mark in a `send_read_marks` batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEncryptedReadMark {
    pub encrypted: String,
}

/// Body of `send_read_marks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReadMarksRequest {
    pub items: Vec<SendEncryptedReadMark>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_response_shape() {
        let json = r#"{"syncCode":"abc","deviceId":17}"#;
        let response: JoinResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.sync_code, "abc");
        assert_eq!(response.device_id, DeviceId(17));
    }

    #[test]
    fn test_empty_feeds_response() {
        let response: FeedsResponse = serde_json::from_str("{}").unwrap();
        assert!(response.hash.is_none());
        assert!(response.encrypted.is_empty());
    }

    #[test]
    fn test_update_request_shape() {
        let request = UpdateFeedsRequest {
            content_hash: ContentHash(-5),
            encrypted: "xyz".into(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"contentHash":-5,"encrypted":"xyz"}"#);
    }

    #[test]
    fn test_read_marks_response_shape() {
        let json = r#"{"readMarks":[{"encrypted":"e","timestamp":12}]}"#;
        let response: ReadMarksResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.read_marks[0].timestamp, 12);
    }
}
