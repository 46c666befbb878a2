//! The sync chain record and the devices participating in it.

use serde::{Deserialize, Serialize};

use crate::time::EPOCH_MILLIS;
use crate::types::{ContentHash, DeviceId};

/// Everything this device knows about the sync chain it belongs to.
///
/// There is exactly one such record per local store. An unconfigured record
/// has an empty chain id and an unassigned device id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncChainConfig {
    /// Relay base URL.
    pub relay_url: String,
    /// Chain id (also the human-shareable sync code). Empty when unconfigured.
    pub sync_chain_id: String,
    /// This device's id within the chain.
    pub device_id: DeviceId,
    /// This device's name, plaintext locally.
    pub device_name: String,
    /// Shared secret key in its transportable string form. Empty when none.
    pub secret_key: String,
    /// High-water mark for read-mark pulls (Unix ms).
    pub latest_message_timestamp: i64,
    /// Hash of the last feed snapshot agreed with the relay.
    pub last_feeds_remote_hash: ContentHash,
}

impl SyncChainConfig {
    /// An unconfigured record pointing at `relay_url`.
    pub fn unconfigured(
        relay_url: impl Into<String>,
        device_name: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            relay_url: relay_url.into(),
            sync_chain_id: String::new(),
            device_id: DeviceId::UNASSIGNED,
            device_name: device_name.into(),
            secret_key: secret_key.into(),
            latest_message_timestamp: EPOCH_MILLIS,
            last_feeds_remote_hash: ContentHash::NONE,
        }
    }

    /// Whether this record describes a joined chain with key material.
    pub fn has_sync_chain(&self) -> bool {
        !self.sync_chain_id.is_empty() && self.device_id.is_assigned() && !self.secret_key.is_empty()
    }

    /// Whether the relay URL points at one of the given retired hosts.
    pub fn uses_deprecated_host<S: AsRef<str>>(&self, deprecated_hosts: &[S]) -> bool {
        deprecated_hosts
            .iter()
            .any(|host| !host.as_ref().is_empty() && self.relay_url.contains(host.as_ref()))
    }

    /// Record a freshly created or joined chain.
    ///
    /// Resets the read-mark high-water mark to the epoch and forgets the
    /// previous chain's feed hash, so the new chain is fetched from the start.
    pub fn joined(mut self, sync_chain_id: impl Into<String>, device_id: DeviceId) -> Self {
        self.sync_chain_id = sync_chain_id.into();
        self.device_id = device_id;
        self.latest_message_timestamp = EPOCH_MILLIS;
        self.last_feeds_remote_hash = ContentHash::NONE;
        self
    }
}

impl Default for SyncChainConfig {
    fn default() -> Self {
        Self::unconfigured("", "", "")
    }
}

/// A device participating in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: DeviceId,
    /// Decrypted device name.
    pub device_name: String,
}
