//! Relay abstraction.
//!
//! [`Relay`] is one typed binding per relay endpoint. [`RelayFactory`] builds
//! a relay for a base URL, so the sync engine can rebuild its client when
//! the chain record points somewhere new.

use async_trait::async_trait;

use feedsync_core::{ContentHash, DeviceId};

use crate::error::Result;
use crate::messages::{
    ChainIdentity, DeviceListResponse, FeedsResponse, JoinResponse, ReadMarksResponse,
    SendReadMarksRequest, UpdateFeedsRequest, UpdateFeedsResponse,
};

/// Typed bindings to the relay's endpoints.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Relay: Send + Sync {
    /// Create a new chain with this device as its first member.
    async fn create(&self, encrypted_device_name: &str) -> Result<JoinResponse>;

    /// Join an existing chain by its sync code.
    async fn join(&self, sync_code: &str, encrypted_device_name: &str) -> Result<JoinResponse>;

    /// List the chain's devices.
    async fn get_devices(&self, identity: &ChainIdentity) -> Result<DeviceListResponse>;

    /// Remove a device (possibly the caller) and return the remaining list.
    async fn remove_device(
        &self,
        identity: &ChainIdentity,
        target: DeviceId,
    ) -> Result<DeviceListResponse>;

    /// Fetch the current feed snapshot.
    async fn get_feeds(&self, identity: &ChainIdentity) -> Result<FeedsResponse>;

    /// Replace the feed snapshot if the relay still holds `if_match`.
    ///
    /// Fails with [`crate::RelayError::PreconditionFailed`] when it doesn't.
    async fn update_feeds(
        &self,
        identity: &ChainIdentity,
        if_match: ContentHash,
        request: &UpdateFeedsRequest,
    ) -> Result<UpdateFeedsResponse>;

    /// Read marks with timestamp `>= since`, ordered by timestamp.
    async fn get_read_marks(
        &self,
        identity: &ChainIdentity,
        since: i64,
    ) -> Result<ReadMarksResponse>;

    /// Store a batch of read marks.
    async fn send_read_marks(
        &self,
        identity: &ChainIdentity,
        request: &SendReadMarksRequest,
    ) -> Result<()>;
}

/// Builds a [`Relay`] for a base URL.
pub trait RelayFactory: Send + Sync {
    type Relay: Relay + 'static;

    /// Build a relay client for `relay_url`.
    fn connect(&self, relay_url: &str) -> Result<Self::Relay>;
}
