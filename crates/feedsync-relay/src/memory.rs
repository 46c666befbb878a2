//! A simple in-memory relay for testing.
//!
//! Honours the same contract as the HTTP relay: device membership checks,
//! the If-Match precondition on feed updates and inclusive `since` for read
//! marks. Every call is recorded, and failures can be injected per
//! operation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use feedsync_core::{now_millis, ContentHash, DeviceId};

use crate::error::{RelayError, Result};
use crate::messages::{
    ChainIdentity, DeviceListResponse, EncryptedDevice, EncryptedReadMark, FeedsResponse,
    JoinResponse, ReadMarksResponse, SendReadMarksRequest, UpdateFeedsRequest,
    UpdateFeedsResponse,
};
use crate::relay::{Relay, RelayFactory};

/// Relay operations, for call inspection and fault targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayOp {
    Create,
    Join,
    GetDevices,
    RemoveDevice,
    GetFeeds,
    UpdateFeeds,
    GetReadMarks,
    SendReadMarks,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCall {
    Create,
    Join { sync_code: String },
    GetDevices,
    RemoveDevice { target: DeviceId },
    GetFeeds,
    UpdateFeeds { if_match: ContentHash, content_hash: ContentHash },
    GetReadMarks { since: i64 },
    SendReadMarks { count: usize },
}

impl RelayCall {
    pub fn op(&self) -> RelayOp {
        match self {
            Self::Create => RelayOp::Create,
            Self::Join { .. } => RelayOp::Join,
            Self::GetDevices => RelayOp::GetDevices,
            Self::RemoveDevice { .. } => RelayOp::RemoveDevice,
            Self::GetFeeds => RelayOp::GetFeeds,
            Self::UpdateFeeds { .. } => RelayOp::UpdateFeeds,
            Self::GetReadMarks { .. } => RelayOp::GetReadMarks,
            Self::SendReadMarks { .. } => RelayOp::SendReadMarks,
        }
    }
}

#[derive(Debug, Default)]
struct ChainState {
    devices: BTreeMap<DeviceId, String>,
    feeds: FeedsResponse,
    read_marks: Vec<EncryptedReadMark>,
}

#[derive(Debug, Default)]
struct RelayState {
    chains: HashMap<String, ChainState>,
    last_device_id: i64,
    last_chain_seq: u64,
    last_timestamp: i64,
    calls: Vec<RelayCall>,
    faults: HashMap<RelayOp, usize>,
    forced_conflicts: usize,
}

impl RelayState {
    /// Record the call and consume an injected fault, if any.
    fn enter(&mut self, call: RelayCall) -> Result<()> {
        let op = call.op();
        self.calls.push(call);

        if let Some(remaining) = self.faults.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RelayError::Network(format!("injected failure for {:?}", op)));
            }
        }
        Ok(())
    }

    fn chain(&mut self, identity: &ChainIdentity) -> Result<&mut ChainState> {
        let chain = self
            .chains
            .get_mut(&identity.sync_chain_id)
            .ok_or_else(|| not_found("sync chain not found"))?;
        if !chain.devices.contains_key(&identity.device_id) {
            return Err(RelayError::UnexpectedStatus {
                status: 403,
                body: "device is not part of this sync chain".into(),
            });
        }
        Ok(chain)
    }

    fn next_device_id(&mut self) -> DeviceId {
        self.last_device_id += 1;
        DeviceId(self.last_device_id)
    }

    /// Strictly increasing timestamps, tracking wall-clock time.
    fn next_timestamp(&mut self) -> i64 {
        self.last_timestamp = now_millis().max(self.last_timestamp + 1);
        self.last_timestamp
    }
}

fn not_found(body: &str) -> RelayError {
    RelayError::UnexpectedStatus {
        status: 404,
        body: body.to_string(),
    }
}

fn device_list(chain: &ChainState) -> DeviceListResponse {
    DeviceListResponse {
        devices: chain
            .devices
            .iter()
            .map(|(id, name)| EncryptedDevice {
                device_id: *id,
                device_name: name.clone(),
            })
            .collect(),
    }
}

/// In-memory relay. Clones share state, so several devices can talk to the
/// same relay.
#[derive(Debug, Clone, Default)]
pub struct MemoryRelay {
    state: Arc<Mutex<RelayState>>,
    connected_urls: Arc<std::sync::Mutex<Vec<String>>>,
}

impl MemoryRelay {
    /// Create a new empty relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made so far, in order.
    pub async fn calls(&self) -> Vec<RelayCall> {
        self.state.lock().await.calls.clone()
    }

    /// Calls of a single operation.
    pub async fn calls_of(&self, op: RelayOp) -> Vec<RelayCall> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| call.op() == op)
            .cloned()
            .collect()
    }

    /// Forget recorded calls.
    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Base URLs handed to [`RelayFactory::connect`].
    pub fn connected_urls(&self) -> Vec<String> {
        self.connected_urls
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }

    /// Fail the next `count` calls of `op` with a network error.
    pub async fn fail_next(&self, op: RelayOp, count: usize) {
        *self.state.lock().await.faults.entry(op).or_default() = count;
    }

    /// Answer the next `count` feed updates with a precondition failure,
    /// whatever their If-Match says.
    pub async fn force_conflicts(&self, count: usize) {
        self.state.lock().await.forced_conflicts = count;
    }

    /// Current feed snapshot of a chain.
    pub async fn feeds_of(&self, sync_chain_id: &str) -> Option<FeedsResponse> {
        self.state
            .lock()
            .await
            .chains
            .get(sync_chain_id)
            .map(|chain| chain.feeds.clone())
    }

    /// Overwrite a chain's feed snapshot, as another device would.
    pub async fn set_feeds(&self, sync_chain_id: &str, feeds: FeedsResponse) {
        if let Some(chain) = self.state.lock().await.chains.get_mut(sync_chain_id) {
            chain.feeds = feeds;
        }
    }

    /// Store a read mark with an explicit timestamp.
    pub async fn push_read_mark(&self, sync_chain_id: &str, mark: EncryptedReadMark) {
        let mut state = self.state.lock().await;
        state.last_timestamp = state.last_timestamp.max(mark.timestamp);
        if let Some(chain) = state.chains.get_mut(sync_chain_id) {
            chain.read_marks.push(mark);
            chain.read_marks.sort_by_key(|m| m.timestamp);
        }
    }

    /// Number of read marks stored for a chain.
    pub async fn read_mark_count(&self, sync_chain_id: &str) -> usize {
        self.state
            .lock()
            .await
            .chains
            .get(sync_chain_id)
            .map_or(0, |chain| chain.read_marks.len())
    }
}

impl RelayFactory for MemoryRelay {
    type Relay = MemoryRelay;

    fn connect(&self, relay_url: &str) -> Result<MemoryRelay> {
        if let Ok(mut urls) = self.connected_urls.lock() {
            urls.push(relay_url.to_string());
        }
        Ok(self.clone())
    }
}

#[async_trait]
impl Relay for MemoryRelay {
    async fn create(&self, encrypted_device_name: &str) -> Result<JoinResponse> {
        let mut state = self.state.lock().await;
        state.enter(RelayCall::Create)?;

        state.last_chain_seq += 1;
        let sync_code = format!("chain-{:04}", state.last_chain_seq);
        let device_id = state.next_device_id();

        let mut chain = ChainState::default();
        chain.devices.insert(device_id, encrypted_device_name.to_string());
        state.chains.insert(sync_code.clone(), chain);

        Ok(JoinResponse {
            sync_code,
            device_id,
        })
    }

    async fn join(&self, sync_code: &str, encrypted_device_name: &str) -> Result<JoinResponse> {
        let mut state = self.state.lock().await;
        state.enter(RelayCall::Join {
            sync_code: sync_code.to_string(),
        })?;

        if !state.chains.contains_key(sync_code) {
            return Err(not_found("sync chain not found"));
        }
        let device_id = state.next_device_id();
        if let Some(chain) = state.chains.get_mut(sync_code) {
            chain.devices.insert(device_id, encrypted_device_name.to_string());
        }

        Ok(JoinResponse {
            sync_code: sync_code.to_string(),
            device_id,
        })
    }

    async fn get_devices(&self, identity: &ChainIdentity) -> Result<DeviceListResponse> {
        let mut state = self.state.lock().await;
        state.enter(RelayCall::GetDevices)?;
        Ok(device_list(state.chain(identity)?))
    }

    async fn remove_device(
        &self,
        identity: &ChainIdentity,
        target: DeviceId,
    ) -> Result<DeviceListResponse> {
        let mut state = self.state.lock().await;
        state.enter(RelayCall::RemoveDevice { target })?;

        let chain = state.chain(identity)?;
        chain.devices.remove(&target);
        Ok(device_list(chain))
    }

    async fn get_feeds(&self, identity: &ChainIdentity) -> Result<FeedsResponse> {
        let mut state = self.state.lock().await;
        state.enter(RelayCall::GetFeeds)?;
        Ok(state.chain(identity)?.feeds.clone())
    }

    async fn update_feeds(
        &self,
        identity: &ChainIdentity,
        if_match: ContentHash,
        request: &UpdateFeedsRequest,
    ) -> Result<UpdateFeedsResponse> {
        let mut state = self.state.lock().await;
        state.enter(RelayCall::UpdateFeeds {
            if_match,
            content_hash: request.content_hash,
        })?;

        if state.forced_conflicts > 0 {
            state.forced_conflicts -= 1;
            return Err(RelayError::PreconditionFailed);
        }

        let chain = state.chain(identity)?;
        if chain.feeds.hash != if_match {
            return Err(RelayError::PreconditionFailed);
        }

        chain.feeds = FeedsResponse {
            hash: request.content_hash,
            encrypted: request.encrypted.clone(),
        };
        Ok(UpdateFeedsResponse {
            hash: request.content_hash,
        })
    }

    async fn get_read_marks(
        &self,
        identity: &ChainIdentity,
        since: i64,
    ) -> Result<ReadMarksResponse> {
        let mut state = self.state.lock().await;
        state.enter(RelayCall::GetReadMarks { since })?;

        let chain = state.chain(identity)?;
        Ok(ReadMarksResponse {
            read_marks: chain
                .read_marks
                .iter()
                .filter(|mark| mark.timestamp >= since)
                .cloned()
                .collect(),
        })
    }

    async fn send_read_marks(
        &self,
        identity: &ChainIdentity,
        request: &SendReadMarksRequest,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.enter(RelayCall::SendReadMarks {
            count: request.items.len(),
        })?;

        state.chain(identity)?;
        let stamped: Vec<EncryptedReadMark> = request
            .items
            .iter()
            .map(|item| EncryptedReadMark {
                encrypted: item.encrypted.clone(),
                timestamp: state.next_timestamp(),
            })
            .collect();
        state.chain(identity)?.read_marks.extend(stamped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::SendEncryptedReadMark;

    async fn created(relay: &MemoryRelay) -> ChainIdentity {
        let response = relay.create("enc-name").await.unwrap();
        ChainIdentity::new(response.sync_code, response.device_id)
    }

    #[tokio::test]
    async fn test_create_and_join() {
        let relay = MemoryRelay::new();
        let first = created(&relay).await;

        let second = relay.join(&first.sync_chain_id, "enc-other").await.unwrap();
        assert_eq!(second.sync_code, first.sync_chain_id);
        assert_ne!(second.device_id, first.device_id);

        let devices = relay.get_devices(&first).await.unwrap();
        assert_eq!(devices.devices.len(), 2);
    }

    #[tokio::test]
    async fn test_join_unknown_chain() {
        let relay = MemoryRelay::new();
        let err = relay.join("nope", "enc").await.unwrap_err();
        assert!(matches!(err, RelayError::UnexpectedStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_removed_device_is_locked_out() {
        let relay = MemoryRelay::new();
        let identity = created(&relay).await;

        let remaining = relay.remove_device(&identity, identity.device_id).await.unwrap();
        assert!(remaining.devices.is_empty());
        assert!(relay.get_feeds(&identity).await.is_err());
    }

    #[tokio::test]
    async fn test_update_feeds_precondition() {
        let relay = MemoryRelay::new();
        let identity = created(&relay).await;
        let request = UpdateFeedsRequest {
            content_hash: ContentHash(10),
            encrypted: "blob".into(),
        };

        let response = relay
            .update_feeds(&identity, ContentHash::NONE, &request)
            .await
            .unwrap();
        assert_eq!(response.hash, ContentHash(10));

        // Stale If-Match
        let err = relay
            .update_feeds(&identity, ContentHash::NONE, &request)
            .await
            .unwrap_err();
        assert!(err.is_precondition_failed());
    }

    #[tokio::test]
    async fn test_read_marks_since_is_inclusive() {
        let relay = MemoryRelay::new();
        let identity = created(&relay).await;
        for timestamp in [100, 200, 300] {
            relay
                .push_read_mark(
                    &identity.sync_chain_id,
                    EncryptedReadMark {
                        encrypted: format!("m{}", timestamp),
                        timestamp,
                    },
                )
                .await;
        }

        let marks = relay.get_read_marks(&identity, 200).await.unwrap();
        let stamps: Vec<i64> = marks.read_marks.iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![200, 300]);
    }

    #[tokio::test]
    async fn test_sent_read_marks_get_increasing_timestamps() {
        let relay = MemoryRelay::new();
        let identity = created(&relay).await;
        let request = SendReadMarksRequest {
            items: vec![
                SendEncryptedReadMark { encrypted: "a".into() },
                SendEncryptedReadMark { encrypted: "b".into() },
            ],
        };
        relay.send_read_marks(&identity, &request).await.unwrap();

        let marks = relay.get_read_marks(&identity, 0).await.unwrap().read_marks;
        assert_eq!(marks.len(), 2);
        assert!(marks[0].timestamp < marks[1].timestamp);
    }

    #[tokio::test]
    async fn test_fault_injection_is_per_op_and_counted() {
        let relay = MemoryRelay::new();
        let identity = created(&relay).await;
        relay.fail_next(RelayOp::GetFeeds, 1).await;

        assert!(matches!(
            relay.get_devices(&identity).await,
            Ok(_)
        ));
        assert!(matches!(
            relay.get_feeds(&identity).await,
            Err(RelayError::Network(_))
        ));
        assert!(relay.get_feeds(&identity).await.is_ok());
        assert_eq!(relay.calls_of(RelayOp::GetFeeds).await.len(), 2);
    }
}
