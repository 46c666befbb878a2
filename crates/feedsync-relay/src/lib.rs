//! # FeedSync Relay
//!
//! Typed bindings to the untrusted relay that devices of a sync chain share.
//!
//! ## Overview
//!
//! The relay is a black-box HTTP/JSON service. It stores opaque encrypted
//! blobs per chain and never sees plaintext feed URLs, titles or device
//! names. This crate maps each endpoint to a method of the [`Relay`] trait.
//!
//! - [`HttpRelay`] - the reqwest implementation used in production
//! - [`MemoryRelay`] - an in-process relay with the same contract, for tests
//!
//! ## Endpoints
//!
//! ```text
//! POST   /api/v1/create             {deviceName}          -> {syncCode, deviceId}
//! POST   /api/v1/join               {deviceName}          -> {syncCode, deviceId}
//! GET    /api/v1/devices                                  -> {devices}
//! DELETE /api/v1/devices/{id}                             -> {devices}
//! GET    /api/v1/feeds                                    -> {hash, encrypted}
//! POST   /api/v1/feeds   If-Match   {contentHash, encrypted} -> {hash} | 412
//! GET    /api/v1/ereadmark?since=ms                       -> {readMarks}
//! POST   /api/v1/ereadmark          {items}               -> {}
//! ```
//!
//! Chain-scoped calls carry `X-FEEDER-ID` and `X-FEEDER-DEVICE-ID` headers.

pub mod error;
pub mod http;
pub mod memory;
pub mod messages;
pub mod relay;

pub use error::{RelayError, Result};
pub use http::{HttpRelay, HttpRelayConfig, HttpRelayFactory};
pub use memory::{MemoryRelay, RelayCall, RelayOp};
pub use messages::{
    limits, ChainIdentity, DeviceListResponse, EncryptedDevice, EncryptedReadMark,
    FeedListPayload, FeedsResponse, JoinRequest, JoinResponse, ReadMarksResponse,
    SendEncryptedReadMark, SendReadMarksRequest, UpdateFeedsRequest, UpdateFeedsResponse,
};
pub use relay::{Relay, RelayFactory};
