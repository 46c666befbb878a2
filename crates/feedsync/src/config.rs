//! Engine settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use feedsync_core::SyncChainConfig;
use feedsync_crypto::{encode_key, SecretKey};
use feedsync_relay::{limits, HttpRelayConfig, HttpRelayFactory};

/// Configuration for the sync engine.
///
/// Deserializable from any serde format; missing fields take their
/// defaults. Timeouts are given in whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Relay used for new chains and for chains on a retired host.
    pub default_relay_url: String,
    /// Retired relay hosts. A stored chain pointing at one is moved to
    /// `default_relay_url` on initialization.
    pub deprecated_hosts: Vec<String>,
    /// Device name used when none has been stored.
    pub default_device_name: String,
    /// Read marks per `send_read_marks` call, capped at the relay limit.
    pub read_mark_batch_size: usize,
    /// Pending remote read marks older than this are dropped by `sync_all`.
    #[serde(with = "secs")]
    pub pending_read_mark_ttl: Duration,
    #[serde(with = "secs")]
    pub connect_timeout: Duration,
    #[serde(with = "secs")]
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let http = HttpRelayConfig::default();
        Self {
            default_relay_url: "https://relay.feedsync.dev".to_string(),
            deprecated_hosts: Vec::new(),
            default_device_name: "FeedSync device".to_string(),
            read_mark_batch_size: limits::MAX_READ_MARKS_PER_REQUEST,
            pending_read_mark_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            connect_timeout: http.connect_timeout,
            request_timeout: http.request_timeout,
            user_agent: http.user_agent,
        }
    }
}

impl SyncSettings {
    /// Effective read-mark batch size: at least 1, at most the relay limit.
    pub fn batch_size(&self) -> usize {
        self.read_mark_batch_size
            .clamp(1, limits::MAX_READ_MARKS_PER_REQUEST)
    }

    /// HTTP client settings for the relay.
    pub fn http_config(&self) -> HttpRelayConfig {
        HttpRelayConfig {
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            user_agent: self.user_agent.clone(),
        }
    }

    /// Build the production relay factory.
    pub fn relay_factory(&self) -> feedsync_relay::Result<HttpRelayFactory> {
        HttpRelayFactory::new(&self.http_config())
    }

    /// An unconfigured chain record on the default relay, with a freshly
    /// generated key.
    pub fn default_chain(&self, device_name: &str) -> SyncChainConfig {
        let device_name = if device_name.is_empty() {
            self.default_device_name.as_str()
        } else {
            device_name
        };
        SyncChainConfig::unconfigured(
            self.default_relay_url.clone(),
            device_name,
            encode_key(&SecretKey::generate()),
        )
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
