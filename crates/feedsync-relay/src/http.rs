//! HTTP implementation of the relay client, on reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::IF_MATCH;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use feedsync_core::{ContentHash, DeviceId};

use crate::error::{RelayError, Result};
use crate::messages::{
    headers, paths, ChainIdentity, DeviceListResponse, FeedsResponse, JoinRequest, JoinResponse,
    ReadMarksResponse, SendReadMarksRequest, UpdateFeedsRequest, UpdateFeedsResponse,
};
use crate::relay::{Relay, RelayFactory};

/// HTTP client settings shared by every relay a factory builds.
#[derive(Debug, Clone)]
pub struct HttpRelayConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpRelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("feedsync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Builds [`HttpRelay`]s that share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpRelayFactory {
    client: Client,
}

impl HttpRelayFactory {
    pub fn new(config: &HttpRelayConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

impl RelayFactory for HttpRelayFactory {
    type Relay = HttpRelay;

    fn connect(&self, relay_url: &str) -> Result<HttpRelay> {
        HttpRelay::with_client(self.client.clone(), relay_url)
    }
}

/// Relay client for one relay base URL.
#[derive(Debug, Clone)]
pub struct HttpRelay {
    client: Client,
    base_url: String,
}

impl HttpRelay {
    /// Build a relay client that reuses `client`.
    pub fn with_client(client: Client, relay_url: &str) -> Result<Self> {
        let trimmed = relay_url.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|e| RelayError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RelayError::InvalidUrl(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        Ok(Self {
            client,
            base_url: trimmed.to_string(),
        })
    }

    /// The normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder, identity: &ChainIdentity) -> RequestBuilder {
        builder
            .header(headers::SYNC_CHAIN_ID, identity.sync_chain_id.as_str())
            .header(headers::DEVICE_ID, identity.device_id.to_string())
    }

    /// Send a request and return the body of a successful response.
    async fn execute(&self, builder: RequestBuilder) -> Result<Vec<u8>> {
        let response = builder.send().await?;
        let status = response.status();
        trace!(%status, url = %response.url(), "relay response");

        if status == StatusCode::PRECONDITION_FAILED {
            return Err(RelayError::PreconditionFailed);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn execute_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let body = self.execute(builder).await?;
        serde_json::from_slice(&body).map_err(|e| RelayError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Relay for HttpRelay {
    async fn create(&self, encrypted_device_name: &str) -> Result<JoinResponse> {
        debug!(base_url = %self.base_url, "creating sync chain");
        let request = JoinRequest {
            device_name: encrypted_device_name.to_string(),
        };
        self.execute_json(self.client.post(self.url(paths::CREATE)).json(&request))
            .await
    }

    async fn join(&self, sync_code: &str, encrypted_device_name: &str) -> Result<JoinResponse> {
        debug!(base_url = %self.base_url, "joining sync chain");
        let request = JoinRequest {
            device_name: encrypted_device_name.to_string(),
        };
        let builder = self
            .client
            .post(self.url(paths::JOIN))
            .header(headers::SYNC_CHAIN_ID, sync_code)
            .json(&request);
        self.execute_json(builder).await
    }

    async fn get_devices(&self, identity: &ChainIdentity) -> Result<DeviceListResponse> {
        let builder = self.authed(self.client.get(self.url(paths::DEVICES)), identity);
        self.execute_json(builder).await
    }

    async fn remove_device(
        &self,
        identity: &ChainIdentity,
        target: DeviceId,
    ) -> Result<DeviceListResponse> {
        let url = self.url(&format!("{}/{}", paths::DEVICES, target));
        let builder = self.authed(self.client.delete(url), identity);
        self.execute_json(builder).await
    }

    async fn get_feeds(&self, identity: &ChainIdentity) -> Result<FeedsResponse> {
        let builder = self.authed(self.client.get(self.url(paths::FEEDS)), identity);
        self.execute_json(builder).await
    }

    async fn update_feeds(
        &self,
        identity: &ChainIdentity,
        if_match: ContentHash,
        request: &UpdateFeedsRequest,
    ) -> Result<UpdateFeedsResponse> {
        let builder = self
            .authed(self.client.post(self.url(paths::FEEDS)), identity)
            .header(IF_MATCH, if_match.to_weak_etag())
            .json(request);
        self.execute_json(builder).await
    }

    async fn get_read_marks(
        &self,
        identity: &ChainIdentity,
        since: i64,
    ) -> Result<ReadMarksResponse> {
        let builder = self
            .authed(self.client.get(self.url(paths::READ_MARKS)), identity)
            .query(&[("since", since)]);
        self.execute_json(builder).await
    }

    async fn send_read_marks(
        &self,
        identity: &ChainIdentity,
        request: &SendReadMarksRequest,
    ) -> Result<()> {
        let builder = self
            .authed(self.client.post(self.url(paths::READ_MARKS)), identity)
            .json(request);
        self.execute(builder).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> HttpRelayFactory {
        HttpRelayFactory::new(&HttpRelayConfig::default()).unwrap()
    }

    #[test]
    fn test_base_url_normalized() {
        let relay = factory().connect(" https://relay.example.org/ ").unwrap();
        assert_eq!(relay.base_url(), "https://relay.example.org");
        assert_eq!(relay.url(paths::FEEDS), "https://relay.example.org/api/v1/feeds");
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(
            factory().connect("not a url"),
            Err(RelayError::InvalidUrl(_))
        ));
        assert!(matches!(
            factory().connect("ftp://relay.example.org"),
            Err(RelayError::InvalidUrl(_))
        ));
    }
}
