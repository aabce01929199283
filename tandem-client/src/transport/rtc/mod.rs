//! Transport capability on top of `webrtc` and the server's `/peer` broker.

mod broker_link;
mod peer_connection;

pub use broker_link::WebRtcEndpoint;

use crate::transport::{IdentityError, PeerEndpoint, Transport};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use tandem_core::IceServerConfig;
use tandem_core::utils::default_stun_urls;

#[derive(Debug, Clone)]
pub struct WebRtcTransportConfig {
    /// WebSocket URL of the broker, e.g. `ws://localhost:3000/peer`.
    pub broker_url: String,

    /// Used until the broker sends its own ICE configuration.
    pub ice_servers: Vec<IceServerConfig>,
}

impl WebRtcTransportConfig {
    pub fn new(broker_url: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            ice_servers: vec![IceServerConfig {
                urls: default_stun_urls(),
                username: None,
                credential: None,
            }],
        }
    }

    /// Broker endpoint of the server at `base_url` (`http://host` becomes
    /// `ws://host/peer`).
    pub fn for_server(base_url: &str) -> Result<Self> {
        let mut url = Url::parse(base_url).context("Invalid server url")?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(anyhow!("Unsupported server url scheme: {}", other)),
        };
        url.set_scheme(scheme)
            .map_err(|_| anyhow!("Cannot use {} as a broker url", base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Cannot use {} as a broker url", base_url))?
            .pop_if_empty()
            .push("peer");
        Ok(Self::new(url.to_string()))
    }
}

/// Each identity is one broker WebSocket connection.
#[derive(Debug, Clone)]
pub struct WebRtcTransport {
    config: WebRtcTransportConfig,
}

impl WebRtcTransport {
    pub fn new(config: WebRtcTransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transport for WebRtcTransport {
    async fn create_identity(&self) -> Result<Arc<dyn PeerEndpoint>, IdentityError> {
        let endpoint = WebRtcEndpoint::connect(&self.config).await?;
        Ok(Arc::new(endpoint))
    }
}
