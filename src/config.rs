//! Viewer session configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SessionError;
use crate::ice::{default_ice_servers, IceServerConfig};

/// Which inbound media kinds the viewer wants surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Configuration for one viewer session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// WebSocket URL of the signaling server (`ws://` or `wss://`)
    pub signaling_url: String,
    /// ICE servers; `None` falls back to [`DEFAULT_ICE_SERVERS`](crate::ice::DEFAULT_ICE_SERVERS)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_servers: Option<Vec<IceServerConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<MediaConstraints>,
}

impl ConnectionConfig {
    pub fn new(signaling_url: &str) -> Self {
        Self {
            signaling_url: signaling_url.to_string(),
            ice_servers: None,
            constraints: None,
        }
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServerConfig>) -> Self {
        self.ice_servers = Some(ice_servers);
        self
    }

    pub fn with_constraints(mut self, constraints: MediaConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Parse a config from its JSON form (`signalingUrl`, `iceServers`, `constraints`).
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// ICE servers to use: the configured list wins, even when empty.
    pub fn effective_ice_servers(&self) -> Vec<IceServerConfig> {
        match &self.ice_servers {
            Some(servers) => servers.clone(),
            None => default_ice_servers(),
        }
    }

    pub fn effective_constraints(&self) -> MediaConstraints {
        self.constraints.unwrap_or_default()
    }

    /// Validate the signaling URL before any connection attempt.
    pub fn parse_signaling_url(&self) -> Result<Url, SessionError> {
        let url = Url::parse(&self.signaling_url)
            .map_err(|e| SessionError::InvalidUrl(format!("{}: {}", self.signaling_url, e)))?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(SessionError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                self.signaling_url, other
            ))),
        }
    }
}
