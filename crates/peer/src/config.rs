//! Configuration types for peer sessions

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pending::OverlapPolicy;

/// STUN server used when nothing else is configured
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Environment variable naming the ICE server(s), comma separated
pub const ICE_SERVER_ENV: &str = "WEBRTC_CONNECT";

/// Upper bound accepted for `ice_candidate_pool_size`
pub const MAX_CANDIDATE_POOL_SIZE: u8 = 64;

/// Main configuration for a peer session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// STUN/TURN servers (may be empty for host-only candidates)
    pub ice_servers: Vec<IceServer>,

    /// Which candidates the engine may use (default: All)
    pub ice_transport_policy: IceTransportPolicy,

    /// Media bundling (default: Balanced)
    pub bundle_policy: BundlePolicy,

    /// RTCP multiplexing (default: Negotiate)
    pub rtcp_mux_policy: RtcpMuxPolicy,

    /// Candidates to pre-gather before an offer is created (default: 0)
    pub ice_candidate_pool_size: u8,

    /// Behaviour when a verb is called while the previous one is in flight
    /// (default: Reject)
    pub pending_policy: OverlapPolicy,

    /// Free-form name used in logs
    pub label: Option<String>,
}

/// One STUN or TURN server entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    /// `stun:`, `stuns:`, `turn:` or `turns:` URLs
    pub urls: Vec<String>,

    /// Username for TURN authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Credential for TURN authentication
    #[serde(default)]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceTransportPolicy {
    #[default]
    All,
    /// Relay candidates only
    Relay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundlePolicy {
    #[default]
    Balanced,
    MaxCompat,
    MaxBundle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RtcpMuxPolicy {
    #[default]
    Negotiate,
    Require,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    fn is_turn(url: &str) -> bool {
        url.starts_with("turn:") || url.starts_with("turns:")
    }

    /// Validate URL schemes and TURN credentials
    pub fn validate(&self) -> Result<()> {
        if self.urls.is_empty() {
            return Err(Error::InvalidConfig(
                "ICE server entry has no URLs".to_string(),
            ));
        }

        for url in &self.urls {
            let known = ["stun:", "stuns:", "turn:", "turns:"]
                .iter()
                .any(|scheme| url.starts_with(scheme));
            if !known {
                return Err(Error::InvalidConfig(format!(
                    "ICE server URL must start with stun:, stuns:, turn: or turns:, got {}",
                    url
                )));
            }

            if Self::is_turn(url) && (self.username.is_none() || self.credential.is_none()) {
                return Err(Error::InvalidConfig(format!(
                    "TURN server {} requires username and credential",
                    url
                )));
            }
        }

        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServer::stun(DEFAULT_STUN_SERVER)],
            ice_transport_policy: IceTransportPolicy::All,
            bundle_policy: BundlePolicy::Balanced,
            rtcp_mux_policy: RtcpMuxPolicy::Negotiate,
            ice_candidate_pool_size: 0,
            pending_policy: OverlapPolicy::Reject,
            label: None,
        }
    }
}

impl SessionConfig {
    /// Default configuration with ICE servers taken from `WEBRTC_CONNECT`
    ///
    /// Falls back to [`DEFAULT_STUN_SERVER`] when the variable is unset or
    /// empty.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(ICE_SERVER_ENV).ok())
    }

    fn from_env_value(value: Option<String>) -> Self {
        let urls: Vec<String> = value
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        if urls.is_empty() {
            return Self::default();
        }

        Self {
            ice_servers: urls.into_iter().map(IceServer::stun).collect(),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration document and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(format!("malformed configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Host candidates only, no STUN/TURN
    ///
    /// Suitable for loopback and LAN sessions.
    pub fn host_only() -> Self {
        Self {
            ice_servers: Vec::new(),
            ..Self::default()
        }
    }

    pub fn with_ice_servers(mut self, servers: Vec<IceServer>) -> Self {
        self.ice_servers = servers;
        self
    }

    pub fn with_pending_policy(mut self, policy: OverlapPolicy) -> Self {
        self.pending_policy = policy;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - an ICE server URL has an unknown scheme
    /// - a TURN server lacks username or credential
    /// - `ice_transport_policy` is Relay but no TURN server is configured
    /// - `ice_candidate_pool_size` exceeds 64
    pub fn validate(&self) -> Result<()> {
        for server in &self.ice_servers {
            server.validate()?;
        }

        if self.ice_transport_policy == IceTransportPolicy::Relay {
            let has_turn = self
                .ice_servers
                .iter()
                .flat_map(|s| s.urls.iter())
                .any(|u| IceServer::is_turn(u));
            if !has_turn {
                return Err(Error::InvalidConfig(
                    "relay transport policy requires a TURN server".to_string(),
                ));
            }
        }

        if self.ice_candidate_pool_size > MAX_CANDIDATE_POOL_SIZE {
            return Err(Error::InvalidConfig(format!(
                "ice_candidate_pool_size must be at most {}, got {}",
                MAX_CANDIDATE_POOL_SIZE, self.ice_candidate_pool_size
            )));
        }

        Ok(())
    }
}
