//! Signaling and ICE state enumerations
//!
//! Textual forms follow the WebRTC names (`have-local-offer`, `checking`, ...)
//! both for `Display` and for serde.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Negotiation phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalingState {
    #[serde(rename = "stable")]
    Stable,
    #[serde(rename = "have-local-offer")]
    HaveLocalOffer,
    #[serde(rename = "have-local-pranswer")]
    HaveLocalPrAnswer,
    #[serde(rename = "have-remote-offer")]
    HaveRemoteOffer,
    #[serde(rename = "have-remote-pranswer")]
    HaveRemotePrAnswer,
    #[serde(rename = "closed")]
    Closed,
}

impl SignalingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalingState::Stable => "stable",
            SignalingState::HaveLocalOffer => "have-local-offer",
            SignalingState::HaveLocalPrAnswer => "have-local-pranswer",
            SignalingState::HaveRemoteOffer => "have-remote-offer",
            SignalingState::HaveRemotePrAnswer => "have-remote-pranswer",
            SignalingState::Closed => "closed",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SignalingState::Closed)
    }
}

impl Default for SignalingState {
    fn default() -> Self {
        SignalingState::Stable
    }
}

impl fmt::Display for SignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ICE connection state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

impl IceConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IceConnectionState::New => "new",
            IceConnectionState::Checking => "checking",
            IceConnectionState::Connected => "connected",
            IceConnectionState::Completed => "completed",
            IceConnectionState::Failed => "failed",
            IceConnectionState::Disconnected => "disconnected",
            IceConnectionState::Closed => "closed",
        }
    }

    /// Connected or completed
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            IceConnectionState::Connected | IceConnectionState::Completed
        )
    }
}

impl Default for IceConnectionState {
    fn default() -> Self {
        IceConnectionState::New
    }
}

impl fmt::Display for IceConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ICE candidate gathering state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceGatheringState {
    New,
    Gathering,
    Complete,
}

impl IceGatheringState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IceGatheringState::New => "new",
            IceGatheringState::Gathering => "gathering",
            IceGatheringState::Complete => "complete",
        }
    }
}

impl Default for IceGatheringState {
    fn default() -> Self {
        IceGatheringState::New
    }
}

impl fmt::Display for IceGatheringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
