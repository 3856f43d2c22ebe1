//! Session descriptions and ICE candidates
//!
//! Both are opaque payloads: the SDP text and candidate line are carried
//! verbatim between the caller and the engine and never parsed here.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Role of a session description in the offer/answer exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
    #[serde(rename = "pranswer")]
    PrAnswer,
}

impl SdpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SdpKind::Offer => "offer",
            SdpKind::Answer => "answer",
            SdpKind::PrAnswer => "pranswer",
        }
    }
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An offer, answer or provisional answer
///
/// Serializes as `{"type": "offer", "sdp": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn new(kind: SdpKind, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            sdp: sdp.into(),
        }
    }

    pub fn offer(sdp: impl Into<String>) -> Self {
        Self::new(SdpKind::Offer, sdp)
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self::new(SdpKind::Answer, sdp)
    }

    pub fn pranswer(sdp: impl Into<String>) -> Self {
        Self::new(SdpKind::PrAnswer, sdp)
    }

    /// Parse the `{"type", "sdp"}` JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidArgument(format!("session description: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Other(e.into()))
    }
}

/// A trickled ICE candidate
///
/// `sdp_mline_index` is signed so that out-of-range input coming from a
/// caller can be represented and refused by [`IceCandidate::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: i32,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>, sdp_mid: Option<String>, sdp_mline_index: i32) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid,
            sdp_mline_index,
        }
    }

    /// Check the m-line index before the candidate is handed to the engine
    pub fn validate(&self) -> Result<()> {
        if self.mline_index().is_none() {
            return Err(Error::InvalidArgument(format!(
                "sdpMLineIndex must be in range 0-65535, got {}",
                self.sdp_mline_index
            )));
        }
        Ok(())
    }

    /// The m-line index, if it is in range
    pub fn mline_index(&self) -> Option<u16> {
        u16::try_from(self.sdp_mline_index).ok()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidArgument(format!("ICE candidate: {}", e)))
    }
}
