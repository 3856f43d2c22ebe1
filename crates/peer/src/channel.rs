//! Data channel options and the engine-side channel handle

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Longest label or protocol string a channel may carry, in bytes
pub const MAX_CHANNEL_STRING_LEN: usize = 65_535;

/// Options for `create_data_channel`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataChannelInit {
    /// Deliver messages in order (default: true)
    pub ordered: bool,

    /// Give up retransmitting after this many milliseconds
    pub max_packet_life_time: Option<u16>,

    /// Give up after this many retransmissions
    pub max_retransmits: Option<u16>,

    /// Sub-protocol name
    pub protocol: String,

    /// Stream id agreed out of band; `None` lets the engine negotiate it
    pub negotiated_id: Option<u16>,
}

impl Default for DataChannelInit {
    fn default() -> Self {
        Self::reliable()
    }
}

impl DataChannelInit {
    /// Ordered delivery with unlimited retransmission
    pub fn reliable() -> Self {
        Self {
            ordered: true,
            max_packet_life_time: None,
            max_retransmits: None,
            protocol: String::new(),
            negotiated_id: None,
        }
    }

    /// Unordered delivery, no retransmission
    pub fn unreliable() -> Self {
        Self {
            ordered: false,
            max_retransmits: Some(0),
            ..Self::reliable()
        }
    }

    pub fn is_reliable(&self) -> bool {
        self.max_packet_life_time.is_none() && self.max_retransmits.is_none()
    }

    /// Validate options together with the channel label
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if:
    /// - both `max_packet_life_time` and `max_retransmits` are set
    /// - `label` or `protocol` is longer than 65535 bytes
    pub fn validate(&self, label: &str) -> Result<()> {
        if self.max_packet_life_time.is_some() && self.max_retransmits.is_some() {
            return Err(Error::InvalidArgument(
                "maxPacketLifeTime and maxRetransmits are mutually exclusive".to_string(),
            ));
        }

        if label.len() > MAX_CHANNEL_STRING_LEN {
            return Err(Error::InvalidArgument(format!(
                "data channel label is {} bytes, limit is {}",
                label.len(),
                MAX_CHANNEL_STRING_LEN
            )));
        }

        if self.protocol.len() > MAX_CHANNEL_STRING_LEN {
            return Err(Error::InvalidArgument(format!(
                "data channel protocol is {} bytes, limit is {}",
                self.protocol.len(),
                MAX_CHANNEL_STRING_LEN
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for DataChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataChannelState::Connecting => "connecting",
            DataChannelState::Open => "open",
            DataChannelState::Closing => "closing",
            DataChannelState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A data channel owned by the media engine
///
/// Handed out by `create_data_channel` for local channels and through the
/// data channel subscription for channels the remote side opened.
pub trait DataChannel: Send + Sync {
    fn label(&self) -> &str;

    /// Stream id, once negotiated
    fn id(&self) -> Option<u16>;

    fn ready_state(&self) -> DataChannelState;

    fn send_text(&self, text: &str) -> Result<()>;

    fn send_binary(&self, data: &[u8]) -> Result<()>;

    fn close(&self);
}

impl fmt::Debug for dyn DataChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataChannel")
            .field("label", &self.label())
            .field("id", &self.id())
            .field("state", &self.ready_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let reliable = DataChannelInit::default();
        assert!(reliable.ordered);
        assert!(reliable.is_reliable());

        let unreliable = DataChannelInit::unreliable();
        assert!(!unreliable.ordered);
        assert_eq!(unreliable.max_retransmits, Some(0));
        assert!(!unreliable.is_reliable());
        assert!(unreliable.validate("telemetry").is_ok());
    }

    #[test]
    fn test_lifetime_and_retransmits_are_exclusive() {
        let init = DataChannelInit {
            max_packet_life_time: Some(500),
            max_retransmits: Some(3),
            ..DataChannelInit::reliable()
        };
        assert!(matches!(init.validate("chat"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_oversized_label_rejected() {
        let label = "x".repeat(MAX_CHANNEL_STRING_LEN + 1);
        assert!(DataChannelInit::reliable().validate(&label).is_err());
    }
}
