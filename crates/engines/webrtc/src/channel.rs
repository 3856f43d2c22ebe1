//! Data channel handle backed by an `RTCDataChannel`
//!
//! Sends are queued onto the engine runtime; the caller thread never waits
//! for SCTP. Failures after queueing are logged.

use bytes::Bytes;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};
use webrtc::data_channel::RTCDataChannel;

use signalbridge_peer::{DataChannel, DataChannelState, Error, Result};

use crate::convert;

pub struct WebRtcDataChannel {
    inner: Arc<RTCDataChannel>,
    handle: Handle,
}

impl WebRtcDataChannel {
    pub(crate) fn new(inner: Arc<RTCDataChannel>, handle: Handle) -> Self {
        Self { inner, handle }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.ready_state() {
            DataChannelState::Open => Ok(()),
            state => Err(Error::EngineRejected(format!(
                "data channel '{}' is {}",
                self.inner.label(),
                state
            ))),
        }
    }
}

impl DataChannel for WebRtcDataChannel {
    fn label(&self) -> &str {
        self.inner.label()
    }

    fn id(&self) -> Option<u16> {
        Some(self.inner.id())
    }

    fn ready_state(&self) -> DataChannelState {
        convert::data_channel_state(self.inner.ready_state())
    }

    fn send_text(&self, text: &str) -> Result<()> {
        self.ensure_open()?;
        let dc = self.inner.clone();
        let text = text.to_string();
        self.handle.spawn(async move {
            if let Err(e) = dc.send_text(text).await {
                warn!(label = dc.label(), error = %e, "Data channel text send failed");
            }
        });
        Ok(())
    }

    fn send_binary(&self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        let dc = self.inner.clone();
        let data = Bytes::copy_from_slice(data);
        self.handle.spawn(async move {
            if let Err(e) = dc.send(&data).await {
                warn!(label = dc.label(), error = %e, "Data channel binary send failed");
            }
        });
        Ok(())
    }

    fn close(&self) {
        let dc = self.inner.clone();
        self.handle.spawn(async move {
            if let Err(e) = dc.close().await {
                debug!(label = dc.label(), error = %e, "Data channel close failed");
            }
        });
    }
}
