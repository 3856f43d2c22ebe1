//! Persistent event subscriptions
//!
//! Each subscription holds zero or one handler. Setting a handler replaces
//! the previous one; setting `None` clears it. Handlers stay registered after
//! they run.

use std::sync::Arc;

use crate::channel::DataChannel;
use crate::description::IceCandidate;
use crate::media::MediaStreamInfo;
use crate::state::{IceConnectionState, IceGatheringState, SignalingState};

pub type OnIceCandidateHdlrFn = Box<dyn FnMut(Option<IceCandidate>)>;
pub type OnSignalingStateChangeHdlrFn = Box<dyn FnMut(SignalingState)>;
pub type OnIceConnectionStateChangeHdlrFn = Box<dyn FnMut(IceConnectionState)>;
pub type OnIceGatheringStateChangeHdlrFn = Box<dyn FnMut(IceGatheringState)>;
pub type OnNegotiationNeededHdlrFn = Box<dyn FnMut()>;
pub type OnDataChannelHdlrFn = Box<dyn FnMut(Arc<dyn DataChannel>)>;
pub type OnStreamHdlrFn = Box<dyn FnMut(MediaStreamInfo)>;

#[derive(Default)]
pub(crate) struct Handlers {
    pub ice_candidate: Option<OnIceCandidateHdlrFn>,
    pub signaling_state_change: Option<OnSignalingStateChangeHdlrFn>,
    pub ice_connection_state_change: Option<OnIceConnectionStateChangeHdlrFn>,
    pub ice_gathering_state_change: Option<OnIceGatheringStateChangeHdlrFn>,
    pub negotiation_needed: Option<OnNegotiationNeededHdlrFn>,
    pub data_channel: Option<OnDataChannelHdlrFn>,
    pub add_stream: Option<OnStreamHdlrFn>,
    pub remove_stream: Option<OnStreamHdlrFn>,
}

impl Handlers {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
