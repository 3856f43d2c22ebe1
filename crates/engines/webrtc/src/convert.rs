//! Conversions between session types and webrtc-rs types

use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

use signalbridge_peer::{
    BundlePolicy, DataChannelInit, DataChannelState, IceCandidate, IceConnectionState,
    IceGatheringState, IceTransportPolicy, RtcpMuxPolicy, SdpKind, SessionConfig,
    SessionDescription, SignalingState, TrackKind,
};

pub fn rtc_configuration(config: &SessionConfig) -> RTCConfiguration {
    let ice_servers = config
        .ice_servers
        .iter()
        .map(|server| RTCIceServer {
            urls: server.urls.clone(),
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
            ..Default::default()
        })
        .collect();

    RTCConfiguration {
        ice_servers,
        ice_transport_policy: match config.ice_transport_policy {
            IceTransportPolicy::All => RTCIceTransportPolicy::All,
            IceTransportPolicy::Relay => RTCIceTransportPolicy::Relay,
        },
        bundle_policy: match config.bundle_policy {
            BundlePolicy::Balanced => RTCBundlePolicy::Balanced,
            BundlePolicy::MaxCompat => RTCBundlePolicy::MaxCompat,
            BundlePolicy::MaxBundle => RTCBundlePolicy::MaxBundle,
        },
        rtcp_mux_policy: match config.rtcp_mux_policy {
            RtcpMuxPolicy::Negotiate => RTCRtcpMuxPolicy::Negotiate,
            RtcpMuxPolicy::Require => RTCRtcpMuxPolicy::Require,
        },
        ice_candidate_pool_size: config.ice_candidate_pool_size,
        ..Default::default()
    }
}

pub fn rtc_description(desc: &SessionDescription) -> webrtc::error::Result<RTCSessionDescription> {
    let sdp = desc.sdp.clone();
    match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(sdp),
        SdpKind::Answer => RTCSessionDescription::answer(sdp),
        SdpKind::PrAnswer => RTCSessionDescription::pranswer(sdp),
    }
}

/// `None` for rollback or unspecified descriptions
pub fn description(desc: RTCSessionDescription) -> Option<SessionDescription> {
    let kind = match desc.sdp_type {
        RTCSdpType::Offer => SdpKind::Offer,
        RTCSdpType::Answer => SdpKind::Answer,
        RTCSdpType::Pranswer => SdpKind::PrAnswer,
        _ => return None,
    };
    Some(SessionDescription::new(kind, desc.sdp))
}

/// `Ok(None)` when the engine gave no m-line index
pub fn candidate(candidate: &RTCIceCandidate) -> webrtc::error::Result<Option<IceCandidate>> {
    let init = candidate.to_json()?;
    Ok(candidate_from_init(init))
}

/// `None` without an m-line index; one is never made up
pub fn candidate_from_init(init: RTCIceCandidateInit) -> Option<IceCandidate> {
    let index = init.sdp_mline_index?;
    Some(IceCandidate::new(
        init.candidate,
        init.sdp_mid,
        i32::from(index),
    ))
}

pub fn rtc_candidate(candidate: &IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate.clone(),
        sdp_mid: candidate.sdp_mid.clone(),
        sdp_mline_index: candidate.mline_index(),
        username_fragment: None,
    }
}

pub fn ice_connection_state(state: RTCIceConnectionState) -> Option<IceConnectionState> {
    match state {
        RTCIceConnectionState::New => Some(IceConnectionState::New),
        RTCIceConnectionState::Checking => Some(IceConnectionState::Checking),
        RTCIceConnectionState::Connected => Some(IceConnectionState::Connected),
        RTCIceConnectionState::Completed => Some(IceConnectionState::Completed),
        RTCIceConnectionState::Disconnected => Some(IceConnectionState::Disconnected),
        RTCIceConnectionState::Failed => Some(IceConnectionState::Failed),
        RTCIceConnectionState::Closed => Some(IceConnectionState::Closed),
        _ => None,
    }
}

/// The gatherer's `closed` state has no session counterpart
pub fn ice_gathering_state(state: RTCIceGathererState) -> Option<IceGatheringState> {
    match state {
        RTCIceGathererState::New => Some(IceGatheringState::New),
        RTCIceGathererState::Gathering => Some(IceGatheringState::Gathering),
        RTCIceGathererState::Complete => Some(IceGatheringState::Complete),
        _ => None,
    }
}

pub fn signaling_state(state: RTCSignalingState) -> Option<SignalingState> {
    match state {
        RTCSignalingState::Stable => Some(SignalingState::Stable),
        RTCSignalingState::HaveLocalOffer => Some(SignalingState::HaveLocalOffer),
        RTCSignalingState::HaveRemoteOffer => Some(SignalingState::HaveRemoteOffer),
        RTCSignalingState::HaveLocalPranswer => Some(SignalingState::HaveLocalPrAnswer),
        RTCSignalingState::HaveRemotePranswer => Some(SignalingState::HaveRemotePrAnswer),
        RTCSignalingState::Closed => Some(SignalingState::Closed),
        _ => None,
    }
}

pub fn track_kind(kind: RTPCodecType) -> Option<TrackKind> {
    match kind {
        RTPCodecType::Audio => Some(TrackKind::Audio),
        RTPCodecType::Video => Some(TrackKind::Video),
        _ => None,
    }
}

#[allow(clippy::needless_update)]
pub fn rtc_data_channel_init(init: &DataChannelInit) -> RTCDataChannelInit {
    RTCDataChannelInit {
        ordered: Some(init.ordered),
        max_packet_life_time: init.max_packet_life_time,
        max_retransmits: init.max_retransmits,
        protocol: (!init.protocol.is_empty()).then(|| init.protocol.clone()),
        negotiated: init.negotiated_id,
        ..Default::default()
    }
}

pub fn data_channel_state(state: RTCDataChannelState) -> DataChannelState {
    match state {
        RTCDataChannelState::Open => DataChannelState::Open,
        RTCDataChannelState::Closing => DataChannelState::Closing,
        RTCDataChannelState::Closed => DataChannelState::Closed,
        _ => DataChannelState::Connecting,
    }
}
