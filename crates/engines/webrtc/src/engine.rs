//! `MediaEngine` implementation over one `RTCPeerConnection`
//!
//! Asynchronous verbs are spawned onto the factory's runtime and report back
//! through the session's event sink. The few synchronous ones (candidates,
//! data channels, configuration) wait for their task from the caller thread.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::peer_connection::offer_answer_options::{RTCAnswerOptions, RTCOfferOptions};
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

use signalbridge_peer::{
    AnswerOptions, DataChannel, DataChannelInit, EngineEvent, Error, EventSink, IceCandidate,
    MediaEngine, MediaStreamInfo, OfferOptions, Result, SessionConfig, SessionDescription,
    StatsReport,
};

use crate::channel::WebRtcDataChannel;
use crate::convert;

pub struct WebRtcEngine {
    pc: Arc<RTCPeerConnection>,
    runtime: Arc<Runtime>,
    sink: EventSink,
    closed: AtomicBool,
}

impl WebRtcEngine {
    pub(crate) fn new(pc: Arc<RTCPeerConnection>, runtime: Arc<Runtime>, sink: EventSink) -> Self {
        install_handlers(&pc, &runtime, &sink);
        Self {
            pc,
            runtime,
            sink,
            closed: AtomicBool::new(false),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(task);
    }

    /// Run `task` on the engine runtime and wait for it from this thread
    fn wait<F, T>(&self, task: F) -> Result<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        futures::executor::block_on(self.runtime.spawn(task))
            .map_err(|e| Error::EngineUnavailable(format!("engine task failed: {}", e)))
    }
}

impl MediaEngine for WebRtcEngine {
    fn create_offer(&self, options: &OfferOptions) {
        if self.is_closed() {
            self.sink.send(EngineEvent::OfferError("engine closed".to_string()));
            return;
        }
        let pc = self.pc.clone();
        let sink = self.sink.clone();
        let options = RTCOfferOptions {
            ice_restart: options.ice_restart,
            voice_activity_detection: options.voice_activity_detection,
        };
        self.spawn(async move {
            let event = match pc.create_offer(Some(options)).await {
                Ok(desc) => match convert::description(desc) {
                    Some(desc) => EngineEvent::OfferReady(desc),
                    None => EngineEvent::OfferError("engine produced no offer".to_string()),
                },
                Err(e) => EngineEvent::OfferError(e.to_string()),
            };
            sink.send(event);
        });
    }

    fn create_answer(&self, options: &AnswerOptions) {
        if self.is_closed() {
            self.sink.send(EngineEvent::AnswerError("engine closed".to_string()));
            return;
        }
        let pc = self.pc.clone();
        let sink = self.sink.clone();
        let options = RTCAnswerOptions {
            voice_activity_detection: options.voice_activity_detection,
        };
        self.spawn(async move {
            let event = match pc.create_answer(Some(options)).await {
                Ok(desc) => match convert::description(desc) {
                    Some(desc) => EngineEvent::AnswerReady(desc),
                    None => EngineEvent::AnswerError("engine produced no answer".to_string()),
                },
                Err(e) => EngineEvent::AnswerError(e.to_string()),
            };
            sink.send(event);
        });
    }

    fn set_local_description(&self, desc: SessionDescription) {
        if self.is_closed() {
            self.sink.send(EngineEvent::LocalSetError("engine closed".to_string()));
            return;
        }
        let pc = self.pc.clone();
        let sink = self.sink.clone();
        self.spawn(async move {
            let result = match convert::rtc_description(&desc) {
                Ok(rtc) => pc.set_local_description(rtc).await,
                Err(e) => Err(e),
            };
            sink.send(match result {
                Ok(()) => EngineEvent::LocalSet,
                Err(e) => EngineEvent::LocalSetError(e.to_string()),
            });
        });
    }

    fn set_remote_description(&self, desc: SessionDescription) {
        if self.is_closed() {
            self.sink.send(EngineEvent::RemoteSetError("engine closed".to_string()));
            return;
        }
        let pc = self.pc.clone();
        let sink = self.sink.clone();
        self.spawn(async move {
            let result = match convert::rtc_description(&desc) {
                Ok(rtc) => pc.set_remote_description(rtc).await,
                Err(e) => Err(e),
            };
            sink.send(match result {
                Ok(()) => EngineEvent::RemoteSet,
                Err(e) => EngineEvent::RemoteSetError(e.to_string()),
            });
        });
    }

    fn add_ice_candidate(&self, candidate: &IceCandidate) -> bool {
        if self.is_closed() {
            return false;
        }
        let pc = self.pc.clone();
        let init = convert::rtc_candidate(candidate);
        match self.wait(async move { pc.add_ice_candidate(init).await }) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!(error = %e, "ICE candidate refused");
                false
            }
            Err(e) => {
                warn!(error = %e, "ICE candidate task failed");
                false
            }
        }
    }

    fn get_stats(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        let pc = self.pc.clone();
        let sink = self.sink.clone();
        self.spawn(async move {
            let report = pc.get_stats().await;
            let event = match serde_json::to_value(&report.reports) {
                Ok(value) => match StatsReport::from_value(value) {
                    Ok(stats) => EngineEvent::StatsReady(stats),
                    Err(e) => EngineEvent::StatsError(e.to_string()),
                },
                Err(e) => EngineEvent::StatsError(format!("stats serialization: {}", e)),
            };
            sink.send(event);
        });
        true
    }

    fn create_data_channel(
        &self,
        label: &str,
        init: &DataChannelInit,
    ) -> Result<Arc<dyn DataChannel>> {
        if self.is_closed() {
            return Err(Error::EngineUnavailable("engine closed".to_string()));
        }
        let pc = self.pc.clone();
        let label = label.to_string();
        let rtc_init = convert::rtc_data_channel_init(init);
        let dc = self
            .wait(async move { pc.create_data_channel(&label, Some(rtc_init)).await })?
            .map_err(|e| Error::EngineRejected(e.to_string()))?;
        Ok(Arc::new(WebRtcDataChannel::new(dc, self.runtime.handle().clone())))
    }

    fn set_configuration(&self, config: &SessionConfig) -> Result<()> {
        if self.is_closed() {
            return Err(Error::EngineUnavailable("engine closed".to_string()));
        }
        let pc = self.pc.clone();
        let rtc_config = convert::rtc_configuration(config);
        self.wait(async move { pc.set_configuration(rtc_config).await })?
            .map_err(|e| Error::EngineRejected(e.to_string()))
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let pc = self.pc.clone();
        let sink = self.sink.clone();
        self.spawn(async move {
            if let Err(e) = pc.close().await {
                warn!(error = %e, "Peer connection close failed");
            }
            info!("Peer connection closed");
            sink.send(EngineEvent::EngineClosed);
        });
    }
}

/// Forward every peer connection callback into the session's event sink
fn install_handlers(pc: &RTCPeerConnection, runtime: &Runtime, sink: &EventSink) {
    let s = sink.clone();
    pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        match candidate {
            Some(c) => match convert::candidate(&c) {
                Ok(Some(c)) => {
                    s.send(EngineEvent::IceCandidate(Some(c)));
                }
                Ok(None) => warn!(address = %c.address, "Dropping ICE candidate without m-line index"),
                Err(e) => warn!(error = %e, "Dropping unserializable ICE candidate"),
            },
            None => {
                s.send(EngineEvent::IceCandidate(None));
            }
        }
        Box::pin(async {})
    }));

    let s = sink.clone();
    pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
        if let Some(state) = convert::ice_connection_state(state) {
            s.send(EngineEvent::IceConnectionChange(state));
        }
        Box::pin(async {})
    }));

    let s = sink.clone();
    pc.on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
        if let Some(state) = convert::ice_gathering_state(state) {
            s.send(EngineEvent::IceGatheringChange(state));
        }
        Box::pin(async {})
    }));

    let s = sink.clone();
    pc.on_signaling_state_change(Box::new(move |state: RTCSignalingState| {
        if let Some(state) = convert::signaling_state(state) {
            s.send(EngineEvent::SignalingChange(state));
        }
        Box::pin(async {})
    }));

    let s = sink.clone();
    let handle = runtime.handle().clone();
    pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
        debug!(label = dc.label(), "Remote data channel announced");
        s.send(EngineEvent::DataChannel(Arc::new(WebRtcDataChannel::new(
            dc,
            handle.clone(),
        ))));
        Box::pin(async {})
    }));

    let s = sink.clone();
    pc.on_track(Box::new(
        move |track: Arc<TrackRemote>,
              _receiver: Arc<RTCRtpReceiver>,
              _transceiver: Arc<RTCRtpTransceiver>| {
            let mut stream = MediaStreamInfo::new(track.stream_id());
            if let Some(kind) = convert::track_kind(track.kind()) {
                stream = stream.with_track(track.id(), kind);
            }
            s.send(EngineEvent::StreamAdded(stream));
            Box::pin(async {})
        },
    ));

    let s = sink.clone();
    pc.on_negotiation_needed(Box::new(move || {
        s.send(EngineEvent::NegotiationNeeded);
        Box::pin(async {})
    }));
}
