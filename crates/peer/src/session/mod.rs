//! Peer session: the caller-facing negotiation API
//!
//! A [`Session`] lives on one thread. Verbs validate locally, register a
//! pending operation and forward to the engine; nothing the engine reports
//! takes effect until the owner calls [`Session::drain`].

mod dispatch;
mod handlers;

use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::bridge::{EventBridge, Notifier};
use crate::channel::{DataChannel, DataChannelInit};
use crate::config::SessionConfig;
use crate::description::{IceCandidate, SessionDescription};
use crate::engine::{AnswerOptions, EngineContext, MediaEngine, OfferOptions};
use crate::error::{Error, Result};
use crate::ice::IceStateTracker;
use crate::pending::{Completion, PendingTracker, SuccessFn, Verb};
use crate::promise::{self, Promise};
use crate::signaling::SignalingStateMachine;
use crate::state::{IceConnectionState, IceGatheringState, SignalingState};
use crate::stats::StatsReport;
use crate::store::{DescriptionStore, Side};

use handlers::Handlers;
pub use handlers::{
    OnDataChannelHdlrFn, OnIceCandidateHdlrFn, OnIceConnectionStateChangeHdlrFn,
    OnIceGatheringStateChangeHdlrFn, OnNegotiationNeededHdlrFn, OnSignalingStateChangeHdlrFn,
    OnStreamHdlrFn,
};

/// One negotiated peer connection
pub struct Session {
    id: String,
    config: SessionConfig,

    /// Released once the engine confirms shutdown
    engine: Option<Arc<dyn MediaEngine>>,
    bridge: EventBridge,

    signaling: SignalingStateMachine,
    ice: IceStateTracker,
    descriptions: DescriptionStore,
    pending: PendingTracker,
    handlers: Handlers,

    _single_thread: PhantomData<Rc<()>>,
}

impl Session {
    /// Create a session and its engine
    pub fn new(ctx: &EngineContext, config: SessionConfig) -> Result<Self> {
        Self::build(ctx, config, EventBridge::new())
    }

    /// Create a session whose engine events also run `notifier`
    ///
    /// The notifier runs on the engine's threads, right after an event is
    /// queued. Use it to wake the loop that calls [`Session::drain`].
    pub fn with_notifier(
        ctx: &EngineContext,
        config: SessionConfig,
        notifier: Notifier,
    ) -> Result<Self> {
        Self::build(ctx, config, EventBridge::with_notifier(notifier))
    }

    #[instrument(skip_all, fields(label = config.label.as_deref().unwrap_or("")))]
    fn build(ctx: &EngineContext, config: SessionConfig, bridge: EventBridge) -> Result<Self> {
        config.validate()?;

        let engine = ctx.create_engine(&config, bridge.sink())?;
        let id = uuid::Uuid::new_v4().to_string();
        info!(
            session_id = %id,
            engine = ctx.factory_name(),
            ice_servers = config.ice_servers.len(),
            "Session created"
        );

        Ok(Self {
            id,
            pending: PendingTracker::new(config.pending_policy),
            config,
            engine: Some(engine),
            bridge,
            signaling: SignalingStateMachine::new(),
            ice: IceStateTracker::new(),
            descriptions: DescriptionStore::new(),
            handlers: Handlers::default(),
            _single_thread: PhantomData,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn engine(&self) -> Result<Arc<dyn MediaEngine>> {
        self.engine
            .clone()
            .ok_or_else(|| Error::EngineUnavailable("engine handle released".to_string()))
    }

    // ------------------------------------------------------------------
    // Offer / answer
    // ------------------------------------------------------------------

    pub fn create_offer(&mut self) -> Result<Promise<SessionDescription>> {
        self.create_offer_with_options(OfferOptions::default())
    }

    pub fn create_offer_with_options(
        &mut self,
        options: OfferOptions,
    ) -> Result<Promise<SessionDescription>> {
        let (promise, resolver) = promise::pair();
        let on_error = resolver.clone();
        self.create_offer_with(
            options,
            move |desc| resolver.resolve(desc),
            move |err| on_error.reject(err),
        )?;
        Ok(promise)
    }

    /// Callback form of [`Session::create_offer`]
    pub fn create_offer_with(
        &mut self,
        options: OfferOptions,
        on_success: impl FnOnce(SessionDescription) + 'static,
        on_error: impl FnOnce(Error) + 'static,
    ) -> Result<()> {
        self.signaling.guard(Verb::CreateOffer)?;
        let engine = self.engine()?;
        self.pending.begin(
            Verb::CreateOffer,
            description_continuation(Verb::CreateOffer, on_success),
            Box::new(on_error),
        )?;
        debug!(session_id = %self.id, ice_restart = options.ice_restart, "Creating offer");
        engine.create_offer(&options);
        Ok(())
    }

    pub fn create_answer(&mut self) -> Result<Promise<SessionDescription>> {
        self.create_answer_with_options(AnswerOptions::default())
    }

    pub fn create_answer_with_options(
        &mut self,
        options: AnswerOptions,
    ) -> Result<Promise<SessionDescription>> {
        let (promise, resolver) = promise::pair();
        let on_error = resolver.clone();
        self.create_answer_with(
            options,
            move |desc| resolver.resolve(desc),
            move |err| on_error.reject(err),
        )?;
        Ok(promise)
    }

    /// Callback form of [`Session::create_answer`]
    pub fn create_answer_with(
        &mut self,
        options: AnswerOptions,
        on_success: impl FnOnce(SessionDescription) + 'static,
        on_error: impl FnOnce(Error) + 'static,
    ) -> Result<()> {
        self.signaling.guard(Verb::CreateAnswer)?;
        let engine = self.engine()?;
        self.pending.begin(
            Verb::CreateAnswer,
            description_continuation(Verb::CreateAnswer, on_success),
            Box::new(on_error),
        )?;
        debug!(session_id = %self.id, "Creating answer");
        engine.create_answer(&options);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Descriptions
    // ------------------------------------------------------------------

    pub fn set_local_description(&mut self, desc: SessionDescription) -> Result<Promise<()>> {
        let (promise, resolver) = promise::pair();
        let on_error = resolver.clone();
        self.set_local_description_with(
            desc,
            move || resolver.resolve(()),
            move |err| on_error.reject(err),
        )?;
        Ok(promise)
    }

    /// Callback form of [`Session::set_local_description`]
    pub fn set_local_description_with(
        &mut self,
        desc: SessionDescription,
        on_success: impl FnOnce() + 'static,
        on_error: impl FnOnce(Error) + 'static,
    ) -> Result<()> {
        self.set_description(Side::Local, desc, on_success, on_error)
    }

    pub fn set_remote_description(&mut self, desc: SessionDescription) -> Result<Promise<()>> {
        let (promise, resolver) = promise::pair();
        let on_error = resolver.clone();
        self.set_remote_description_with(
            desc,
            move || resolver.resolve(()),
            move |err| on_error.reject(err),
        )?;
        Ok(promise)
    }

    /// Callback form of [`Session::set_remote_description`]
    pub fn set_remote_description_with(
        &mut self,
        desc: SessionDescription,
        on_success: impl FnOnce() + 'static,
        on_error: impl FnOnce(Error) + 'static,
    ) -> Result<()> {
        self.set_description(Side::Remote, desc, on_success, on_error)
    }

    fn set_description(
        &mut self,
        side: Side,
        desc: SessionDescription,
        on_success: impl FnOnce() + 'static,
        on_error: impl FnOnce(Error) + 'static,
    ) -> Result<()> {
        let verb = match side {
            Side::Local => Verb::SetLocalDescription,
            Side::Remote => Verb::SetRemoteDescription,
        };
        self.signaling.guard(verb)?;
        let engine = self.engine()?;
        self.pending
            .begin(verb, unit_continuation(verb, on_success), Box::new(on_error))?;

        debug!(
            session_id = %self.id,
            side = side.as_str(),
            kind = %desc.kind,
            bytes = desc.sdp.len(),
            "Applying session description"
        );
        self.descriptions.stage(side, desc.clone());
        match side {
            Side::Local => engine.set_local_description(desc),
            Side::Remote => engine.set_remote_description(desc),
        }
        Ok(())
    }

    /// Pending local description if any, else the current one
    pub fn local_description(&self) -> Option<SessionDescription> {
        self.descriptions.get(Side::Local).cloned()
    }

    /// Pending remote description if any, else the current one
    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.descriptions.get(Side::Remote).cloned()
    }

    pub fn pending_local_description(&self) -> Option<SessionDescription> {
        self.descriptions.pending(Side::Local).cloned()
    }

    pub fn pending_remote_description(&self) -> Option<SessionDescription> {
        self.descriptions.pending(Side::Remote).cloned()
    }

    pub fn current_local_description(&self) -> Option<SessionDescription> {
        self.descriptions.current(Side::Local).cloned()
    }

    pub fn current_remote_description(&self) -> Option<SessionDescription> {
        self.descriptions.current(Side::Remote).cloned()
    }

    // ------------------------------------------------------------------
    // ICE, stats, channels, configuration
    // ------------------------------------------------------------------

    pub fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<Promise<()>> {
        let (promise, resolver) = promise::pair();
        let on_error = resolver.clone();
        self.add_ice_candidate_with(
            candidate,
            move || resolver.resolve(()),
            move |err| on_error.reject(err),
        )?;
        Ok(promise)
    }

    /// Callback form of [`Session::add_ice_candidate`]
    ///
    /// The engine answers synchronously, so one of the continuations has run
    /// by the time this returns `Ok`.
    pub fn add_ice_candidate_with(
        &mut self,
        candidate: IceCandidate,
        on_success: impl FnOnce() + 'static,
        on_error: impl FnOnce(Error) + 'static,
    ) -> Result<()> {
        self.signaling.guard(Verb::AddIceCandidate)?;
        candidate.validate()?;
        let engine = self.engine()?;
        self.pending.begin(
            Verb::AddIceCandidate,
            unit_continuation(Verb::AddIceCandidate, on_success),
            Box::new(on_error),
        )?;

        if engine.add_ice_candidate(&candidate) {
            self.pending
                .resolve_live(Verb::AddIceCandidate, Completion::Done);
        } else {
            debug!(session_id = %self.id, candidate = %candidate.candidate, "Engine refused ICE candidate");
            self.pending.reject_live(
                Verb::AddIceCandidate,
                Error::EngineRejected(format!("ICE candidate refused: {}", candidate.candidate)),
            );
        }
        Ok(())
    }

    pub fn get_stats(&mut self) -> Result<Promise<StatsReport>> {
        let (promise, resolver) = promise::pair();
        let on_error = resolver.clone();
        self.get_stats_with(move |r| resolver.resolve(r), move |err| on_error.reject(err))?;
        Ok(promise)
    }

    /// Callback form of [`Session::get_stats`]
    pub fn get_stats_with(
        &mut self,
        on_success: impl FnOnce(StatsReport) + 'static,
        on_error: impl FnOnce(Error) + 'static,
    ) -> Result<()> {
        self.signaling.guard(Verb::GetStats)?;
        let engine = self.engine()?;
        let success: SuccessFn = Box::new(move |completion| match completion {
            Completion::Stats(report) => on_success(report),
            other => warn!(?other, "Unexpected completion for getStats"),
        });
        self.pending
            .begin(Verb::GetStats, success, Box::new(on_error))?;

        if !engine.get_stats() {
            self.pending.reject_live(
                Verb::GetStats,
                Error::EngineRejected("statistics unavailable".to_string()),
            );
        }
        Ok(())
    }

    /// Open a data channel; the engine creates it synchronously
    pub fn create_data_channel(
        &mut self,
        label: &str,
        init: DataChannelInit,
    ) -> Result<Arc<dyn DataChannel>> {
        if self.signaling.is_closed() {
            return Err(Error::SessionClosed);
        }
        init.validate(label)?;
        let channel = self.engine()?.create_data_channel(label, &init)?;
        info!(
            session_id = %self.id,
            label,
            ordered = init.ordered,
            reliable = init.is_reliable(),
            "Data channel created"
        );
        Ok(channel)
    }

    pub fn get_configuration(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace the configuration, validating it and forwarding it to the engine
    pub fn set_configuration(&mut self, config: SessionConfig) -> Result<()> {
        if self.signaling.is_closed() {
            return Err(Error::SessionClosed);
        }
        config.validate()?;
        self.engine()?.set_configuration(&config)?;
        self.pending.set_policy(config.pending_policy);
        info!(session_id = %self.id, ice_servers = config.ice_servers.len(), "Configuration updated");
        self.config = config;
        Ok(())
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn signaling_state(&self) -> SignalingState {
        self.signaling.state()
    }

    pub fn ice_connection_state(&self) -> IceConnectionState {
        self.ice.connection()
    }

    pub fn ice_gathering_state(&self) -> IceGatheringState {
        self.ice.gathering()
    }

    pub fn is_closed(&self) -> bool {
        self.signaling.is_closed()
    }

    pub fn is_pending(&self, verb: Verb) -> bool {
        self.pending.is_pending(verb)
    }

    /// Whether the engine handle has been released after shutdown
    pub fn is_engine_released(&self) -> bool {
        self.engine.is_none()
    }

    /// Engine events queued but not yet drained
    pub fn queued_events(&self) -> usize {
        self.bridge.len()
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn on_ice_candidate(&mut self, handler: Option<OnIceCandidateHdlrFn>) {
        self.handlers.ice_candidate = handler;
    }

    pub fn on_signaling_state_change(&mut self, handler: Option<OnSignalingStateChangeHdlrFn>) {
        self.handlers.signaling_state_change = handler;
    }

    pub fn on_ice_connection_state_change(
        &mut self,
        handler: Option<OnIceConnectionStateChangeHdlrFn>,
    ) {
        self.handlers.ice_connection_state_change = handler;
    }

    pub fn on_ice_gathering_state_change(
        &mut self,
        handler: Option<OnIceGatheringStateChangeHdlrFn>,
    ) {
        self.handlers.ice_gathering_state_change = handler;
    }

    pub fn on_negotiation_needed(&mut self, handler: Option<OnNegotiationNeededHdlrFn>) {
        self.handlers.negotiation_needed = handler;
    }

    pub fn on_data_channel(&mut self, handler: Option<OnDataChannelHdlrFn>) {
        self.handlers.data_channel = handler;
    }

    pub fn on_add_stream(&mut self, handler: Option<OnStreamHdlrFn>) {
        self.handlers.add_stream = handler;
    }

    pub fn on_remove_stream(&mut self, handler: Option<OnStreamHdlrFn>) {
        self.handlers.remove_stream = handler;
    }

    // ------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------

    /// Close the session
    ///
    /// Idempotent. Pending operations are dropped without running their
    /// continuations. The engine handle is kept until the engine reports
    /// that it has shut down.
    pub fn close(&mut self) {
        if !self.enter_closed() {
            return;
        }
        if let Some(engine) = &self.engine {
            engine.close();
        }
        info!(session_id = %self.id, "Session closed");
    }

    /// Move to `Closed` and drop per-session callbacks; `false` if already closed
    fn enter_closed(&mut self) -> bool {
        if !self.signaling.close() {
            return false;
        }
        self.ice.close();
        self.descriptions.clear_staged();
        let dropped = self.pending.clear();
        if dropped > 0 {
            debug!(session_id = %self.id, dropped, "Discarded pending operations on close");
        }
        self.handlers.clear();
        true
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.close();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("signaling_state", &self.signaling.state())
            .field("ice_connection_state", &self.ice.connection())
            .field("pending", &self.pending.len())
            .field("engine_released", &self.engine.is_none())
            .finish()
    }
}

fn description_continuation(
    verb: Verb,
    on_success: impl FnOnce(SessionDescription) + 'static,
) -> SuccessFn {
    Box::new(move |completion| match completion {
        Completion::Description(desc) => on_success(desc),
        other => warn!(verb = %verb, ?other, "Unexpected completion"),
    })
}

fn unit_continuation(verb: Verb, on_success: impl FnOnce() + 'static) -> SuccessFn {
    Box::new(move |completion| match completion {
        Completion::Done => on_success(),
        other => warn!(verb = %verb, ?other, "Unexpected completion"),
    })
}
