//! Draining engine events into session state

use tracing::{debug, info, trace, warn};

use super::Session;
use crate::bridge::{EngineEvent, QueuedEvent};
use crate::error::Error;
use crate::pending::{Completion, Verb};
use crate::signaling::Applied;
use crate::state::SignalingState;
use crate::store::Side;

impl Session {
    /// Process every engine event queued so far, in arrival order
    ///
    /// Continuations and subscription handlers run inside this call. Returns
    /// the number of events taken from the queue.
    ///
    /// Delivery is best effort. Events with nowhere to go are dropped
    /// silently (logged at `debug` or `trace`):
    ///
    /// * a completion or error with no pending operation for its verb, such
    ///   as a late duplicate from the engine
    /// * a completion owed to an operation replaced under
    ///   [`OverlapPolicy::Supersede`](crate::pending::OverlapPolicy::Supersede)
    /// * a subscription event with no handler registered
    /// * anything other than the engine's shutdown notice once the session
    ///   is closed
    ///
    /// Closing never settles outstanding operations: promises still in
    /// flight at [`Session::close`] stay unsettled and their callbacks are
    /// never run.
    pub fn drain(&mut self) -> usize {
        let batch = self.bridge.take_all();
        let count = batch.len();
        for entry in batch {
            self.dispatch(entry);
        }
        count
    }

    fn dispatch(&mut self, entry: QueuedEvent) {
        let QueuedEvent { seq, event } = entry;

        if self.is_closed() {
            match event {
                EngineEvent::EngineClosed => self.release_engine(),
                other => trace!(seq, kind = other.kind(), "Dropping event for closed session"),
            }
            return;
        }

        trace!(seq, kind = event.kind(), "Dispatching engine event");
        match event {
            EngineEvent::OfferReady(desc) => {
                self.pending
                    .resolve(Verb::CreateOffer, Completion::Description(desc));
            }
            EngineEvent::OfferError(msg) => {
                self.pending
                    .reject(Verb::CreateOffer, Error::EngineRejected(msg));
            }
            EngineEvent::AnswerReady(desc) => {
                self.pending
                    .resolve(Verb::CreateAnswer, Completion::Description(desc));
            }
            EngineEvent::AnswerError(msg) => {
                self.pending
                    .reject(Verb::CreateAnswer, Error::EngineRejected(msg));
            }
            EngineEvent::LocalSet => self.commit_description(Side::Local),
            EngineEvent::LocalSetError(msg) => self.discard_description(Side::Local, msg),
            EngineEvent::RemoteSet => self.commit_description(Side::Remote),
            EngineEvent::RemoteSetError(msg) => self.discard_description(Side::Remote, msg),
            EngineEvent::StatsReady(report) => {
                self.pending.resolve(Verb::GetStats, Completion::Stats(report));
            }
            EngineEvent::StatsError(msg) => {
                self.pending
                    .reject(Verb::GetStats, Error::EngineRejected(msg));
            }
            EngineEvent::IceCandidate(candidate) => {
                if let Some(handler) = self.handlers.ice_candidate.as_mut() {
                    handler(candidate);
                }
            }
            EngineEvent::IceConnectionChange(state) => {
                if self.ice.update_connection(state) {
                    if let Some(handler) = self.handlers.ice_connection_state_change.as_mut() {
                        handler(state);
                    }
                }
            }
            EngineEvent::IceGatheringChange(state) => {
                if self.ice.update_gathering(state) {
                    if let Some(handler) = self.handlers.ice_gathering_state_change.as_mut() {
                        handler(state);
                    }
                }
            }
            EngineEvent::SignalingChange(reported) => {
                let ours = self.signaling.state();
                if reported != ours {
                    debug!(
                        session_id = %self.id,
                        engine = %reported,
                        session = %ours,
                        "Engine signaling state differs, keeping session state"
                    );
                }
            }
            EngineEvent::DataChannel(channel) => {
                debug!(session_id = %self.id, label = channel.label(), "Remote data channel");
                if let Some(handler) = self.handlers.data_channel.as_mut() {
                    handler(channel);
                }
            }
            EngineEvent::StreamAdded(stream) => {
                if let Some(handler) = self.handlers.add_stream.as_mut() {
                    handler(stream);
                }
            }
            EngineEvent::StreamRemoved(stream) => {
                if let Some(handler) = self.handlers.remove_stream.as_mut() {
                    handler(stream);
                }
            }
            EngineEvent::NegotiationNeeded => {
                if let Some(handler) = self.handlers.negotiation_needed.as_mut() {
                    handler();
                }
            }
            EngineEvent::EngineClosed => {
                warn!(session_id = %self.id, "Engine shut down while session was open");
                self.enter_closed();
                self.release_engine();
            }
        }
    }

    fn commit_description(&mut self, side: Side) {
        let verb = side_verb(side);
        let Some(desc) = self.descriptions.take_staged(side) else {
            debug!(session_id = %self.id, side = side.as_str(), "No staged description to commit");
            self.pending.resolve(verb, Completion::Done);
            return;
        };

        let kind = desc.kind;
        let applied = self.signaling.apply(side, kind);
        self.descriptions.commit(side, desc);

        match applied {
            Applied::Changed { from, to } => {
                info!(session_id = %self.id, from = %from, to = %to, "Signaling state changed");
                self.notify_signaling(to);
            }
            Applied::Unchanged(_) => {}
            Applied::NotInTable(state) => {
                warn!(
                    session_id = %self.id,
                    state = %state,
                    side = side.as_str(),
                    kind = %kind,
                    "Engine accepted a description outside the transition table"
                );
            }
        }

        self.pending.resolve(verb, Completion::Done);
    }

    fn discard_description(&mut self, side: Side, msg: String) {
        self.descriptions.discard_staged(side);
        debug!(session_id = %self.id, side = side.as_str(), error = %msg, "Engine refused description");
        self.pending.reject(side_verb(side), Error::EngineRejected(msg));
    }

    fn notify_signaling(&mut self, state: SignalingState) {
        if let Some(handler) = self.handlers.signaling_state_change.as_mut() {
            handler(state);
        }
    }

    fn release_engine(&mut self) {
        if self.engine.take().is_some() {
            info!(session_id = %self.id, "Engine released");
        }
    }
}

fn side_verb(side: Side) -> Verb {
    match side {
        Side::Local => Verb::SetLocalDescription,
        Side::Remote => Verb::SetRemoteDescription,
    }
}
