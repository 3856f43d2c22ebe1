//! Offer/answer negotiation core for WebRTC peer sessions
//!
//! This crate sits between a single-threaded caller and a media engine. It
//! decides which negotiation verbs are legal in which signaling state, keeps
//! one pending operation per verb, and turns engine callbacks (which arrive
//! on the engine's own threads) into an ordered event queue that the caller
//! drains on its thread.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Caller thread                                           │
//! │  Session                                                 │
//! │  ├─ SignalingStateMachine  (guards + transition table)   │
//! │  ├─ PendingTracker         (one slot per verb)           │
//! │  ├─ DescriptionStore       (pending/current/staged)      │
//! │  ├─ IceStateTracker                                      │
//! │  └─ EventBridge  ◄──── drain() ─────┐                    │
//! └─────────────────────────────────────┼────────────────────┘
//!                                       │ EventSink::send
//! ┌─────────────────────────────────────┴────────────────────┐
//! │  Engine threads: MediaEngine (created via EngineContext) │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use signalbridge_peer::{EngineContext, EngineFactory, Session, SessionConfig};
//!
//! # fn example(factory: impl EngineFactory + 'static) -> signalbridge_peer::Result<()> {
//! let ctx = EngineContext::new(factory);
//! let mut session = Session::new(&ctx, SessionConfig::from_env())?;
//!
//! let mut offer = session.create_offer()?;
//! loop {
//!     session.drain();
//!     if let Some(result) = offer.try_take() {
//!         let offer = result?;
//!         session.set_local_description(offer)?;
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod bridge;
pub mod channel;
pub mod config;
pub mod description;
pub mod engine;
pub mod error;
pub mod ice;
pub mod media;
pub mod pending;
pub mod promise;
pub mod session;
pub mod signaling;
pub mod state;
pub mod stats;
pub mod store;

// Re-exports for public API
pub use bridge::{EngineEvent, EventBridge, EventSink, Notifier, QueuedEvent};
pub use channel::{DataChannel, DataChannelInit, DataChannelState};
pub use config::{
    BundlePolicy, IceServer, IceTransportPolicy, RtcpMuxPolicy, SessionConfig,
    DEFAULT_STUN_SERVER, ICE_SERVER_ENV,
};
pub use description::{IceCandidate, SdpKind, SessionDescription};
pub use engine::{AnswerOptions, EngineContext, EngineFactory, MediaEngine, OfferOptions};
pub use error::{Error, Result};
pub use media::{MediaStreamInfo, TrackInfo, TrackKind};
pub use pending::{OverlapPolicy, Verb};
pub use promise::Promise;
pub use session::Session;
pub use state::{IceConnectionState, IceGatheringState, SignalingState};
pub use stats::StatsReport;

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
