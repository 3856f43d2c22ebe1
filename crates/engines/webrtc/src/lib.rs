//! webrtc-rs media engine for signalbridge sessions
//!
//! [`WebRtcEngineFactory`] owns a multi-threaded tokio runtime and a shared
//! webrtc-rs `API`. Each session gets its own `RTCPeerConnection`; every
//! callback the connection raises is forwarded to the session's event sink
//! and dispatched when the caller drains.
//!
//! ```no_run
//! use signalbridge_peer::{EngineContext, Session, SessionConfig};
//! use signalbridge_webrtc::WebRtcEngineFactory;
//!
//! # fn main() -> signalbridge_peer::Result<()> {
//! let ctx = EngineContext::new(WebRtcEngineFactory::new()?);
//! let mut session = Session::new(&ctx, SessionConfig::from_env())?;
//! let _offer = session.create_offer()?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

mod channel;
pub mod convert;
mod engine;
mod factory;

pub use channel::WebRtcDataChannel;
pub use engine::WebRtcEngine;
pub use factory::WebRtcEngineFactory;
