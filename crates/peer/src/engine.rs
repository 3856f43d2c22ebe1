//! Media engine interface and the context that creates engines
//!
//! The engine owns transports, codecs and ICE. Sessions only ever talk to it
//! through [`MediaEngine`]; everything the engine has to say comes back as
//! [`EngineEvent`](crate::bridge::EngineEvent)s on the [`EventSink`] it was
//! created with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::bridge::EventSink;
use crate::channel::{DataChannel, DataChannelInit};
use crate::config::SessionConfig;
use crate::description::{IceCandidate, SessionDescription};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferOptions {
    /// Restart ICE with fresh credentials
    pub ice_restart: bool,
    pub voice_activity_detection: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOptions {
    pub voice_activity_detection: bool,
}

/// A single peer connection inside the media engine
///
/// Methods are called from the session's thread. The asynchronous ones
/// return immediately and report completion through the event sink, from
/// whatever thread the engine likes.
pub trait MediaEngine: Send + Sync {
    /// Completes with `OfferReady` or `OfferError`
    fn create_offer(&self, options: &OfferOptions);

    /// Completes with `AnswerReady` or `AnswerError`
    fn create_answer(&self, options: &AnswerOptions);

    /// Completes with `LocalSet` or `LocalSetError`
    fn set_local_description(&self, desc: SessionDescription);

    /// Completes with `RemoteSet` or `RemoteSetError`
    fn set_remote_description(&self, desc: SessionDescription);

    /// Synchronous; `false` if the engine refused the candidate
    fn add_ice_candidate(&self, candidate: &IceCandidate) -> bool;

    /// `false` if stats cannot be gathered at all; otherwise completes with
    /// `StatsReady` or `StatsError`
    fn get_stats(&self) -> bool;

    fn create_data_channel(&self, label: &str, init: &DataChannelInit)
        -> Result<Arc<dyn DataChannel>>;

    fn set_configuration(&self, config: &SessionConfig) -> Result<()>;

    /// Begin shutdown; the engine sends `EngineClosed` once it is done
    fn close(&self);
}

/// Creates one [`MediaEngine`] per session
pub trait EngineFactory: Send + Sync {
    fn create_engine(&self, config: &SessionConfig, sink: EventSink)
        -> Result<Arc<dyn MediaEngine>>;

    fn name(&self) -> &str {
        "engine"
    }
}

struct ContextInner {
    factory: Arc<dyn EngineFactory>,
    engines_created: AtomicU64,
}

/// Shared handle to an engine factory
///
/// Cloning is cheap; all clones share the factory. Build one per process (or
/// per test) and pass it to every session.
#[derive(Clone)]
pub struct EngineContext {
    inner: Arc<ContextInner>,
}

impl EngineContext {
    pub fn new<F>(factory: F) -> Self
    where
        F: EngineFactory + 'static,
    {
        Self::from_arc(Arc::new(factory))
    }

    pub fn from_arc(factory: Arc<dyn EngineFactory>) -> Self {
        info!(factory = factory.name(), "Engine context created");
        Self {
            inner: Arc::new(ContextInner {
                factory,
                engines_created: AtomicU64::new(0),
            }),
        }
    }

    pub fn create_engine(
        &self,
        config: &SessionConfig,
        sink: EventSink,
    ) -> Result<Arc<dyn MediaEngine>> {
        let engine = self.inner.factory.create_engine(config, sink)?;
        let count = self.inner.engines_created.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(factory = self.inner.factory.name(), count, "Engine created");
        Ok(engine)
    }

    pub fn factory_name(&self) -> &str {
        self.inner.factory.name()
    }

    pub fn engines_created(&self) -> u64 {
        self.inner.engines_created.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("factory", &self.factory_name())
            .field("engines_created", &self.engines_created())
            .finish()
    }
}
