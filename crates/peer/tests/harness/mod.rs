//! Session test harness
//!
//! Provides a scripted media engine for integration tests:
//! - Records every call the session makes into the engine
//! - Answers like a real engine (offer/answer/set completions) unless put in
//!   manual mode, in which case tests inject events themselves
//! - Exposes the engine's event sink so tests can push events from any thread
//!
//! Basic usage pattern:
//!
//! 1. `let h = Harness::new();`
//! 2. `let mut session = h.session();`
//! 3. call verbs, `session.drain()`, inspect `h.engine().calls()`

#![allow(dead_code)]

use parking_lot::Mutex;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use signalbridge_peer::{
    DataChannel, DataChannelInit, DataChannelState, EngineContext, EngineEvent, EngineFactory,
    Error, EventSink, IceCandidate, MediaEngine, OfferOptions, AnswerOptions, Promise, Result,
    SdpKind, Session, SessionConfig, SessionDescription, StatsReport,
};

/// Initialize test logging (safe to call from every test)
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Result type for test harness operations
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Promise did not settle")]
    Unsettled,

    #[error("Session error: {0}")]
    Session(#[from] Error),
}

/// A call the session made into the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    CreateOffer(OfferOptions),
    CreateAnswer(AnswerOptions),
    SetLocal(SessionDescription),
    SetRemote(SessionDescription),
    AddIceCandidate(IceCandidate),
    GetStats,
    CreateDataChannel(String),
    SetConfiguration,
    Close,
}

/// Engine double driven by the tests
pub struct ScriptedEngine {
    sink: EventSink,
    calls: Mutex<Vec<EngineCall>>,
    manual: AtomicBool,
    accept_candidates: AtomicBool,
    stats_available: AtomicBool,
    offers: AtomicUsize,
}

impl ScriptedEngine {
    fn new(sink: EventSink, manual: bool) -> Self {
        Self {
            sink,
            calls: Mutex::new(Vec::new()),
            manual: AtomicBool::new(manual),
            accept_candidates: AtomicBool::new(true),
            stats_available: AtomicBool::new(true),
            offers: AtomicUsize::new(0),
        }
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }

    fn auto(&self) -> bool {
        !self.manual.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn set_manual(&self, manual: bool) {
        self.manual.store(manual, Ordering::SeqCst);
    }

    pub fn refuse_candidates(&self) {
        self.accept_candidates.store(false, Ordering::SeqCst);
    }

    pub fn disable_stats(&self) {
        self.stats_available.store(false, Ordering::SeqCst);
    }

    /// Push an event as if the engine had produced it
    pub fn emit(&self, event: EngineEvent) -> u64 {
        self.sink.send(event)
    }

    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }
}

impl MediaEngine for ScriptedEngine {
    fn create_offer(&self, options: &OfferOptions) {
        self.record(EngineCall::CreateOffer(*options));
        if self.auto() {
            let n = self.offers.fetch_add(1, Ordering::SeqCst);
            self.emit(EngineEvent::OfferReady(SessionDescription::offer(format!(
                "v=0\r\no=- {} 1 IN IP4 127.0.0.1\r\n",
                n
            ))));
        }
    }

    fn create_answer(&self, options: &AnswerOptions) {
        self.record(EngineCall::CreateAnswer(*options));
        if self.auto() {
            self.emit(EngineEvent::AnswerReady(SessionDescription::answer(
                "v=0\r\no=- answer 1 IN IP4 127.0.0.1\r\n",
            )));
        }
    }

    fn set_local_description(&self, desc: SessionDescription) {
        self.record(EngineCall::SetLocal(desc));
        if self.auto() {
            self.emit(EngineEvent::LocalSet);
        }
    }

    fn set_remote_description(&self, desc: SessionDescription) {
        self.record(EngineCall::SetRemote(desc));
        if self.auto() {
            self.emit(EngineEvent::RemoteSet);
        }
    }

    fn add_ice_candidate(&self, candidate: &IceCandidate) -> bool {
        self.record(EngineCall::AddIceCandidate(candidate.clone()));
        self.accept_candidates.load(Ordering::SeqCst)
    }

    fn get_stats(&self) -> bool {
        self.record(EngineCall::GetStats);
        let available = self.stats_available.load(Ordering::SeqCst);
        if available && self.auto() {
            let mut report = StatsReport::new();
            report.insert(
                "RTCPeerConnection",
                serde_json::json!({"type": "peer-connection", "dataChannelsOpened": 0}),
            );
            self.emit(EngineEvent::StatsReady(report));
        }
        available
    }

    fn create_data_channel(
        &self,
        label: &str,
        init: &DataChannelInit,
    ) -> Result<Arc<dyn DataChannel>> {
        self.record(EngineCall::CreateDataChannel(label.to_string()));
        Ok(Arc::new(RecordingChannel::new(label, init.negotiated_id)))
    }

    fn set_configuration(&self, _config: &SessionConfig) -> Result<()> {
        self.record(EngineCall::SetConfiguration);
        Ok(())
    }

    fn close(&self) {
        self.record(EngineCall::Close);
        if self.auto() {
            self.emit(EngineEvent::EngineClosed);
        }
    }
}

/// Factory handing out scripted engines and keeping hold of them
#[derive(Default)]
pub struct ScriptedFactory {
    manual: bool,
    engines: Mutex<Vec<Arc<ScriptedEngine>>>,
}

impl EngineFactory for ScriptedFactory {
    fn create_engine(
        &self,
        _config: &SessionConfig,
        sink: EventSink,
    ) -> Result<Arc<dyn MediaEngine>> {
        let engine = Arc::new(ScriptedEngine::new(sink, self.manual));
        self.engines.lock().push(engine.clone());
        Ok(engine)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Data channel double that remembers what was sent
pub struct RecordingChannel {
    label: String,
    id: Option<u16>,
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl RecordingChannel {
    pub fn new(label: &str, id: Option<u16>) -> Self {
        Self {
            label: label.to_string(),
            id,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

impl DataChannel for RecordingChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn id(&self) -> Option<u16> {
        self.id
    }

    fn ready_state(&self) -> DataChannelState {
        if self.closed.load(Ordering::SeqCst) {
            DataChannelState::Closed
        } else {
            DataChannelState::Open
        }
    }

    fn send_text(&self, text: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::EngineRejected("channel closed".to_string()));
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }

    fn send_binary(&self, data: &[u8]) -> Result<()> {
        self.send_text(&String::from_utf8_lossy(data))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Engine context plus access to the engines it created
pub struct Harness {
    factory: Arc<ScriptedFactory>,
    pub ctx: EngineContext,
}

impl Harness {
    /// Engines answer verbs on their own
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Engines only record calls; tests emit every event
    pub fn manual() -> Self {
        Self::build(true)
    }

    fn build(manual: bool) -> Self {
        init_logging();
        let factory = Arc::new(ScriptedFactory {
            manual,
            engines: Mutex::new(Vec::new()),
        });
        let ctx = EngineContext::from_arc(factory.clone());
        Self { factory, ctx }
    }

    pub fn session(&self) -> Session {
        self.session_with(SessionConfig::host_only())
    }

    pub fn session_with(&self, config: SessionConfig) -> Session {
        Session::new(&self.ctx, config).expect("session")
    }

    /// Engine behind the most recently created session
    pub fn engine(&self) -> Arc<ScriptedEngine> {
        self.factory
            .engines
            .lock()
            .last()
            .cloned()
            .expect("no engine created yet")
    }

    pub fn engine_at(&self, index: usize) -> Arc<ScriptedEngine> {
        self.factory.engines.lock()[index].clone()
    }
}

/// Drain the session, then take the promise result
pub fn settle<T>(session: &mut Session, promise: &mut Promise<T>) -> HarnessResult<T> {
    session.drain();
    match promise.try_take() {
        Some(result) => Ok(result?),
        None => Err(HarnessError::Unsettled),
    }
}

/// Shared log for callbacks and subscription handlers
#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<String>>>);

impl EventLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Drive `offerer` to have-local-offer and return the offer it made
pub fn local_offer(session: &mut Session) -> SessionDescription {
    let mut offer = session.create_offer().expect("createOffer");
    let offer = settle(session, &mut offer).expect("offer");
    assert_eq!(offer.kind, SdpKind::Offer);
    let mut set = session.set_local_description(offer.clone()).expect("setLocal");
    settle(session, &mut set).expect("setLocal settled");
    offer
}
