//! Engine event bridge
//!
//! Engine threads push [`EngineEvent`]s through an [`EventSink`]; the thread
//! that owns the session takes them out of the [`EventBridge`] in the order
//! they were enqueued. Pushing never blocks on the consumer and never fails.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::channel::DataChannel;
use crate::description::{IceCandidate, SessionDescription};
use crate::media::MediaStreamInfo;
use crate::pending::Verb;
use crate::state::{IceConnectionState, IceGatheringState, SignalingState};
use crate::stats::StatsReport;

/// Notifications an engine delivers to its session
#[derive(Clone)]
pub enum EngineEvent {
    OfferReady(SessionDescription),
    OfferError(String),
    AnswerReady(SessionDescription),
    AnswerError(String),
    LocalSet,
    LocalSetError(String),
    RemoteSet,
    RemoteSetError(String),
    /// `None` marks the end of candidate gathering
    IceCandidate(Option<IceCandidate>),
    IceConnectionChange(IceConnectionState),
    IceGatheringChange(IceGatheringState),
    /// The engine's own view of the signaling state
    SignalingChange(SignalingState),
    DataChannel(Arc<dyn DataChannel>),
    StreamAdded(MediaStreamInfo),
    StreamRemoved(MediaStreamInfo),
    StatsReady(StatsReport),
    StatsError(String),
    NegotiationNeeded,
    /// The engine finished shutting down; no further events follow
    EngineClosed,
}

impl EngineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::OfferReady(_) => "offer-ready",
            EngineEvent::OfferError(_) => "offer-error",
            EngineEvent::AnswerReady(_) => "answer-ready",
            EngineEvent::AnswerError(_) => "answer-error",
            EngineEvent::LocalSet => "local-set",
            EngineEvent::LocalSetError(_) => "local-set-error",
            EngineEvent::RemoteSet => "remote-set",
            EngineEvent::RemoteSetError(_) => "remote-set-error",
            EngineEvent::IceCandidate(_) => "ice-candidate",
            EngineEvent::IceConnectionChange(_) => "ice-connection-change",
            EngineEvent::IceGatheringChange(_) => "ice-gathering-change",
            EngineEvent::SignalingChange(_) => "signaling-change",
            EngineEvent::DataChannel(_) => "data-channel",
            EngineEvent::StreamAdded(_) => "stream-added",
            EngineEvent::StreamRemoved(_) => "stream-removed",
            EngineEvent::StatsReady(_) => "stats-ready",
            EngineEvent::StatsError(_) => "stats-error",
            EngineEvent::NegotiationNeeded => "negotiation-needed",
            EngineEvent::EngineClosed => "engine-closed",
        }
    }

    /// The verb this event completes, if it is a completion at all
    pub fn completes(&self) -> Option<Verb> {
        match self {
            EngineEvent::OfferReady(_) | EngineEvent::OfferError(_) => Some(Verb::CreateOffer),
            EngineEvent::AnswerReady(_) | EngineEvent::AnswerError(_) => Some(Verb::CreateAnswer),
            EngineEvent::LocalSet | EngineEvent::LocalSetError(_) => {
                Some(Verb::SetLocalDescription)
            }
            EngineEvent::RemoteSet | EngineEvent::RemoteSetError(_) => {
                Some(Verb::SetRemoteDescription)
            }
            EngineEvent::StatsReady(_) | EngineEvent::StatsError(_) => Some(Verb::GetStats),
            _ => None,
        }
    }
}

impl fmt::Debug for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::OfferReady(d) | EngineEvent::AnswerReady(d) => {
                write!(f, "{}({}, {} bytes)", self.kind(), d.kind, d.sdp.len())
            }
            EngineEvent::OfferError(m)
            | EngineEvent::AnswerError(m)
            | EngineEvent::LocalSetError(m)
            | EngineEvent::RemoteSetError(m)
            | EngineEvent::StatsError(m) => write!(f, "{}({:?})", self.kind(), m),
            EngineEvent::IceCandidate(c) => write!(f, "{}({:?})", self.kind(), c),
            EngineEvent::IceConnectionChange(s) => write!(f, "{}({})", self.kind(), s),
            EngineEvent::IceGatheringChange(s) => write!(f, "{}({})", self.kind(), s),
            EngineEvent::SignalingChange(s) => write!(f, "{}({})", self.kind(), s),
            EngineEvent::DataChannel(ch) => write!(f, "{}({:?})", self.kind(), ch),
            EngineEvent::StreamAdded(s) | EngineEvent::StreamRemoved(s) => {
                write!(f, "{}({})", self.kind(), s.id)
            }
            EngineEvent::StatsReady(r) => write!(f, "{}({} entries)", self.kind(), r.len()),
            _ => f.write_str(self.kind()),
        }
    }
}

/// An event together with its position in the queue
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub seq: u64,
    pub event: EngineEvent,
}

/// Callback run after every enqueue, used to wake the owning event loop
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Queue {
    entries: VecDeque<QueuedEvent>,
    next_seq: u64,
}

struct Shared {
    queue: Mutex<Queue>,
    notifier: Option<Notifier>,
}

/// Producer handle given to the engine
///
/// Cheap to clone; every clone feeds the same session.
#[derive(Clone)]
pub struct EventSink {
    shared: Arc<Shared>,
}

impl EventSink {
    /// Enqueue `event` and return its sequence number
    pub fn send(&self, event: EngineEvent) -> u64 {
        let seq = {
            let mut queue = self.shared.queue.lock();
            let seq = queue.next_seq;
            queue.next_seq += 1;
            trace!(seq, kind = event.kind(), "Engine event queued");
            queue.entries.push_back(QueuedEvent { seq, event });
            seq
        };

        if let Some(notify) = &self.shared.notifier {
            notify();
        }
        seq
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("queued", &self.shared.queue.lock().entries.len())
            .finish()
    }
}

/// Consumer side of the engine event queue
pub struct EventBridge {
    shared: Arc<Shared>,
}

impl EventBridge {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Bridge that runs `notifier` after every enqueue
    pub fn with_notifier(notifier: Notifier) -> Self {
        Self::build(Some(notifier))
    }

    fn build(notifier: Option<Notifier>) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue::default()),
                notifier,
            }),
        }
    }

    pub fn sink(&self) -> EventSink {
        EventSink {
            shared: self.shared.clone(),
        }
    }

    /// Take every queued event, oldest first
    ///
    /// Events enqueued while the caller works through the batch are left for
    /// the next call.
    pub fn take_all(&self) -> VecDeque<QueuedEvent> {
        std::mem::take(&mut self.shared.queue.lock().entries)
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_sequence_follows_enqueue_order() {
        let bridge = EventBridge::new();
        let sink = bridge.sink();
        sink.send(EngineEvent::NegotiationNeeded);
        sink.send(EngineEvent::LocalSet);
        sink.send(EngineEvent::EngineClosed);

        let batch: Vec<_> = bridge.take_all().into_iter().collect();
        let seqs: Vec<u64> = batch.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(batch[1].event.kind(), "local-set");
        assert!(bridge.is_empty());
    }

    #[test]
    fn test_concurrent_producers_keep_per_thread_order() {
        let bridge = EventBridge::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let sink = bridge.sink();
                thread::spawn(move || {
                    for i in 0..250 {
                        sink.send(EngineEvent::OfferError(format!("{}:{}", t, i)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let batch = bridge.take_all();
        assert_eq!(batch.len(), 1000);

        let mut last = [-1i64; 4];
        for (pos, entry) in batch.iter().enumerate() {
            assert_eq!(entry.seq, pos as u64);
            if let EngineEvent::OfferError(msg) = &entry.event {
                let (t, i) = msg.split_once(':').unwrap();
                let (t, i): (usize, i64) = (t.parse().unwrap(), i.parse().unwrap());
                assert!(i > last[t]);
                last[t] = i;
            }
        }
    }

    #[test]
    fn test_notifier_runs_per_enqueue() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let bridge = EventBridge::with_notifier(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let sink = bridge.sink();
        sink.send(EngineEvent::NegotiationNeeded);
        sink.clone().send(EngineEvent::RemoteSet);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(bridge.len(), 2);
    }

    #[test]
    fn test_completion_mapping() {
        assert_eq!(
            EngineEvent::StatsError("x".into()).completes(),
            Some(Verb::GetStats)
        );
        assert_eq!(EngineEvent::IceCandidate(None).completes(), None);
    }
}
