//! Pending-operation tracker
//!
//! One slot per asynchronous verb. A slot holds the caller's success and
//! error continuations until the engine reports completion; exactly one of
//! them runs, exactly once.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::description::SessionDescription;
use crate::error::{Error, Result};
use crate::stats::StatsReport;

/// Asynchronous session verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    CreateOffer,
    CreateAnswer,
    SetLocalDescription,
    SetRemoteDescription,
    AddIceCandidate,
    GetStats,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::CreateOffer => "createOffer",
            Verb::CreateAnswer => "createAnswer",
            Verb::SetLocalDescription => "setLocalDescription",
            Verb::SetRemoteDescription => "setRemoteDescription",
            Verb::AddIceCandidate => "addIceCandidate",
            Verb::GetStats => "getStats",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens when a verb is invoked while the previous one is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Fail the new call with `OperationAlreadyPending`
    #[default]
    Reject,
    /// Replace the earlier operation; its continuations are dropped unrun
    Supersede,
}

/// Successful outcome of a pending operation
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Description(SessionDescription),
    Done,
    Stats(StatsReport),
}

pub type SuccessFn = Box<dyn FnOnce(Completion)>;
pub type ErrorFn = Box<dyn FnOnce(Error)>;

/// A live operation awaiting its engine completion
pub struct PendingOperation {
    verb: Verb,
    on_success: SuccessFn,
    on_error: ErrorFn,
    created_at: Instant,
}

impl PendingOperation {
    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl fmt::Debug for PendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingOperation")
            .field("verb", &self.verb)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Tracks at most one live operation per verb
///
/// A superseded operation has already been handed to the engine, so its
/// completion still arrives, ahead of the live one. `superseded` counts those
/// per verb; that many completions are swallowed before the live slot settles.
#[derive(Debug, Default)]
pub struct PendingTracker {
    policy: OverlapPolicy,
    slots: HashMap<Verb, PendingOperation>,
    superseded: HashMap<Verb, usize>,
}

impl PendingTracker {
    pub fn new(policy: OverlapPolicy) -> Self {
        Self {
            policy,
            slots: HashMap::new(),
            superseded: HashMap::new(),
        }
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: OverlapPolicy) {
        self.policy = policy;
    }

    /// Register continuations for `verb`
    ///
    /// # Errors
    ///
    /// Returns `OperationAlreadyPending` if a slot for `verb` is live and the
    /// policy is [`OverlapPolicy::Reject`].
    pub fn begin(&mut self, verb: Verb, on_success: SuccessFn, on_error: ErrorFn) -> Result<()> {
        if let Some(existing) = self.slots.get(&verb) {
            match self.policy {
                OverlapPolicy::Reject => return Err(Error::OperationAlreadyPending(verb)),
                OverlapPolicy::Supersede => {
                    *self.superseded.entry(verb).or_insert(0) += 1;
                    debug!(
                        verb = %verb,
                        age_ms = existing.age().as_millis() as u64,
                        "Superseding pending operation"
                    );
                }
            }
        }

        self.slots.insert(
            verb,
            PendingOperation {
                verb,
                on_success,
                on_error,
                created_at: Instant::now(),
            },
        );
        trace!(verb = %verb, "Operation pending");
        Ok(())
    }

    pub fn is_pending(&self, verb: Verb) -> bool {
        self.slots.contains_key(&verb)
    }

    /// Superseded operations of `verb` whose completion has not arrived yet
    pub fn superseded(&self, verb: Verb) -> usize {
        self.superseded.get(&verb).copied().unwrap_or(0)
    }

    /// Swallow one completion owed to a superseded operation, if any
    fn consume_superseded(&mut self, verb: Verb) -> bool {
        let Some(count) = self.superseded.get_mut(&verb) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.superseded.remove(&verb);
        }
        debug!(verb = %verb, "Completion of superseded operation ignored");
        true
    }

    /// Consume the slot and run its success continuation
    ///
    /// Returns `false` (and runs nothing) when no slot is live or the
    /// completion belongs to a superseded operation.
    pub fn resolve(&mut self, verb: Verb, completion: Completion) -> bool {
        if self.consume_superseded(verb) {
            return false;
        }
        self.resolve_live(verb, completion)
    }

    /// Consume the slot and run its error continuation
    ///
    /// Returns `false` (and runs nothing) when no slot is live or the error
    /// belongs to a superseded operation.
    pub fn reject(&mut self, verb: Verb, error: Error) -> bool {
        if self.consume_superseded(verb) {
            return false;
        }
        self.reject_live(verb, error)
    }

    /// Resolve the live slot for an outcome known before any engine
    /// completion, such as a synchronous engine answer
    pub fn resolve_live(&mut self, verb: Verb, completion: Completion) -> bool {
        match self.slots.remove(&verb) {
            Some(op) => {
                trace!(verb = %verb, "Operation resolved");
                (op.on_success)(completion);
                true
            }
            None => {
                debug!(verb = %verb, "No pending operation to resolve");
                false
            }
        }
    }

    /// Reject the live slot for a failure raised before the engine took the
    /// call; superseded operations keep their claim on later completions
    pub fn reject_live(&mut self, verb: Verb, error: Error) -> bool {
        match self.slots.remove(&verb) {
            Some(op) => {
                trace!(verb = %verb, error = %error, "Operation rejected");
                (op.on_error)(error);
                true
            }
            None => {
                debug!(verb = %verb, error = %error, "No pending operation to reject");
                false
            }
        }
    }

    /// Drop every slot without running any continuation
    pub fn clear(&mut self) -> usize {
        let dropped = self.slots.len();
        self.slots.clear();
        self.superseded.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn recording(log: &Log, tag: &'static str) -> (SuccessFn, ErrorFn) {
        let ok_log = log.clone();
        let err_log = log.clone();
        (
            Box::new(move |c| ok_log.borrow_mut().push(format!("{}:ok:{:?}", tag, c))),
            Box::new(move |e| err_log.borrow_mut().push(format!("{}:err:{}", tag, e))),
        )
    }

    #[test]
    fn test_reject_policy_refuses_overlap() {
        let log: Log = Default::default();
        let mut tracker = PendingTracker::default();

        let (ok, err) = recording(&log, "first");
        tracker.begin(Verb::CreateOffer, ok, err).unwrap();

        let (ok, err) = recording(&log, "second");
        let result = tracker.begin(Verb::CreateOffer, ok, err);
        assert!(matches!(
            result,
            Err(Error::OperationAlreadyPending(Verb::CreateOffer))
        ));

        // other verbs are independent
        let (ok, err) = recording(&log, "stats");
        tracker.begin(Verb::GetStats, ok, err).unwrap();
        assert_eq!(tracker.len(), 2);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_supersede_policy_drops_old_continuations() {
        let log: Log = Default::default();
        let mut tracker = PendingTracker::new(OverlapPolicy::Supersede);

        let (ok, err) = recording(&log, "first");
        tracker.begin(Verb::CreateAnswer, ok, err).unwrap();
        let (ok, err) = recording(&log, "second");
        tracker.begin(Verb::CreateAnswer, ok, err).unwrap();

        assert_eq!(tracker.superseded(Verb::CreateAnswer), 1);

        // the first engine completion belongs to the superseded call
        assert!(!tracker.resolve(Verb::CreateAnswer, Completion::Done));
        assert!(log.borrow().is_empty());
        assert!(tracker.is_pending(Verb::CreateAnswer));
        assert_eq!(tracker.superseded(Verb::CreateAnswer), 0);

        assert!(tracker.resolve(Verb::CreateAnswer, Completion::Done));
        assert_eq!(*log.borrow(), vec!["second:ok:Done".to_string()]);
    }

    #[test]
    fn test_superseded_error_does_not_reach_live_operation() {
        let log: Log = Default::default();
        let mut tracker = PendingTracker::new(OverlapPolicy::Supersede);

        for tag in ["first", "second", "third"] {
            let (ok, err) = recording(&log, tag);
            tracker.begin(Verb::GetStats, ok, err).unwrap();
        }
        assert_eq!(tracker.superseded(Verb::GetStats), 2);

        assert!(!tracker.reject(Verb::GetStats, Error::EngineRejected("one".into())));
        assert!(!tracker.resolve(Verb::GetStats, Completion::Done));
        assert!(tracker.reject(Verb::GetStats, Error::EngineRejected("three".into())));

        assert_eq!(log.borrow().len(), 1);
        assert!(log.borrow()[0].starts_with("third:err:"));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_live_rejection_keeps_superseded_claim() {
        let log: Log = Default::default();
        let mut tracker = PendingTracker::new(OverlapPolicy::Supersede);

        let (ok, err) = recording(&log, "first");
        tracker.begin(Verb::GetStats, ok, err).unwrap();
        let (ok, err) = recording(&log, "second");
        tracker.begin(Verb::GetStats, ok, err).unwrap();

        // the engine refused the second call outright
        assert!(tracker.reject_live(Verb::GetStats, Error::EngineRejected("no stats".into())));
        assert!(log.borrow()[0].starts_with("second:err:"));

        // the first call's completion is still owed and still swallowed
        assert_eq!(tracker.superseded(Verb::GetStats), 1);
        assert!(!tracker.resolve(Verb::GetStats, Completion::Done));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_exactly_once_resolution() {
        let log: Log = Default::default();
        let mut tracker = PendingTracker::default();

        let (ok, err) = recording(&log, "op");
        tracker.begin(Verb::SetRemoteDescription, ok, err).unwrap();

        assert!(tracker.reject(
            Verb::SetRemoteDescription,
            Error::EngineRejected("bad sdp".into())
        ));
        assert!(!tracker.resolve(Verb::SetRemoteDescription, Completion::Done));
        assert!(!tracker.reject(Verb::SetRemoteDescription, Error::SessionClosed));

        assert_eq!(log.borrow().len(), 1);
        assert!(log.borrow()[0].starts_with("op:err:Engine rejected"));

        // slot is free again
        let (ok, err) = recording(&log, "again");
        assert!(tracker.begin(Verb::SetRemoteDescription, ok, err).is_ok());
    }

    #[test]
    fn test_clear_runs_nothing() {
        let log: Log = Default::default();
        let mut tracker = PendingTracker::default();
        for verb in [Verb::CreateOffer, Verb::SetLocalDescription, Verb::GetStats] {
            let (ok, err) = recording(&log, "x");
            tracker.begin(verb, ok, err).unwrap();
        }

        assert_eq!(tracker.clear(), 3);
        assert!(tracker.is_empty());
        assert_eq!(tracker.superseded(Verb::CreateOffer), 0);
        assert!(log.borrow().is_empty());
    }
}
