//! Local and remote session description slots
//!
//! Each side has a *pending* and a *current* description. An offer or
//! provisional answer lands in the pending slot of its side; a final answer
//! becomes current for its side and promotes the other side's pending offer.
//! A description handed to the engine is staged and stays invisible until
//! the engine confirms it. Stages queue in call order, one per outstanding
//! engine call, so each completion settles its own description.

use std::collections::VecDeque;

use crate::description::{SdpKind, SessionDescription};

/// Which end of the session a description belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Local => "local",
            Side::Remote => "remote",
        }
    }
}

#[derive(Debug, Default, Clone)]
struct Slots {
    current: Option<SessionDescription>,
    pending: Option<SessionDescription>,
    staged: VecDeque<SessionDescription>,
}

impl Slots {
    fn visible(&self) -> Option<&SessionDescription> {
        self.pending.as_ref().or(self.current.as_ref())
    }
}

/// Description store for one session
#[derive(Debug, Default, Clone)]
pub struct DescriptionStore {
    local: Slots,
    remote: Slots,
}

impl DescriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self, side: Side) -> &Slots {
        match side {
            Side::Local => &self.local,
            Side::Remote => &self.remote,
        }
    }

    fn slots_mut(&mut self, side: Side) -> &mut Slots {
        match side {
            Side::Local => &mut self.local,
            Side::Remote => &mut self.remote,
        }
    }

    /// Hold a description while the engine applies it
    ///
    /// Queued behind any description still waiting on the engine.
    pub fn stage(&mut self, side: Side, desc: SessionDescription) {
        self.slots_mut(side).staged.push_back(desc);
    }

    /// Oldest staged description, the one the next completion refers to
    pub fn take_staged(&mut self, side: Side) -> Option<SessionDescription> {
        self.slots_mut(side).staged.pop_front()
    }

    /// Drop the oldest staged description after the engine refused it
    pub fn discard_staged(&mut self, side: Side) -> Option<SessionDescription> {
        self.slots_mut(side).staged.pop_front()
    }

    pub fn has_staged(&self, side: Side) -> bool {
        !self.slots(side).staged.is_empty()
    }

    pub fn staged_len(&self, side: Side) -> usize {
        self.slots(side).staged.len()
    }

    /// Make an engine-confirmed description visible
    pub fn commit(&mut self, side: Side, desc: SessionDescription) {
        match desc.kind {
            SdpKind::Offer | SdpKind::PrAnswer => {
                self.slots_mut(side).pending = Some(desc);
            }
            SdpKind::Answer => {
                let (own, other) = match side {
                    Side::Local => (&mut self.local, &mut self.remote),
                    Side::Remote => (&mut self.remote, &mut self.local),
                };
                own.current = Some(desc);
                own.pending = None;
                if let Some(offer) = other.pending.take() {
                    other.current = Some(offer);
                }
            }
        }
    }

    /// Pending description if any, else the current one
    pub fn get(&self, side: Side) -> Option<&SessionDescription> {
        self.slots(side).visible()
    }

    pub fn pending(&self, side: Side) -> Option<&SessionDescription> {
        self.slots(side).pending.as_ref()
    }

    pub fn current(&self, side: Side) -> Option<&SessionDescription> {
        self.slots(side).current.as_ref()
    }

    /// Drop anything still staged; committed descriptions survive
    pub fn clear_staged(&mut self) {
        self.local.staged.clear();
        self.remote.staged.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_description_is_invisible() {
        let mut store = DescriptionStore::new();
        store.stage(Side::Local, SessionDescription::offer("o1"));

        assert!(store.get(Side::Local).is_none());
        assert!(store.has_staged(Side::Local));

        let staged = store.take_staged(Side::Local).unwrap();
        store.commit(Side::Local, staged);
        assert_eq!(store.get(Side::Local).unwrap().sdp, "o1");
        assert_eq!(store.pending(Side::Local).unwrap().sdp, "o1");
        assert!(store.current(Side::Local).is_none());
    }

    #[test]
    fn test_answer_promotes_pending_offer() {
        let mut store = DescriptionStore::new();
        store.commit(Side::Local, SessionDescription::offer("o1"));
        store.commit(Side::Remote, SessionDescription::pranswer("p1"));
        store.commit(Side::Remote, SessionDescription::answer("a1"));

        assert_eq!(store.current(Side::Local).unwrap().sdp, "o1");
        assert_eq!(store.current(Side::Remote).unwrap().sdp, "a1");
        assert!(store.pending(Side::Local).is_none());
        assert!(store.pending(Side::Remote).is_none());
    }

    #[test]
    fn test_discarded_stage_leaves_previous_description() {
        let mut store = DescriptionStore::new();
        store.commit(Side::Remote, SessionDescription::offer("o1"));
        store.stage(Side::Remote, SessionDescription::offer("o2"));
        store.discard_staged(Side::Remote);

        assert_eq!(store.get(Side::Remote).unwrap().sdp, "o1");
        assert!(!store.has_staged(Side::Remote));
    }

    #[test]
    fn test_stages_settle_in_call_order() {
        let mut store = DescriptionStore::new();
        store.stage(Side::Local, SessionDescription::offer("a"));
        store.stage(Side::Local, SessionDescription::offer("b"));
        assert_eq!(store.staged_len(Side::Local), 2);

        let first = store.take_staged(Side::Local).unwrap();
        assert_eq!(first.sdp, "a");
        store.commit(Side::Local, first);
        assert_eq!(store.discard_staged(Side::Local).unwrap().sdp, "b");

        assert_eq!(store.get(Side::Local).unwrap().sdp, "a");
        assert!(!store.has_staged(Side::Local));
    }

    #[test]
    fn test_renegotiation_keeps_current_until_answered() {
        let mut store = DescriptionStore::new();
        store.commit(Side::Remote, SessionDescription::offer("o1"));
        store.commit(Side::Local, SessionDescription::answer("a1"));
        store.commit(Side::Remote, SessionDescription::offer("o2"));

        assert_eq!(store.get(Side::Remote).unwrap().sdp, "o2");
        assert_eq!(store.current(Side::Remote).unwrap().sdp, "o1");
        assert_eq!(store.get(Side::Local).unwrap().sdp, "a1");
    }
}
