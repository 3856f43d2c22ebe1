//! Signaling state machine
//!
//! Guards decide which verbs may be issued in the current state; the
//! transition table is driven only by descriptions the engine has accepted.

use tracing::debug;

use crate::description::SdpKind;
use crate::error::{Error, Result};
use crate::pending::Verb;
use crate::state::SignalingState;
use crate::store::Side;

/// Next state after the engine accepted a `kind` description on `side`
///
/// `None` means the table has no row for this combination.
pub fn next_state(state: SignalingState, side: Side, kind: SdpKind) -> Option<SignalingState> {
    use SdpKind::*;
    use SignalingState::*;

    match (state, side, kind) {
        (Stable, Side::Local, Offer) => Some(HaveLocalOffer),
        (Stable, Side::Remote, Offer) => Some(HaveRemoteOffer),

        (HaveLocalOffer, Side::Local, Offer) => Some(HaveLocalOffer),
        (HaveLocalOffer, Side::Remote, Answer) => Some(Stable),
        (HaveLocalOffer, Side::Remote, PrAnswer) => Some(HaveRemotePrAnswer),

        (HaveRemoteOffer, Side::Remote, Offer) => Some(HaveRemoteOffer),
        (HaveRemoteOffer, Side::Local, Answer) => Some(Stable),
        (HaveRemoteOffer, Side::Local, PrAnswer) => Some(HaveLocalPrAnswer),

        (HaveRemotePrAnswer, Side::Remote, PrAnswer) => Some(HaveRemotePrAnswer),
        (HaveRemotePrAnswer, Side::Remote, Answer) => Some(Stable),

        (HaveLocalPrAnswer, Side::Local, PrAnswer) => Some(HaveLocalPrAnswer),
        (HaveLocalPrAnswer, Side::Local, Answer) => Some(Stable),

        _ => None,
    }
}

/// Outcome of applying an accepted description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed {
        from: SignalingState,
        to: SignalingState,
    },
    Unchanged(SignalingState),
    /// No table row; state left as is
    NotInTable(SignalingState),
}

#[derive(Debug, Default, Clone)]
pub struct SignalingStateMachine {
    state: SignalingState,
}

impl SignalingStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SignalingState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// Check whether `verb` may be issued now
    ///
    /// Only offer and answer creation are state-gated; description setters
    /// and the rest are forwarded in any open state.
    pub fn guard(&self, verb: Verb) -> Result<()> {
        if self.state.is_closed() {
            return Err(Error::SessionClosed);
        }

        let allowed = match verb {
            Verb::CreateOffer => matches!(
                self.state,
                SignalingState::Stable | SignalingState::HaveLocalOffer
            ),
            Verb::CreateAnswer => matches!(
                self.state,
                SignalingState::HaveRemoteOffer | SignalingState::HaveRemotePrAnswer
            ),
            _ => true,
        };

        if allowed {
            Ok(())
        } else {
            Err(Error::InvalidState {
                verb,
                state: self.state,
            })
        }
    }

    /// Apply a description the engine accepted
    pub fn apply(&mut self, side: Side, kind: SdpKind) -> Applied {
        let from = self.state;
        match next_state(from, side, kind) {
            Some(to) if to != from => {
                self.state = to;
                debug!(from = %from, to = %to, "Signaling state changed");
                Applied::Changed { from, to }
            }
            Some(_) => Applied::Unchanged(from),
            None => Applied::NotInTable(from),
        }
    }

    /// Enter `Closed`; returns `false` if already closed
    pub fn close(&mut self) -> bool {
        if self.state.is_closed() {
            return false;
        }
        self.state = SignalingState::Closed;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_guards() {
        let mut fsm = SignalingStateMachine::new();
        assert!(fsm.guard(Verb::CreateOffer).is_ok());
        assert!(matches!(
            fsm.guard(Verb::CreateAnswer),
            Err(Error::InvalidState {
                verb: Verb::CreateAnswer,
                state: SignalingState::Stable
            })
        ));

        fsm.apply(Side::Remote, SdpKind::Offer);
        assert!(fsm.guard(Verb::CreateAnswer).is_ok());
        assert!(fsm.guard(Verb::CreateOffer).is_err());

        fsm.apply(Side::Local, SdpKind::PrAnswer);
        assert_eq!(fsm.state(), SignalingState::HaveLocalPrAnswer);
        assert!(fsm.guard(Verb::CreateAnswer).is_err());
        assert!(fsm.guard(Verb::SetLocalDescription).is_ok());
    }

    #[test]
    fn test_offerer_path() {
        let mut fsm = SignalingStateMachine::new();
        assert_eq!(
            fsm.apply(Side::Local, SdpKind::Offer),
            Applied::Changed {
                from: SignalingState::Stable,
                to: SignalingState::HaveLocalOffer
            }
        );
        assert_eq!(
            fsm.apply(Side::Local, SdpKind::Offer),
            Applied::Unchanged(SignalingState::HaveLocalOffer)
        );
        fsm.apply(Side::Remote, SdpKind::PrAnswer);
        assert_eq!(fsm.state(), SignalingState::HaveRemotePrAnswer);
        assert!(fsm.guard(Verb::CreateAnswer).is_ok());
        fsm.apply(Side::Remote, SdpKind::Answer);
        assert_eq!(fsm.state(), SignalingState::Stable);
    }

    #[test]
    fn test_rows_missing_from_table() {
        assert_eq!(
            next_state(SignalingState::Stable, Side::Remote, SdpKind::Answer),
            None
        );
        assert_eq!(
            next_state(SignalingState::HaveLocalOffer, Side::Remote, SdpKind::Offer),
            None
        );

        let mut fsm = SignalingStateMachine::new();
        assert_eq!(
            fsm.apply(Side::Local, SdpKind::Answer),
            Applied::NotInTable(SignalingState::Stable)
        );
        assert_eq!(fsm.state(), SignalingState::Stable);
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut fsm = SignalingStateMachine::new();
        assert!(fsm.close());
        assert!(!fsm.close());
        assert!(matches!(
            fsm.guard(Verb::SetRemoteDescription),
            Err(Error::SessionClosed)
        ));
        assert_eq!(
            fsm.apply(Side::Remote, SdpKind::Offer),
            Applied::NotInTable(SignalingState::Closed)
        );
    }
}
