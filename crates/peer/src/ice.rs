//! ICE connection and gathering state, mirrored from engine events

use tracing::debug;

use crate::state::{IceConnectionState, IceGatheringState};

#[derive(Debug, Default, Clone)]
pub struct IceStateTracker {
    connection: IceConnectionState,
    gathering: IceGatheringState,
}

impl IceStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> IceConnectionState {
        self.connection
    }

    pub fn gathering(&self) -> IceGatheringState {
        self.gathering
    }

    /// Record a reported connection state; `true` if it differs from the last one
    pub fn update_connection(&mut self, state: IceConnectionState) -> bool {
        if self.connection == state {
            return false;
        }
        debug!(from = %self.connection, to = %state, "ICE connection state changed");
        self.connection = state;
        true
    }

    /// Record a reported gathering state; `true` if it differs from the last one
    pub fn update_gathering(&mut self, state: IceGatheringState) -> bool {
        if self.gathering == state {
            return false;
        }
        debug!(from = %self.gathering, to = %state, "ICE gathering state changed");
        self.gathering = state;
        true
    }

    pub fn close(&mut self) {
        self.connection = IceConnectionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_reports_are_not_changes() {
        let mut ice = IceStateTracker::new();
        assert!(!ice.update_connection(IceConnectionState::New));
        assert!(ice.update_connection(IceConnectionState::Checking));
        assert!(!ice.update_connection(IceConnectionState::Checking));
        assert!(ice.update_gathering(IceGatheringState::Gathering));
        assert!(ice.update_gathering(IceGatheringState::Complete));

        ice.close();
        assert_eq!(ice.connection(), IceConnectionState::Closed);
        assert_eq!(ice.gathering(), IceGatheringState::Complete);
    }
}
