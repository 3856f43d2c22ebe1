//! Error types for peer session negotiation

use crate::pending::Verb;
use crate::state::SignalingState;

/// Result type alias using the peer session Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by a peer session
///
/// Validation failures are returned synchronously from the verb that caused
/// them. Engine failures arrive later, through the error continuation of the
/// pending operation they belong to.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The verb is not legal in the current signaling state
    #[error("Invalid state: cannot {verb} in signaling state {state}")]
    InvalidState {
        /// Rejected verb
        verb: Verb,
        /// Signaling state at the time of the call
        state: SignalingState,
    },

    /// Another operation of the same kind is still in flight
    #[error("Operation already pending: {0}")]
    OperationAlreadyPending(Verb),

    /// The session has been closed
    #[error("Session is closed")]
    SessionClosed,

    /// The media engine refused the request
    #[error("Engine rejected request: {0}")]
    EngineRejected(String),

    /// Malformed candidate, description or channel options
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Engine could not be created, or its handle is gone
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error was raised locally, before reaching the engine
    pub fn is_local_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidState { .. }
                | Error::OperationAlreadyPending(_)
                | Error::SessionClosed
                | Error::InvalidArgument(_)
                | Error::InvalidConfig(_)
        )
    }

    /// Check if this error originated in the media engine
    pub fn is_engine_error(&self) -> bool {
        matches!(self, Error::EngineRejected(_) | Error::EngineUnavailable(_))
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_message_names_verb_and_state() {
        let err = Error::InvalidState {
            verb: Verb::CreateAnswer,
            state: SignalingState::Stable,
        };
        assert_eq!(
            err.to_string(),
            "Invalid state: cannot createAnswer in signaling state stable"
        );
        assert!(err.is_local_validation());
        assert!(!err.is_engine_error());
    }

    #[test]
    fn test_error_categories() {
        assert!(Error::EngineRejected("sdp".into()).is_engine_error());
        assert!(Error::InvalidConfig("x".into()).is_config_error());
        assert!(Error::SessionClosed.is_local_validation());

        let other: Error = anyhow::anyhow!("boom").into();
        assert!(!other.is_local_validation());
        assert_eq!(other.to_string(), "boom");
    }
}
