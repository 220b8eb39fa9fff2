//! Error handling for the negotiation handlers
//!
//! Every failing handler operation reports one of the categories below.
//!
//! - **InvalidArgument**: the caller handed in something unusable; nothing was
//!   touched
//! - **InvalidState**: the operation does not apply to the current state
//!   (e.g. an unknown or already stopped local id); nothing was touched
//! - **Engine**: the transport engine refused a call; engine-side changes made
//!   earlier in the same operation were rolled back
//! - **Listener**: the signaling layer refused the local DTLS parameters
//! - **Invariant**: the engine broke its contract (e.g. no mid after a local
//!   description was applied)
//! - **Sdp**: building, parsing or patching a description failed

use rtcbridge_sdp_core::Error as SdpError;
use thiserror::Error;

use crate::engine::EngineError;

/// Result type alias for handler operations
pub type Result<T> = std::result::Result<T, HandlerError>;

/// Errors that can occur while negotiating
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Caller input was rejected before any engine call
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation does not apply to the current local id or handler state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The transport engine refused a call
    #[error("Transport engine error: {0}")]
    Engine(#[from] EngineError),

    /// The signaling layer refused the local DTLS parameters
    #[error("Listener refused the transport parameters: {0}")]
    Listener(String),

    /// The engine returned something it promised not to
    #[error("Transport engine broke its contract: {0}")]
    Invariant(String),

    /// Building, parsing or patching a description failed
    #[error("SDP error: {0}")]
    Sdp(#[from] SdpError),
}

impl HandlerError {
    /// Create a new invalid argument error
    pub fn invalid_argument(details: impl Into<String>) -> Self {
        Self::InvalidArgument(details.into())
    }

    /// Create a new invalid state error
    pub fn invalid_state(details: impl Into<String>) -> Self {
        Self::InvalidState(details.into())
    }

    /// Create a new invariant violation error
    pub fn invariant(details: impl Into<String>) -> Self {
        Self::Invariant(details.into())
    }

    /// Whether the caller can fix this by changing its input or call order
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::InvalidState(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = HandlerError::invalid_argument("missing track");
        assert_eq!(err.to_string(), "Invalid argument: missing track");
        assert!(err.is_caller_error());

        let err: HandlerError = EngineError::DescriptionRejected("bad m-line".to_string()).into();
        assert!(matches!(err, HandlerError::Engine(_)));
        assert!(!err.is_caller_error());
    }

    #[test]
    fn test_sdp_error_conversion() {
        let err: HandlerError = SdpError::parsing("no origin").into();
        assert!(
            err.to_string().contains("no origin"),
            "wrapped SDP error should keep its details"
        );
    }
}
