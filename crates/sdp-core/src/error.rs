//! Error handling for the SDP core
//!
//! Errors raised while building, patching, parsing or inspecting
//! synthesized session descriptions.

use thiserror::Error;

/// Result type alias for SDP core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the SDP core
#[derive(Error, Debug)]
pub enum Error {
    /// Description text could not be parsed
    #[error("SDP parsing error: {0}")]
    SdpParsingError(String),

    /// Parameters handed in by the signaling layer are unusable
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// No media section is registered under the given mid
    #[error("Unknown media section: {0}")]
    UnknownSection(String),

    /// A section slot no longer holds what it was handed out for
    #[error("Section slot {0} is not available")]
    SlotUnavailable(usize),

    /// An application section was requested without SCTP parameters
    #[error("Missing SCTP parameters for application media section")]
    MissingSctpParameters,

    /// JSON (de)serialization of a payload failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a new parsing error
    pub fn parsing(details: impl Into<String>) -> Self {
        Self::SdpParsingError(details.into())
    }

    /// Create a new invalid parameters error
    pub fn invalid_parameters(details: impl Into<String>) -> Self {
        Self::InvalidParameters(details.into())
    }
}
