//! # SDP-Core: Synthesized Session Descriptions
//!
//! Building blocks for driving a description-based WebRTC transport engine
//! when the remote peer only ever sends structured parameters (ICE, DTLS,
//! SCTP and RTP parameter sets) instead of session descriptions.
//!
//! ## Modules
//!
//! - [`parameters`]: JSON payload types exchanged with the signaling layer
//! - [`types`]: the session description document model
//! - [`parser`] / [`writer`]: the text codec
//! - [`section`]: offer and answer media sections
//! - [`remote_sdp`]: the synthesized remote description and its section registry
//! - [`utils`]: inspection of engine-generated local descriptions
//!
//! ## Usage
//!
//! ```rust
//! use rtcbridge_sdp_core::{parse_sdp, write_sdp};
//!
//! let text = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";
//! let doc = parse_sdp(text)?;
//! assert_eq!(write_sdp(&doc), text);
//! # Ok::<(), rtcbridge_sdp_core::Error>(())
//! ```

pub mod error;
pub mod parameters;
pub mod parser;
pub mod remote_sdp;
pub mod section;
pub mod types;
pub mod utils;
pub mod writer;

// Re-export commonly used types
pub use error::{Error, Result};
pub use parameters::{
    CodecOptions, DtlsFingerprint, DtlsParameters, DtlsRole, IceCandidate, IceParameters,
    MediaKind, NumSctpStreams, RtpCapabilities, RtpEncodingParameters, RtpParameters,
    SctpCapabilities, SctpParameters, SctpStreamParameters,
};
pub use parser::parse_sdp;
pub use remote_sdp::{RemoteSdp, RemoteSdpConfig, SectionChange, SectionRegistry, SectionSlot};
pub use section::{MediaSection, SectionState};
pub use types::{MediaObject, SessionDescription};
pub use writer::write_sdp;

/// Version information for the SDP core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
