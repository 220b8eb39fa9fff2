//! # rtcbridge
//!
//! Negotiates a description-based WebRTC transport engine with a remote
//! endpoint (typically an SFU) that never exchanges session descriptions,
//! only structured transport and RTP parameters.
//!
//! - [`sdp`]: parameter payloads, the description model and text codec, and
//!   the synthesized remote description
//! - [`handler`]: the engine and listener traits and the send/receive
//!   negotiation handlers
//!
//! ```rust
//! use rtcbridge::prelude::*;
//!
//! let config = HandlerConfig::new().with_origin_username("edge");
//! let sctp = get_native_sctp_capabilities(&config);
//! assert_eq!(sctp.num_streams.os, SCTP_NUM_STREAMS_OS);
//! ```

pub use rtcbridge_handler_core as handler;
pub use rtcbridge_sdp_core as sdp;

/// Commonly used types
pub mod prelude {
    pub use rtcbridge_handler_core::{
        get_native_rtp_capabilities, get_native_sctp_capabilities, DataChannel,
        DataChannelInit, Handler, HandlerConfig, HandlerError, HandlerListener,
        IceConnectionState, MediaTrack, RecvHandler, RecvResult, SendHandler, SendOptions,
        SendResult, TransceiverId, TransportEngine, TransportParameters, SCTP_NUM_STREAMS_MIS,
        SCTP_NUM_STREAMS_OS,
    };
    pub use rtcbridge_sdp_core::{
        CodecOptions, DtlsParameters, DtlsRole, IceCandidate, IceParameters, MediaKind,
        RtpCapabilities, RtpEncodingParameters, RtpParameters, SctpCapabilities,
        SctpParameters, SctpStreamParameters,
    };
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
