//! Transport engine abstraction
//!
//! The handlers never generate ICE, DTLS or RTP state themselves. They drive
//! an external engine that speaks session descriptions (a browser-style peer
//! connection) through the [`TransportEngine`] trait and only ever hold the
//! opaque [`TransceiverId`] handles it hands out.
//!
//! Description generation and commit are `async`; everything that only
//! touches engine-side objects is synchronous.

use std::fmt;

use async_trait::async_trait;
use rtcbridge_sdp_core::types::Direction;
use rtcbridge_sdp_core::{MediaKind, RtpEncodingParameters};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for engine calls
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Failures reported by a transport engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Offer or answer generation failed
    #[error("Failed to create description: {0}")]
    DescriptionCreation(String),

    /// A local or remote description was not accepted
    #[error("Description rejected: {0}")]
    DescriptionRejected(String),

    /// The referenced transceiver does not exist (anymore)
    #[error("Unknown transceiver: {0}")]
    UnknownTransceiver(TransceiverId),

    /// Any other refused operation
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// The engine was closed
    #[error("Transport engine is closed")]
    Closed,
}

/// Opaque handle of an engine-owned transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransceiverId(pub u64);

impl fmt::Display for TransceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transceiver-{}", self.0)
    }
}

/// Kind of description handed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

impl SdpType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
        }
    }
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for offer and answer generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OfferAnswerOptions {
    /// Generate fresh ICE credentials
    pub ice_restart: bool,
}

/// A local media track, identified the way the engine identifies it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaTrack {
    pub id: String,
    pub kind: MediaKind,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: MediaKind) -> Self {
        Self { id: id.into(), kind }
    }
}

/// What a new transceiver is created for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransceiverSource {
    /// An empty transceiver of the given kind
    Kind(MediaKind),
    /// A transceiver sending the given track
    Track(MediaTrack),
}

impl TransceiverSource {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Kind(kind) => *kind,
            Self::Track(track) => track.kind,
        }
    }
}

/// Initial state of a new transceiver
#[derive(Debug, Clone, PartialEq)]
pub struct TransceiverInit {
    pub direction: Direction,
    pub send_encodings: Vec<RtpEncodingParameters>,
}

impl Default for TransceiverInit {
    fn default() -> Self {
        Self {
            direction: Direction::SendRecv,
            send_encodings: Vec::new(),
        }
    }
}

/// Data channel creation options
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataChannelInit {
    /// Ordered delivery; unset means ordered unless a reliability limit is given
    pub ordered: Option<bool>,
    pub max_packet_life_time: Option<u32>,
    pub max_retransmits: Option<u32>,
    pub protocol: String,
    /// Out-of-band negotiated channel; always set by the handlers
    pub negotiated: bool,
    /// SCTP stream id; always set by the handlers
    pub id: Option<u16>,
}

/// Engine-owned data channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChannelHandle {
    pub label: String,
    pub stream_id: u16,
}

/// Subject of a statistics request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsTarget {
    /// The whole transport
    Transport,
    Sender(TransceiverId),
    Receiver(TransceiverId),
}

/// A description-based transport engine
#[async_trait]
pub trait TransportEngine: Send + Sync {
    async fn create_offer(&self, options: OfferAnswerOptions) -> EngineResult<String>;

    async fn create_answer(&self, options: OfferAnswerOptions) -> EngineResult<String>;

    async fn set_local_description(&self, sdp_type: SdpType, sdp: &str) -> EngineResult<()>;

    async fn set_remote_description(&self, sdp_type: SdpType, sdp: &str) -> EngineResult<()>;

    /// Text of the currently applied local description
    fn local_description(&self) -> Option<String>;

    fn add_transceiver(
        &self,
        source: TransceiverSource,
        init: TransceiverInit,
    ) -> EngineResult<TransceiverId>;

    fn transceivers(&self) -> Vec<TransceiverId>;

    /// Mid of a transceiver; `None` until a description associated it
    fn transceiver_mid(&self, id: TransceiverId) -> Option<String>;

    fn set_direction(&self, id: TransceiverId, direction: Direction) -> EngineResult<()>;

    /// Replace (or clear) the track a transceiver sends
    fn set_sender_track(&self, id: TransceiverId, track: Option<&MediaTrack>) -> EngineResult<()>;

    /// Detach the sender so the transceiver stops sending for good
    fn remove_sender(&self, id: TransceiverId) -> EngineResult<()>;

    fn sender_encodings(&self, id: TransceiverId) -> EngineResult<Vec<RtpEncodingParameters>>;

    fn set_sender_encodings(
        &self,
        id: TransceiverId,
        encodings: Vec<RtpEncodingParameters>,
    ) -> EngineResult<()>;

    /// Track delivered by the receiving side of a transceiver
    fn receiver_track(&self, id: TransceiverId) -> EngineResult<MediaTrack>;

    fn create_data_channel(
        &self,
        label: &str,
        init: &DataChannelInit,
    ) -> EngineResult<DataChannelHandle>;

    async fn stats(&self, target: StatsTarget) -> EngineResult<serde_json::Value>;

    fn set_ice_servers(&self, uris: &[String]) -> EngineResult<()>;

    fn close(&self);
}
