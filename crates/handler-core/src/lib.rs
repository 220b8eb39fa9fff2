//! # Handler-Core: Negotiation Sequencers
//!
//! Drives a description-based transport engine (anything implementing
//! [`TransportEngine`]) on behalf of a signaling layer that only exchanges
//! structured ICE/DTLS/SCTP/RTP parameters with the remote endpoint.
//!
//! - [`SendHandler`]: the engine offers, the synthesized remote description
//!   answers
//! - [`RecvHandler`]: the synthesized remote description offers, the engine
//!   answers
//!
//! Both handlers take `&mut self` for every state-changing operation, so a
//! transport is negotiated by exactly one owner at a time.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use rtcbridge_handler_core::{
//!     HandlerConfig, HandlerListener, MediaTrack, SendHandler, SendOptions, TransportEngine,
//!     TransportParameters,
//! };
//! use rtcbridge_sdp_core::MediaKind;
//!
//! async fn produce(
//!     engine: Arc<dyn TransportEngine>,
//!     listener: Arc<dyn HandlerListener>,
//!     transport: TransportParameters,
//! ) -> rtcbridge_handler_core::Result<()> {
//!     let mut handler = SendHandler::new(
//!         engine,
//!         listener,
//!         transport,
//!         HashMap::new(),
//!         HashMap::new(),
//!         HandlerConfig::default(),
//!     )?;
//!     let sent = handler
//!         .send(SendOptions::new(MediaTrack::new("mic", MediaKind::Audio)))
//!         .await?;
//!     println!("sending as {}", sent.local_id);
//!     Ok(())
//! }
//! ```

pub mod allocator;
pub mod capabilities;
pub mod config;
pub mod encodings;
pub mod engine;
pub mod error;
pub mod handler;
pub mod listener;
pub mod recv;
pub mod send;

pub use capabilities::{get_native_rtp_capabilities, get_native_sctp_capabilities};
pub use config::{HandlerConfig, SCTP_NUM_STREAMS_MIS, SCTP_NUM_STREAMS_OS};
pub use engine::{
    DataChannelHandle, DataChannelInit, EngineError, EngineResult, MediaTrack,
    OfferAnswerOptions, SdpType, StatsTarget, TransceiverId, TransceiverInit, TransceiverSource,
    TransportEngine,
};
pub use error::{HandlerError, Result};
pub use handler::{DataChannel, Handler, HandlerCore, TransportParameters};
pub use listener::{HandlerListener, IceConnectionState, ListenerError};
pub use recv::{RecvHandler, RecvResult};
pub use send::{SendHandler, SendOptions, SendResult};
