//! Capability discovery
//!
//! RTP capabilities are read from an offer of a scratch engine holding one
//! audio and one video transceiver. The engine is closed afterwards.

use rtcbridge_sdp_core::utils::extract_rtp_capabilities;
use rtcbridge_sdp_core::{parse_sdp, MediaKind, RtpCapabilities, SctpCapabilities};
use tracing::debug;

use crate::config::HandlerConfig;
use crate::engine::{OfferAnswerOptions, TransceiverInit, TransceiverSource, TransportEngine};
use crate::error::Result;

/// RTP capabilities of the engine
pub async fn get_native_rtp_capabilities(engine: &dyn TransportEngine) -> Result<RtpCapabilities> {
    let result = discover_rtp_capabilities(engine).await;
    engine.close();
    result
}

async fn discover_rtp_capabilities(engine: &dyn TransportEngine) -> Result<RtpCapabilities> {
    engine.add_transceiver(
        TransceiverSource::Kind(MediaKind::Audio),
        TransceiverInit::default(),
    )?;
    engine.add_transceiver(
        TransceiverSource::Kind(MediaKind::Video),
        TransceiverInit::default(),
    )?;

    let offer = engine.create_offer(OfferAnswerOptions::default()).await?;
    debug!("native capabilities offer:\n{}", offer);

    let doc = parse_sdp(&offer)?;
    Ok(extract_rtp_capabilities(&doc))
}

/// SCTP capabilities announced with `config`
pub fn get_native_sctp_capabilities(config: &HandlerConfig) -> SctpCapabilities {
    config.sctp_capabilities()
}
