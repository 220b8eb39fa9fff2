//! Send-side negotiation
//!
//! The local engine is the offerer. Every operation makes the engine create
//! an offer, commits it locally, and answers it with the synthesized remote
//! description.
//!
//! ```text
//! send(track) ─► add_transceiver ─► create_offer ─► [DTLS exchange] ─► set_local(offer)
//!                                                                         │
//!             set_remote(answer) ◄─ serialize ◄─ answer section ◄─ read mid/cname/encodings
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rtcbridge_sdp_core::types::Direction;
use rtcbridge_sdp_core::utils::{get_cname, get_rtp_encodings};
use rtcbridge_sdp_core::{
    parse_sdp, CodecOptions, DtlsRole, IceParameters, MediaKind, RtpEncodingParameters,
    RtpParameters, SectionSlot,
};
use tracing::{debug, info, warn};

use crate::allocator::{apply_spatial_layer, MAX_SPATIAL_LAYERS};
use crate::config::HandlerConfig;
use crate::encodings::{apply_simulcast_scalability, assign_rids, merge_encodings};
use crate::engine::{
    DataChannelInit, EngineError, MediaTrack, OfferAnswerOptions, SdpType, StatsTarget, TransceiverId,
    TransceiverInit, TransceiverSource, TransportEngine,
};
use crate::error::{HandlerError, Result};
use crate::handler::{DataChannel, Handler, HandlerCore, TransportParameters};
use crate::listener::HandlerListener;

/// What to send
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub track: Option<MediaTrack>,
    /// Requested encodings; several mean simulcast
    pub encodings: Vec<RtpEncodingParameters>,
    pub codec_options: Option<CodecOptions>,
}

impl SendOptions {
    pub fn new(track: MediaTrack) -> Self {
        Self {
            track: Some(track),
            ..Default::default()
        }
    }

    pub fn with_encodings(mut self, encodings: Vec<RtpEncodingParameters>) -> Self {
        self.encodings = encodings;
        self
    }

    pub fn with_codec_options(mut self, codec_options: CodecOptions) -> Self {
        self.codec_options = Some(codec_options);
        self
    }
}

/// Outcome of a successful send
#[derive(Debug, Clone, PartialEq)]
pub struct SendResult {
    pub local_id: String,
    pub transceiver: TransceiverId,
    /// Parameters to announce to the remote endpoint
    pub rtp_parameters: RtpParameters,
}

/// Negotiates outgoing tracks and data channels
pub struct SendHandler {
    core: HandlerCore,
    sending_rtp_parameters_by_kind: HashMap<MediaKind, RtpParameters>,
    sending_remote_rtp_parameters_by_kind: HashMap<MediaKind, RtpParameters>,
}

impl SendHandler {
    /// Create a send handler
    ///
    /// `sending_rtp_parameters_by_kind` are the parameters this side will
    /// announce per kind; `sending_remote_rtp_parameters_by_kind` are the
    /// matching parameters the remote endpoint accepts.
    pub fn new(
        engine: Arc<dyn TransportEngine>,
        listener: Arc<dyn HandlerListener>,
        transport: TransportParameters,
        sending_rtp_parameters_by_kind: HashMap<MediaKind, RtpParameters>,
        sending_remote_rtp_parameters_by_kind: HashMap<MediaKind, RtpParameters>,
        config: HandlerConfig,
    ) -> Result<Self> {
        Ok(Self {
            core: HandlerCore::new(engine, listener, transport, config)?,
            sending_rtp_parameters_by_kind,
            sending_remote_rtp_parameters_by_kind,
        })
    }

    /// Start sending a track
    pub async fn send(&mut self, options: SendOptions) -> Result<SendResult> {
        let SendOptions {
            track,
            mut encodings,
            codec_options,
        } = options;

        let track = track.ok_or_else(|| HandlerError::invalid_argument("missing track"))?;
        if !track.kind.is_rtp() {
            return Err(HandlerError::invalid_argument(format!(
                "cannot send a track of kind {}",
                track.kind
            )));
        }
        let mut rtp_parameters = self
            .sending_rtp_parameters_by_kind
            .get(&track.kind)
            .cloned()
            .ok_or_else(|| {
                HandlerError::invalid_argument(format!("no sending RTP parameters for {}", track.kind))
            })?;
        let remote_rtp_parameters = self
            .sending_remote_rtp_parameters_by_kind
            .get(&track.kind)
            .cloned()
            .ok_or_else(|| {
                HandlerError::invalid_argument(format!(
                    "no remote RTP parameters for {}",
                    track.kind
                ))
            })?;

        debug!("send() [kind:{}, track:{}]", track.kind, track.id);

        assign_rids(&mut encodings);
        let slot = self.core.remote_sdp.next_section_slot();

        let transceiver = self.core.engine.add_transceiver(
            TransceiverSource::Track(track.clone()),
            TransceiverInit {
                direction: Direction::SendOnly,
                send_encodings: encodings.clone(),
            },
        )?;

        let negotiated = self
            .negotiate_send(
                transceiver,
                &slot,
                &encodings,
                &mut rtp_parameters,
                &remote_rtp_parameters,
                codec_options.as_ref(),
            )
            .await;

        let local_id = match negotiated {
            Ok(local_id) => local_id,
            Err(e) => {
                warn!("send() failed, deactivating {}: {}", transceiver, e);
                self.deactivate(transceiver);
                return Err(e);
            }
        };

        self.core.associate(&local_id, transceiver);
        info!("Sending {} track {} as local id {}", track.kind, track.id, local_id);

        Ok(SendResult {
            local_id,
            transceiver,
            rtp_parameters,
        })
    }

    async fn negotiate_send(
        &mut self,
        transceiver: TransceiverId,
        slot: &SectionSlot,
        encodings: &[RtpEncodingParameters],
        rtp_parameters: &mut RtpParameters,
        remote_rtp_parameters: &RtpParameters,
        codec_options: Option<&CodecOptions>,
    ) -> Result<String> {
        let offer = self
            .core
            .engine
            .create_offer(OfferAnswerOptions::default())
            .await?;

        if !self.core.is_transport_ready() {
            let offer_doc = parse_sdp(&offer)?;
            self.core.setup_transport(DtlsRole::Server, &offer_doc).await?;
        }

        debug!("calling set_local_description() [offer]:\n{}", offer);
        self.core
            .engine
            .set_local_description(SdpType::Offer, &offer)
            .await?;

        let local_id = self.core.transceiver_mid(transceiver)?;
        rtp_parameters.mid = Some(local_id.clone());

        let local_doc = self.core.local_document()?;
        let offer_media = local_doc.media.get(slot.index).ok_or_else(|| {
            HandlerError::invariant(format!("local offer has no media section at index {}", slot.index))
        })?;

        rtp_parameters.rtcp.cname = Some(get_cname(offer_media));
        rtp_parameters.encodings = merge_encodings(encodings, || get_rtp_encodings(offer_media))?;
        if let Some(primary) = rtp_parameters.codecs.first() {
            apply_simulcast_scalability(&primary.mime_type, &mut rtp_parameters.encodings);
        }

        let change = self.core.remote_sdp.create_answer_section(
            offer_media,
            slot,
            rtp_parameters,
            remote_rtp_parameters,
            codec_options,
        )?;

        let answer = self.core.remote_sdp.serialize();
        debug!("calling set_remote_description() [answer]:\n{}", answer);
        if let Err(e) = self
            .core
            .engine
            .set_remote_description(SdpType::Answer, &answer)
            .await
        {
            self.core.remote_sdp.revert(change);
            return Err(e.into());
        }

        Ok(local_id)
    }

    /// Best-effort rollback of a transceiver whose negotiation failed
    fn deactivate(&self, transceiver: TransceiverId) {
        if let Err(e) = self
            .core
            .engine
            .set_direction(transceiver, Direction::Inactive)
        {
            warn!("Failed to deactivate {}: {}", transceiver, e);
        }
        if let Err(e) = self.core.engine.set_sender_track(transceiver, None) {
            warn!("Failed to clear the track of {}: {}", transceiver, e);
        }
    }

    /// Open a data channel towards the remote endpoint
    ///
    /// The first channel negotiates the SCTP association.
    pub async fn send_data_channel(
        &mut self,
        label: &str,
        init: DataChannelInit,
    ) -> Result<DataChannel> {
        debug!("send_data_channel() [label:{}]", label);
        let data_channel = self.core.open_data_channel(label, init)?;

        if !self.core.has_data_channel_section {
            self.negotiate_sctp_association().await?;
            self.core.has_data_channel_section = true;
        }

        info!(
            "Sending data channel {} on stream {}",
            label, data_channel.local_id
        );
        Ok(data_channel)
    }

    async fn negotiate_sctp_association(&mut self) -> Result<()> {
        let offer = self
            .core
            .engine
            .create_offer(OfferAnswerOptions::default())
            .await?;
        let offer_doc = parse_sdp(&offer)?;
        let offer_media = offer_doc
            .media
            .iter()
            .find(|media| media.kind == MediaKind::Application)
            .ok_or_else(|| {
                HandlerError::Engine(EngineError::OperationFailed(
                    "missing 'application' media section in local offer".to_string(),
                ))
            })?;

        if !self.core.is_transport_ready() {
            self.core.setup_transport(DtlsRole::Server, &offer_doc).await?;
        }

        debug!("calling set_local_description() [offer]:\n{}", offer);
        self.core
            .engine
            .set_local_description(SdpType::Offer, &offer)
            .await?;

        let change = self.core.remote_sdp.send_sctp_association(offer_media)?;
        let answer = self.core.remote_sdp.serialize();
        debug!("calling set_remote_description() [answer]:\n{}", answer);
        if let Err(e) = self
            .core
            .engine
            .set_remote_description(SdpType::Answer, &answer)
            .await
        {
            self.core.remote_sdp.revert(change);
            return Err(e.into());
        }
        Ok(())
    }

    /// Stop sending; the section is closed (or disabled if it anchors the bundle)
    pub async fn stop_sending(&mut self, local_id: &str) -> Result<()> {
        debug!("stop_sending() [local_id:{}]", local_id);
        let transceiver = self.core.require_transceiver(local_id)?;

        self.core.engine.set_sender_track(transceiver, None)?;
        self.core.engine.remove_sender(transceiver)?;

        let mid = self.core.transceiver_mid(transceiver)?;
        self.core.remote_sdp.close_section(&mid)?;
        self.core.mark_closed(local_id);

        let offer = self
            .core
            .engine
            .create_offer(OfferAnswerOptions::default())
            .await?;
        debug!("calling set_local_description() [offer]:\n{}", offer);
        self.core
            .engine
            .set_local_description(SdpType::Offer, &offer)
            .await?;

        let answer = self.core.remote_sdp.serialize();
        debug!("calling set_remote_description() [answer]:\n{}", answer);
        self.core
            .engine
            .set_remote_description(SdpType::Answer, &answer)
            .await?;

        info!("Stopped sending local id {}", local_id);
        Ok(())
    }

    /// Swap the sent track without renegotiating
    pub fn replace_track(&self, local_id: &str, track: Option<MediaTrack>) -> Result<()> {
        debug!(
            "replace_track() [local_id:{}, track:{}]",
            local_id,
            track.as_ref().map(|t| t.id.as_str()).unwrap_or("none")
        );
        let transceiver = self.core.require_transceiver(local_id)?;
        Ok(self
            .core
            .engine
            .set_sender_track(transceiver, track.as_ref())?)
    }

    /// Limit the active simulcast layers to the lowest `spatial_layer` ones
    pub fn set_max_spatial_layer(&self, local_id: &str, spatial_layer: u8) -> Result<()> {
        debug!(
            "set_max_spatial_layer() [local_id:{}, spatial_layer:{}]",
            local_id, spatial_layer
        );
        if spatial_layer == 0 || spatial_layer > MAX_SPATIAL_LAYERS {
            return Err(HandlerError::invalid_argument(format!(
                "spatial layer must be between 1 and {}, got {}",
                MAX_SPATIAL_LAYERS, spatial_layer
            )));
        }
        let transceiver = self.core.require_transceiver(local_id)?;

        let mut encodings = self.core.engine.sender_encodings(transceiver)?;
        apply_spatial_layer(&mut encodings, spatial_layer);
        Ok(self
            .core
            .engine
            .set_sender_encodings(transceiver, encodings)?)
    }

    pub async fn get_sender_stats(&self, local_id: &str) -> Result<serde_json::Value> {
        let transceiver = self.core.require_transceiver(local_id)?;
        Ok(self
            .core
            .engine
            .stats(StatsTarget::Sender(transceiver))
            .await?)
    }
}

#[async_trait]
impl Handler for SendHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    async fn restart_ice(&mut self, ice_parameters: IceParameters) -> Result<()> {
        debug!("restart_ice()");
        self.core.remote_sdp.update_ice_parameters(ice_parameters);
        if !self.core.is_transport_ready() {
            return Ok(());
        }

        let offer = self
            .core
            .engine
            .create_offer(OfferAnswerOptions { ice_restart: true })
            .await?;
        debug!("calling set_local_description() [offer]:\n{}", offer);
        self.core
            .engine
            .set_local_description(SdpType::Offer, &offer)
            .await?;

        let answer = self.core.remote_sdp.serialize();
        debug!("calling set_remote_description() [answer]:\n{}", answer);
        self.core
            .engine
            .set_remote_description(SdpType::Answer, &answer)
            .await?;
        Ok(())
    }
}
