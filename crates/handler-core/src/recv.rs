//! Receive-side negotiation
//!
//! The synthesized remote description is the offerer: each new consumer adds
//! an offer section, the engine answers, and the answer is committed locally.

use std::sync::Arc;

use async_trait::async_trait;
use rtcbridge_sdp_core::utils::apply_codec_parameters;
use rtcbridge_sdp_core::{
    parse_sdp, write_sdp, DtlsRole, IceParameters, MediaKind, RtpParameters,
};
use tracing::{debug, info, warn};

use crate::config::HandlerConfig;
use crate::engine::{
    DataChannelInit, MediaTrack, OfferAnswerOptions, SdpType, StatsTarget, TransceiverId,
    TransportEngine,
};
use crate::error::{HandlerError, Result};
use crate::handler::{DataChannel, Handler, HandlerCore, TransportParameters};
use crate::listener::HandlerListener;

/// Outcome of a successful receive
#[derive(Debug, Clone, PartialEq)]
pub struct RecvResult {
    pub local_id: String,
    pub transceiver: TransceiverId,
    pub track: MediaTrack,
}

/// Negotiates incoming tracks and data channels
pub struct RecvHandler {
    core: HandlerCore,
}

impl RecvHandler {
    pub fn new(
        engine: Arc<dyn TransportEngine>,
        listener: Arc<dyn HandlerListener>,
        transport: TransportParameters,
        config: HandlerConfig,
    ) -> Result<Self> {
        Ok(Self {
            core: HandlerCore::new(engine, listener, transport, config)?,
        })
    }

    /// Start receiving a track the remote endpoint sends
    ///
    /// The local id is the mid of `rtp_parameters` when given, otherwise the
    /// number of tracks received so far.
    pub async fn receive(
        &mut self,
        track_id: &str,
        kind: MediaKind,
        rtp_parameters: &RtpParameters,
    ) -> Result<RecvResult> {
        debug!("receive() [track_id:{}, kind:{}]", track_id, kind);
        if !kind.is_rtp() {
            return Err(HandlerError::invalid_argument(format!(
                "cannot receive a track of kind {}",
                kind
            )));
        }

        let local_id = match rtp_parameters.non_empty_mid() {
            Some(mid) => mid.to_string(),
            None => self.core.association_count().to_string(),
        };
        if self.core.is_open(&local_id) {
            return Err(HandlerError::invalid_state(format!(
                "local id {} is already receiving",
                local_id
            )));
        }

        let cname = rtp_parameters.rtcp.cname.clone().unwrap_or_default();
        let change = self.core.remote_sdp.create_offer_section(
            &local_id,
            kind,
            rtp_parameters,
            &cname,
            track_id,
        )?;

        match self.negotiate_receive(&local_id, rtp_parameters).await {
            Ok((transceiver, track)) => {
                self.core.associate(&local_id, transceiver);
                info!("Receiving {} track {} as local id {}", kind, track_id, local_id);
                Ok(RecvResult {
                    local_id,
                    transceiver,
                    track,
                })
            }
            Err(e) => {
                warn!("receive() failed, restoring section slot: {}", e);
                self.core.remote_sdp.revert(change);
                Err(e)
            }
        }
    }

    async fn negotiate_receive(
        &mut self,
        local_id: &str,
        rtp_parameters: &RtpParameters,
    ) -> Result<(TransceiverId, MediaTrack)> {
        let offer = self.core.remote_sdp.serialize();
        debug!("calling set_remote_description() [offer]:\n{}", offer);
        self.core
            .engine
            .set_remote_description(SdpType::Offer, &offer)
            .await?;

        let answer = self
            .core
            .engine
            .create_answer(OfferAnswerOptions::default())
            .await?;
        let mut answer_doc = parse_sdp(&answer)?;
        let answer_media = answer_doc.media_by_mid_mut(local_id).ok_or_else(|| {
            HandlerError::invariant(format!("local answer has no media section for mid {}", local_id))
        })?;
        apply_codec_parameters(rtp_parameters, answer_media);
        let answer = write_sdp(&answer_doc);

        if !self.core.is_transport_ready() {
            self.core.setup_transport(DtlsRole::Client, &answer_doc).await?;
        }

        debug!("calling set_local_description() [answer]:\n{}", answer);
        self.core
            .engine
            .set_local_description(SdpType::Answer, &answer)
            .await?;

        // A reused mid may still name a stopped transceiver; the newest wins.
        let transceiver = self
            .core
            .engine
            .transceivers()
            .into_iter()
            .rev()
            .find(|id| self.core.engine.transceiver_mid(*id).as_deref() == Some(local_id))
            .ok_or_else(|| {
                HandlerError::invariant(format!("new transceiver not found for mid {}", local_id))
            })?;
        let track = self.core.engine.receiver_track(transceiver)?;

        Ok((transceiver, track))
    }

    /// Accept a data channel the remote endpoint opened
    ///
    /// The first channel offers the SCTP association.
    pub async fn receive_data_channel(
        &mut self,
        label: &str,
        init: DataChannelInit,
    ) -> Result<DataChannel> {
        debug!("receive_data_channel() [label:{}]", label);
        let data_channel = self.core.open_data_channel(label, init)?;

        if !self.core.has_data_channel_section {
            let change = self.core.remote_sdp.recv_sctp_association()?;
            if let Err(e) = self.negotiate_offer().await {
                warn!("SCTP association failed, restoring section slot: {}", e);
                self.core.remote_sdp.revert(change);
                return Err(e);
            }
            self.core.has_data_channel_section = true;
        }

        info!(
            "Receiving data channel {} on stream {}",
            label, data_channel.local_id
        );
        Ok(data_channel)
    }

    /// Push the current remote offer and commit the engine's answer
    async fn negotiate_offer(&mut self) -> Result<()> {
        let offer = self.core.remote_sdp.serialize();
        debug!("calling set_remote_description() [offer]:\n{}", offer);
        self.core
            .engine
            .set_remote_description(SdpType::Offer, &offer)
            .await?;

        let answer = self
            .core
            .engine
            .create_answer(OfferAnswerOptions::default())
            .await?;

        if !self.core.is_transport_ready() {
            let answer_doc = parse_sdp(&answer)?;
            self.core.setup_transport(DtlsRole::Client, &answer_doc).await?;
        }

        debug!("calling set_local_description() [answer]:\n{}", answer);
        self.core
            .engine
            .set_local_description(SdpType::Answer, &answer)
            .await?;
        Ok(())
    }

    /// Stop receiving; the section is closed (or disabled if it anchors the bundle)
    pub async fn stop_receiving(&mut self, local_id: &str) -> Result<()> {
        debug!("stop_receiving() [local_id:{}]", local_id);
        let transceiver = self.core.require_transceiver(local_id)?;

        let mid = self.core.transceiver_mid(transceiver)?;
        self.core.remote_sdp.close_section(&mid)?;
        self.core.mark_closed(local_id);

        self.negotiate_offer().await?;
        info!("Stopped receiving local id {}", local_id);
        Ok(())
    }

    pub async fn get_receiver_stats(&self, local_id: &str) -> Result<serde_json::Value> {
        let transceiver = self.core.require_transceiver(local_id)?;
        Ok(self
            .core
            .engine
            .stats(StatsTarget::Receiver(transceiver))
            .await?)
    }
}

#[async_trait]
impl Handler for RecvHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    async fn restart_ice(&mut self, ice_parameters: IceParameters) -> Result<()> {
        debug!("restart_ice()");
        self.core.remote_sdp.update_ice_parameters(ice_parameters);
        if !self.core.is_transport_ready() {
            return Ok(());
        }
        self.negotiate_offer().await
    }
}
