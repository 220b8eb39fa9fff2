//! Media sections of a synthesized remote description
//!
//! A [`MediaSection`] is either the answer to a section the local engine
//! offered (everything this client sends, plus data channels it opens) or
//! an offer fabricated on behalf of the remote side (everything this client
//! receives). Both variants share the transport block (loopback connection,
//! ICE credentials and candidates) and differ in how they are built and in
//! how they react to DTLS role changes.

use tracing::trace;

use crate::error::{Error, Result};
use crate::parameters::{
    CodecOptions, CodecParameters, DtlsParameters, DtlsRole, IceCandidate, IceParameters, MediaKind,
    ParameterValue, RtpCodecParameters, RtpParameters, SctpParameters,
};
use crate::types::{
    Candidate, Connection, Direction, Extmap, Fmtp, MediaObject, Rid, RtcpFb, RtpMap, Setup,
    Simulcast, SsrcAttribute, SsrcGroup,
};
use crate::utils::format_fmtp_config;

/// Protocol of synthesized RTP sections
pub const RTP_PROTOCOL: &str = "UDP/TLS/RTP/SAVPF";
/// Protocol of synthesized data channel sections
pub const SCTP_PROTOCOL: &str = "UDP/DTLS/SCTP";
/// Format of synthesized data channel sections
pub const DATACHANNEL_FORMAT: &str = "webrtc-datachannel";

/// Placeholder port of open synthesized sections
const OPEN_PORT: u16 = 7;

/// Remote transport parameters shared by every section of a description
#[derive(Debug, Clone, Copy)]
pub struct SectionTransport<'a> {
    pub ice_parameters: &'a IceParameters,
    pub ice_candidates: &'a [IceCandidate],
    pub dtls_parameters: &'a DtlsParameters,
    pub sctp_parameters: Option<&'a SctpParameters>,
}

/// RTP inputs of an answer section
#[derive(Debug)]
pub struct AnswerRtp<'a> {
    /// Parameters of the locally offered stream; opus flags from the codec
    /// options are mirrored onto its codecs
    pub offer: &'a mut RtpParameters,
    /// Negotiated parameters the remote side will receive with
    pub answer: &'a RtpParameters,
    pub codec_options: Option<&'a CodecOptions>,
}

/// RTP inputs of an offer section
#[derive(Debug, Clone, Copy)]
pub struct OfferRtp<'a> {
    pub parameters: &'a RtpParameters,
    pub stream_id: &'a str,
    pub track_id: &'a str,
}

/// Lifecycle state of a section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionState {
    /// Carrying media or data
    Open,
    /// Fields stripped, port kept
    Disabled,
    /// Fields stripped, port zero; the slot may be reused
    Closed,
}

/// A media section of the synthesized remote description
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSection {
    /// Fabricated remote offer for media this client receives
    Offer(MediaObject),
    /// Remote answer to media this client offered
    Answer(MediaObject),
}

impl MediaSection {
    /// Build the answer to the engine's `offer_media` section
    pub fn answer(
        transport: &SectionTransport<'_>,
        offer_media: &MediaObject,
        rtp: Option<AnswerRtp<'_>>,
    ) -> Result<Self> {
        let mid = offer_media
            .mid
            .clone()
            .ok_or_else(|| Error::invalid_parameters("offered media section has no mid"))?;

        let mut media = transport_block(offer_media.kind, &offer_media.protocol, transport);
        media.mid = Some(mid);
        media.setup = Some(Setup::from_role(transport.dtls_parameters.role));

        match offer_media.kind {
            MediaKind::Audio | MediaKind::Video => {
                let rtp = rtp.ok_or_else(|| {
                    Error::invalid_parameters("RTP parameters are required for audio/video answers")
                })?;
                fill_answer_rtp(&mut media, offer_media, rtp);
            }
            MediaKind::Application => {
                let sctp = transport.sctp_parameters.ok_or(Error::MissingSctpParameters)?;
                fill_sctp(&mut media, sctp);
            }
        }

        Ok(Self::Answer(media))
    }

    /// Build a remote offer for media the local engine will receive
    pub fn offer(
        transport: &SectionTransport<'_>,
        mid: &str,
        kind: MediaKind,
        rtp: Option<OfferRtp<'_>>,
    ) -> Result<Self> {
        let protocol = if kind.is_rtp() {
            RTP_PROTOCOL
        } else {
            SCTP_PROTOCOL
        };

        let mut media = transport_block(kind, protocol, transport);
        media.mid = Some(mid.to_string());
        // An offer never commits to a DTLS role
        media.setup = Some(Setup::Actpass);

        match kind {
            MediaKind::Audio | MediaKind::Video => {
                let rtp = rtp.ok_or_else(|| {
                    Error::invalid_parameters("RTP parameters are required for audio/video offers")
                })?;
                fill_offer_rtp(&mut media, rtp)?;
            }
            MediaKind::Application => {
                let sctp = transport.sctp_parameters.ok_or(Error::MissingSctpParameters)?;
                fill_sctp(&mut media, sctp);
            }
        }

        Ok(Self::Offer(media))
    }

    pub fn media(&self) -> &MediaObject {
        match self {
            Self::Offer(media) | Self::Answer(media) => media,
        }
    }

    fn media_mut(&mut self) -> &mut MediaObject {
        match self {
            Self::Offer(media) | Self::Answer(media) => media,
        }
    }

    pub fn mid(&self) -> &str {
        self.media().mid.as_deref().unwrap_or_default()
    }

    pub fn kind(&self) -> MediaKind {
        self.media().kind
    }

    pub fn is_closed(&self) -> bool {
        self.media().port == 0
    }

    pub fn state(&self) -> SectionState {
        let media = self.media();
        if media.port == 0 {
            SectionState::Closed
        } else if media.direction == Some(Direction::Inactive) {
            SectionState::Disabled
        } else {
            SectionState::Open
        }
    }

    pub fn set_ice_parameters(&mut self, ice_parameters: &IceParameters) {
        let media = self.media_mut();
        media.ice_ufrag = Some(ice_parameters.username_fragment.clone());
        media.ice_pwd = Some(ice_parameters.password.clone());
    }

    /// Patch the announced DTLS role; offers always stay `actpass`
    pub fn set_dtls_role(&mut self, role: DtlsRole) {
        match self {
            Self::Offer(media) => media.setup = Some(Setup::Actpass),
            Self::Answer(media) => media.setup = Some(Setup::from_role(role)),
        }
    }

    /// Stop media flow but keep the transport of the section alive
    pub fn disable(&mut self) {
        trace!("Disabling media section {}", self.mid());
        strip_media_fields(self.media_mut());
    }

    /// Stop media flow and release the section slot
    pub fn close(&mut self) {
        trace!("Closing media section {}", self.mid());
        let media = self.media_mut();
        strip_media_fields(media);
        media.port = 0;
        media.extmap_allow_mixed = false;
    }
}

fn strip_media_fields(media: &mut MediaObject) {
    media.direction = Some(Direction::Inactive);
    media.ext.clear();
    media.ssrcs.clear();
    media.ssrc_groups.clear();
    media.simulcast = None;
    media.rids.clear();
}

fn transport_block(kind: MediaKind, protocol: &str, transport: &SectionTransport<'_>) -> MediaObject {
    let mut media = MediaObject::new(kind, OPEN_PORT, protocol);
    media.connection = Some(Connection::loopback());
    media.ice_ufrag = Some(transport.ice_parameters.username_fragment.clone());
    media.ice_pwd = Some(transport.ice_parameters.password.clone());
    media.ice_options = Some("renomination".to_string());

    // RTCP is always muxed so every candidate is an RTP (component 1) candidate
    media.candidates = transport
        .ice_candidates
        .iter()
        .map(|candidate| Candidate {
            foundation: candidate.foundation.clone(),
            component: 1,
            transport: candidate.protocol.to_string(),
            priority: u64::from(candidate.priority),
            ip: candidate.ip.clone(),
            port: candidate.port,
            candidate_type: candidate.candidate_type.to_string(),
            rel_addr: None,
            rel_port: None,
            tcp_type: candidate.tcp_type.map(|tcp_type| tcp_type.to_string()),
            extensions: Vec::new(),
        })
        .collect();
    media.end_of_candidates = true;

    media
}

fn fill_sctp(media: &mut MediaObject, sctp: &SctpParameters) {
    media.payloads = DATACHANNEL_FORMAT.to_string();
    media.sctp_port = Some(sctp.port);
    media.max_message_size = Some(sctp.max_message_size);
}

fn rtp_map(codec: &RtpCodecParameters) -> RtpMap {
    RtpMap {
        payload: codec.payload_type,
        codec: codec.codec_name().to_string(),
        rate: codec.clock_rate,
        encoding: codec.channels.filter(|channels| *channels > 1),
    }
}

fn push_codec_lines(media: &mut MediaObject, codec: &RtpCodecParameters, parameters: &CodecParameters) {
    media.rtp.push(rtp_map(codec));

    let config = format_fmtp_config(parameters);
    if !config.is_empty() {
        media.fmtp.push(Fmtp {
            payload: codec.payload_type,
            config,
        });
    }

    for fb in &codec.rtcp_feedback {
        media.rtcp_fb.push(RtcpFb {
            payload: codec.payload_type.to_string(),
            feedback_type: fb.feedback_type.clone(),
            subtype: Some(fb.parameter.clone()),
        });
    }
}

fn payload_list(codecs: &[RtpCodecParameters]) -> String {
    codecs
        .iter()
        .map(|codec| codec.payload_type.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn flag(value: bool) -> ParameterValue {
    ParameterValue::Int(i64::from(value))
}

/// Fold codec options into an answer codec's parameters, mirroring the
/// opus flags onto the matching offer codec
fn apply_codec_options(
    codec: &RtpCodecParameters,
    parameters: &mut CodecParameters,
    offer: &mut RtpParameters,
    options: &CodecOptions,
) {
    let mut offer_codec = offer
        .codecs
        .iter_mut()
        .find(|offer_codec| offer_codec.payload_type == codec.payload_type);

    match codec.mime_type_lower().as_str() {
        "audio/opus" => {
            let mut mirror = |key: &str, value: bool| {
                if let Some(offer_codec) = offer_codec.as_deref_mut() {
                    offer_codec.parameters.insert(key.to_string(), flag(value));
                }
            };

            if let Some(stereo) = options.opus_stereo {
                mirror("sprop-stereo", stereo);
                parameters.insert("stereo".to_string(), flag(stereo));
            }
            if let Some(fec) = options.opus_fec {
                mirror("useinbandfec", fec);
                parameters.insert("useinbandfec".to_string(), flag(fec));
            }
            if let Some(dtx) = options.opus_dtx {
                mirror("usedtx", dtx);
                parameters.insert("usedtx".to_string(), flag(dtx));
            }
            if let Some(rate) = options.opus_max_playback_rate {
                parameters.insert("maxplaybackrate".to_string(), rate.into());
            }
            if let Some(ptime) = options.opus_ptime {
                parameters.insert("ptime".to_string(), ptime.into());
            }
        }
        "video/vp8" | "video/vp9" | "video/h264" | "video/h265" => {
            if let Some(bitrate) = options.video_google_start_bitrate {
                parameters.insert("x-google-start-bitrate".to_string(), bitrate.into());
            }
            if let Some(bitrate) = options.video_google_max_bitrate {
                parameters.insert("x-google-max-bitrate".to_string(), bitrate.into());
            }
            if let Some(bitrate) = options.video_google_min_bitrate {
                parameters.insert("x-google-min-bitrate".to_string(), bitrate.into());
            }
        }
        _ => {}
    }
}

fn fill_answer_rtp(media: &mut MediaObject, offer_media: &MediaObject, rtp: AnswerRtp<'_>) {
    media.direction = Some(Direction::RecvOnly);

    let options = rtp.codec_options.filter(|options| !options.is_empty());
    for codec in &rtp.answer.codecs {
        let mut parameters = codec.parameters.clone();
        if let Some(options) = options {
            apply_codec_options(codec, &mut parameters, rtp.offer, options);
        }
        push_codec_lines(media, codec, &parameters);
    }
    media.payloads = payload_list(&rtp.answer.codecs);

    // Extensions the engine did not offer are never answered
    media.ext = rtp
        .answer
        .header_extensions
        .iter()
        .filter(|ext| offer_media.ext.iter().any(|offered| offered.uri == ext.uri))
        .map(|ext| Extmap {
            value: ext.id,
            direction: None,
            uri: ext.uri.clone(),
            config: None,
        })
        .collect();
    media.extmap_allow_mixed = offer_media.extmap_allow_mixed;

    if let Some(simulcast) = &offer_media.simulcast {
        media.simulcast = Some(Simulcast {
            dir1: "recv".to_string(),
            list1: simulcast.list1.clone(),
            dir2: None,
            list2: None,
        });
        media.rids = offer_media
            .rids
            .iter()
            .filter(|rid| rid.direction == "send")
            .map(|rid| Rid {
                id: rid.id.clone(),
                direction: "recv".to_string(),
                params: None,
            })
            .collect();
    }

    media.rtcp_mux = true;
    media.rtcp_rsize = true;
}

fn fill_offer_rtp(media: &mut MediaObject, rtp: OfferRtp<'_>) -> Result<()> {
    let parameters = rtp.parameters;
    media.direction = Some(Direction::SendOnly);

    for codec in &parameters.codecs {
        push_codec_lines(media, codec, &codec.parameters);
    }
    media.payloads = payload_list(&parameters.codecs);

    media.ext = parameters
        .header_extensions
        .iter()
        .map(|ext| Extmap {
            value: ext.id,
            direction: None,
            uri: ext.uri.clone(),
            config: None,
        })
        .collect();

    media.rtcp_mux = true;
    media.rtcp_rsize = true;

    let encoding = parameters
        .encodings
        .first()
        .ok_or_else(|| Error::invalid_parameters("RTP parameters have no encodings"))?;
    let ssrc = encoding
        .ssrc
        .ok_or_else(|| Error::invalid_parameters("first encoding has no ssrc"))?;
    let rtx_ssrc = encoding.rtx.map(|rtx| rtx.ssrc).filter(|ssrc| *ssrc != 0);

    if let Some(cname) = &parameters.rtcp.cname {
        let msid = format!("{} {}", rtp.stream_id, rtp.track_id);
        let mut describe = |id: u32| {
            media.ssrcs.push(SsrcAttribute {
                id,
                attribute: "cname".to_string(),
                value: Some(cname.clone()),
            });
            media.ssrcs.push(SsrcAttribute {
                id,
                attribute: "msid".to_string(),
                value: Some(msid.clone()),
            });
        };

        describe(ssrc);
        if let Some(rtx_ssrc) = rtx_ssrc {
            describe(rtx_ssrc);
            media.ssrc_groups.push(SsrcGroup {
                semantics: "FID".to_string(),
                ssrcs: vec![ssrc, rtx_ssrc],
            });
        }
    }

    Ok(())
}
