//! Local description inspection
//!
//! Helpers that read back what the transport engine put into its own
//! descriptions: capabilities, DTLS parameters, the RTCP CNAME and the
//! SSRC layout of a sent stream. Also home to the fmtp parameter
//! (de)serialization shared with the section builders.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{Error, Result};
use crate::parameters::{
    CodecParameters, DtlsFingerprint, DtlsParameters, DtlsRole, MediaKind, ParameterValue,
    RtcpFeedback, RtpCapabilities, RtpCodecCapability, RtpEncodingParameters, RtpHeaderExtension,
    RtpParameters, RtxParameters,
};
use crate::types::{Fmtp, MediaObject, SessionDescription};

/// Parse an fmtp config (`k=v;k=v`) into a parameter bag
pub fn parse_fmtp_config(config: &str) -> CodecParameters {
    config
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.trim().to_string(), ParameterValue::parse(value.trim())),
            None => (entry.to_string(), ParameterValue::Str(String::new())),
        })
        .collect()
}

/// Format a parameter bag as an fmtp config (`k=v;k=v`)
pub fn format_fmtp_config(parameters: &CodecParameters) -> String {
    parameters
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(";")
}

/// Extract the RTP capabilities announced in a local offer
pub fn extract_rtp_capabilities(doc: &SessionDescription) -> RtpCapabilities {
    let mut codecs: Vec<RtpCodecCapability> = Vec::new();
    let mut header_extensions: Vec<RtpHeaderExtension> = Vec::new();

    for media in doc.media.iter().filter(|media| media.kind.is_rtp()) {
        let kind = media.kind;
        let first_new = codecs.len();

        for rtp in &media.rtp {
            // First occurrence of a payload type wins
            if codecs
                .iter()
                .any(|codec| codec.preferred_payload_type == Some(rtp.payload))
            {
                continue;
            }

            codecs.push(RtpCodecCapability {
                kind,
                mime_type: format!("{}/{}", kind, rtp.codec),
                preferred_payload_type: Some(rtp.payload),
                clock_rate: rtp.rate,
                channels: match kind {
                    MediaKind::Audio => Some(rtp.encoding.unwrap_or(1)),
                    _ => None,
                },
                parameters: CodecParameters::new(),
                rtcp_feedback: Vec::new(),
            });
        }

        let added = &mut codecs[first_new..];

        for fmtp in &media.fmtp {
            if let Some(codec) = added
                .iter_mut()
                .find(|codec| codec.preferred_payload_type == Some(fmtp.payload))
            {
                codec.parameters = parse_fmtp_config(&fmtp.config);
            }
        }

        for fb in &media.rtcp_fb {
            let Ok(payload) = fb.payload.parse::<u8>() else {
                continue;
            };
            if let Some(codec) = added
                .iter_mut()
                .find(|codec| codec.preferred_payload_type == Some(payload))
            {
                codec.rtcp_feedback.push(RtcpFeedback {
                    feedback_type: fb.feedback_type.clone(),
                    parameter: fb.subtype.clone().unwrap_or_default(),
                });
            }
        }

        for ext in &media.ext {
            if header_extensions
                .iter()
                .any(|known| known.kind == kind && known.uri == ext.uri)
            {
                continue;
            }
            header_extensions.push(RtpHeaderExtension {
                kind,
                uri: ext.uri.clone(),
                preferred_id: ext.value,
                preferred_encrypt: false,
            });
        }
    }

    RtpCapabilities {
        codecs,
        header_extensions,
    }
}

/// Extract the local DTLS parameters from a local description
pub fn extract_dtls_parameters(doc: &SessionDescription) -> Result<DtlsParameters> {
    let media = doc
        .media
        .iter()
        .find(|media| media.ice_ufrag.is_some() && media.port != 0)
        .ok_or_else(|| Error::invalid_parameters("no active media section found"))?;

    let fingerprint = media
        .fingerprint
        .as_ref()
        .or(doc.fingerprint.as_ref())
        .ok_or_else(|| Error::invalid_parameters("no fingerprint found"))?;

    let role = media.setup.map(|setup| setup.to_role()).unwrap_or(DtlsRole::Auto);

    Ok(DtlsParameters {
        role,
        fingerprints: vec![DtlsFingerprint {
            algorithm: fingerprint.hash_type.clone(),
            value: fingerprint.hash.clone(),
        }],
    })
}

/// The RTCP CNAME announced by a media section, or an empty string
pub fn get_cname(media: &MediaObject) -> String {
    media
        .ssrcs
        .iter()
        .find(|ssrc| ssrc.attribute == "cname")
        .and_then(|ssrc| ssrc.value.clone())
        .unwrap_or_default()
}

/// Encodings (SSRC plus optional RTX SSRC) of a sending media section
pub fn get_rtp_encodings(media: &MediaObject) -> Result<Vec<RtpEncodingParameters>> {
    let mut ssrcs: Vec<u32> = Vec::new();
    for ssrc in &media.ssrcs {
        if !ssrcs.contains(&ssrc.id) {
            ssrcs.push(ssrc.id);
        }
    }

    if ssrcs.is_empty() {
        return Err(Error::invalid_parameters("no a=ssrc lines found"));
    }

    let mut rtx_by_primary: HashMap<u32, u32> = HashMap::new();
    for group in media.ssrc_groups.iter().filter(|group| group.semantics == "FID") {
        if let [primary, rtx] = group.ssrcs[..] {
            if ssrcs.contains(&primary) {
                rtx_by_primary.insert(primary, rtx);
            }
        }
    }
    let rtx_ssrcs: HashSet<u32> = rtx_by_primary.values().copied().collect();

    let encodings = ssrcs
        .into_iter()
        .filter(|ssrc| !rtx_ssrcs.contains(ssrc))
        .map(|ssrc| RtpEncodingParameters {
            ssrc: Some(ssrc),
            rtx: rtx_by_primary.get(&ssrc).map(|rtx| RtxParameters { ssrc: *rtx }),
            ..Default::default()
        })
        .collect();

    Ok(encodings)
}

/// Make the local answer ask for stereo opus exactly when the remote offer
/// announced it
pub fn apply_codec_parameters(offer_parameters: &RtpParameters, answer_media: &mut MediaObject) {
    for codec in &offer_parameters.codecs {
        if codec.mime_type_lower() != "audio/opus" {
            continue;
        }
        if !answer_media
            .rtp
            .iter()
            .any(|rtp| rtp.payload == codec.payload_type)
        {
            continue;
        }
        let Some(sprop_stereo) = codec.parameters.get("sprop-stereo") else {
            continue;
        };

        let stereo = i64::from(sprop_stereo.as_int().unwrap_or(0) == 1);

        let index = match answer_media
            .fmtp
            .iter()
            .position(|fmtp| fmtp.payload == codec.payload_type)
        {
            Some(index) => index,
            None => {
                answer_media.fmtp.push(Fmtp {
                    payload: codec.payload_type,
                    config: String::new(),
                });
                answer_media.fmtp.len() - 1
            }
        };

        let fmtp = &mut answer_media.fmtp[index];
        let mut parameters = parse_fmtp_config(&fmtp.config);
        parameters.insert("stereo".to_string(), ParameterValue::Int(stereo));
        fmtp.config = format_fmtp_config(&parameters);

        debug!("Answer opus payload {} fmtp set to {}", codec.payload_type, fmtp.config);
    }
}
