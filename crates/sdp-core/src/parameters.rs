//! Transport and RTP parameter payloads
//!
//! These are the structured records exchanged with the signaling layer in
//! place of real session descriptions: the remote ICE/DTLS/SCTP parameters
//! that the synthesized description is built from, and the RTP parameter and
//! capability sets that describe what is sent or received.
//!
//! All types serialize to camelCase JSON so they can be forwarded to and
//! from the signaling channel unchanged.
//!
//! ```rust
//! use rtcbridge_sdp_core::parameters::RtpParameters;
//!
//! let params: RtpParameters = serde_json::from_str(r#"{
//!     "codecs": [{ "mimeType": "audio/opus", "payloadType": 111, "clockRate": 48000, "channels": 2 }],
//!     "encodings": [{ "ssrc": 1111 }],
//!     "rtcp": { "cname": "abc" }
//! }"#).unwrap();
//!
//! assert_eq!(params.codecs[0].payload_type, 111);
//! assert_eq!(params.rtcp.cname.as_deref(), Some("abc"));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of a media section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio RTP media
    Audio,
    /// Video RTP media
    Video,
    /// SCTP data channels
    Application,
}

impl MediaKind {
    /// Whether this kind carries RTP
    pub fn is_rtp(self) -> bool {
        matches!(self, Self::Audio | Self::Video)
    }

    /// The m= line token for this kind
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Application => "application",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "application" => Ok(Self::Application),
            other => Err(Error::parsing(format!("Unsupported media type: {}", other))),
        }
    }
}

/// Remote ICE parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceParameters {
    /// ICE username fragment
    pub username_fragment: String,
    /// ICE password
    pub password: String,
    /// Whether the remote endpoint is an ICE-lite implementation
    #[serde(default)]
    pub ice_lite: bool,
}

/// Transport protocol of an ICE candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceProtocol {
    Udp,
    Tcp,
}

impl fmt::Display for IceProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => f.write_str("udp"),
            Self::Tcp => f.write_str("tcp"),
        }
    }
}

/// ICE candidate type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceCandidateType {
    Host,
    Srflx,
    Prflx,
    Relay,
}

impl fmt::Display for IceCandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Srflx => f.write_str("srflx"),
            Self::Prflx => f.write_str("prflx"),
            Self::Relay => f.write_str("relay"),
        }
    }
}

/// TCP candidate type (RFC 6544)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceTcpType {
    Active,
    Passive,
    So,
}

impl fmt::Display for IceTcpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Passive => f.write_str("passive"),
            Self::So => f.write_str("so"),
        }
    }
}

/// Remote ICE candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub foundation: String,
    pub priority: u32,
    pub ip: String,
    pub protocol: IceProtocol,
    pub port: u16,
    #[serde(rename = "type")]
    pub candidate_type: IceCandidateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_type: Option<IceTcpType>,
}

/// DTLS role of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtlsRole {
    /// Role not decided yet
    #[default]
    Auto,
    /// Initiates the DTLS handshake
    Client,
    /// Waits for the DTLS handshake
    Server,
}

impl DtlsRole {
    /// The role the other side takes when this side has `self`
    pub fn opposite(self) -> Self {
        match self {
            Self::Client => Self::Server,
            Self::Server => Self::Client,
            Self::Auto => Self::Auto,
        }
    }
}

impl fmt::Display for DtlsRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Client => f.write_str("client"),
            Self::Server => f.write_str("server"),
        }
    }
}

/// Certificate fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtlsFingerprint {
    /// Hash function name, e.g. `sha-256`
    pub algorithm: String,
    /// Colon separated upper-case hex digest
    pub value: String,
}

/// DTLS parameters of an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtlsParameters {
    #[serde(default)]
    pub role: DtlsRole,
    pub fingerprints: Vec<DtlsFingerprint>,
}

/// Remote SCTP association parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SctpParameters {
    /// SCTP port (always 5000 for WebRTC)
    pub port: u16,
    /// Number of outgoing streams
    #[serde(rename = "OS")]
    pub os: u16,
    /// Maximum number of incoming streams
    #[serde(rename = "MIS")]
    pub mis: u16,
    /// Largest message the remote accepts
    pub max_message_size: u64,
}

/// Number of SCTP streams announced to the remote endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumSctpStreams {
    #[serde(rename = "OS")]
    pub os: u16,
    #[serde(rename = "MIS")]
    pub mis: u16,
}

/// Local SCTP capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SctpCapabilities {
    pub num_streams: NumSctpStreams,
}

/// Parameters of a single SCTP stream backing a data channel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SctpStreamParameters {
    pub stream_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordered: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_packet_life_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retransmits: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

impl SctpStreamParameters {
    /// Validate the parameters and fill missing fields with defaults
    ///
    /// Reliability is either ordered, lifetime-limited or
    /// retransmit-limited; mixing them is rejected.
    pub fn validate(&mut self) -> Result<()> {
        let partial_reliability =
            self.max_packet_life_time.is_some() || self.max_retransmits.is_some();

        if self.max_packet_life_time.is_some() && self.max_retransmits.is_some() {
            return Err(Error::invalid_parameters(
                "cannot provide both maxPacketLifeTime and maxRetransmits",
            ));
        }

        match self.ordered {
            Some(true) if partial_reliability => {
                return Err(Error::invalid_parameters(
                    "cannot be ordered with maxPacketLifeTime or maxRetransmits",
                ));
            }
            Some(_) => {}
            None => self.ordered = Some(!partial_reliability),
        }

        if self.label.is_none() {
            self.label = Some(String::new());
        }
        if self.protocol.is_none() {
            self.protocol = Some(String::new());
        }

        Ok(())
    }
}

/// A codec-specific parameter value (`a=fmtp` entry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParameterValue {
    /// Parse an fmtp value the way description text encodes it
    pub fn parse(raw: &str) -> Self {
        if let Ok(value) = raw.parse::<i64>() {
            Self::Int(value)
        } else if let Ok(value) = raw.parse::<f64>() {
            Self::Float(value)
        } else {
            Self::Str(raw.to_string())
        }
    }

    /// Integer view of the value, if it has one
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Float(value) => Some(*value as i64),
            Self::Str(value) => value.parse().ok(),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::Float(value) => write!(f, "{}", value),
            Self::Str(value) => f.write_str(value),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ParameterValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// Ordered codec parameter bag
pub type CodecParameters = BTreeMap<String, ParameterValue>;

/// RTCP feedback mechanism supported by a codec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcpFeedback {
    #[serde(rename = "type")]
    pub feedback_type: String,
    #[serde(default)]
    pub parameter: String,
}

/// A codec in an RTP parameter set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecParameters {
    /// `kind/name`, e.g. `video/VP8`
    pub mime_type: String,
    pub payload_type: u8,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    #[serde(default)]
    pub parameters: CodecParameters,
    #[serde(default)]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

impl RtpCodecParameters {
    /// Codec name without the `audio/` or `video/` prefix
    pub fn codec_name(&self) -> &str {
        codec_name_from_mime(&self.mime_type)
    }

    /// Lower-cased mime type, used for codec-family comparisons
    pub fn mime_type_lower(&self) -> String {
        self.mime_type.to_ascii_lowercase()
    }
}

/// Strip a case-insensitive `audio/` or `video/` prefix
pub(crate) fn codec_name_from_mime(mime_type: &str) -> &str {
    match mime_type.split_once('/') {
        Some((kind, name))
            if kind.eq_ignore_ascii_case("audio") || kind.eq_ignore_ascii_case("video") =>
        {
            name
        }
        _ => mime_type,
    }
}

/// A negotiated RTP header extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtensionParameters {
    pub uri: String,
    pub id: u16,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default)]
    pub parameters: CodecParameters,
}

/// Retransmission stream of an encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtxParameters {
    pub ssrc: u32,
}

/// Relative network priority of an encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkPriority {
    VeryLow,
    #[default]
    Low,
    Medium,
    High,
}

/// One encoding (simulcast layer or single stream) of an RTP parameter set
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpEncodingParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssrc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec_payload_type: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtx: Option<RtxParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtx: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalability_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_framerate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_resolution_down_by: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_priority: Option<NetworkPriority>,
}

/// RTCP parameters of an RTP parameter set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcpParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
    #[serde(default = "default_true")]
    pub reduced_size: bool,
    #[serde(default = "default_true")]
    pub mux: bool,
}

impl Default for RtcpParameters {
    fn default() -> Self {
        Self {
            cname: None,
            reduced_size: true,
            mux: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Full RTP parameter set for one sent or received stream
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    pub codecs: Vec<RtpCodecParameters>,
    #[serde(default)]
    pub header_extensions: Vec<RtpHeaderExtensionParameters>,
    #[serde(default)]
    pub encodings: Vec<RtpEncodingParameters>,
    #[serde(default)]
    pub rtcp: RtcpParameters,
}

impl RtpParameters {
    /// The mid, if one was given and it is not empty
    pub fn non_empty_mid(&self) -> Option<&str> {
        self.mid.as_deref().filter(|mid| !mid.is_empty())
    }
}

/// A codec the local endpoint is able to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecCapability {
    pub kind: MediaKind,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_payload_type: Option<u8>,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    #[serde(default)]
    pub parameters: CodecParameters,
    #[serde(default)]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

/// A header extension the local endpoint is able to use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtension {
    pub kind: MediaKind,
    pub uri: String,
    pub preferred_id: u16,
    #[serde(default)]
    pub preferred_encrypt: bool,
}

/// RTP capabilities of the local endpoint
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCapabilities {
    pub codecs: Vec<RtpCodecCapability>,
    pub header_extensions: Vec<RtpHeaderExtension>,
}

/// Per-producer codec tuning folded into the synthesized answer
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodecOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_stereo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_fec: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_dtx: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_max_playback_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_ptime: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_google_start_bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_google_max_bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_google_min_bitrate: Option<u32>,
}

impl CodecOptions {
    /// Whether no option is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sctp_stream_parameters_defaults() {
        let mut params = SctpStreamParameters {
            stream_id: 3,
            ..Default::default()
        };
        params.validate().unwrap();

        assert_eq!(params.ordered, Some(true), "ordered should default to true");
        assert_eq!(params.label.as_deref(), Some(""));
        assert_eq!(params.protocol.as_deref(), Some(""));
    }

    #[test]
    fn test_sctp_stream_parameters_partial_reliability_unordered() {
        let mut params = SctpStreamParameters {
            stream_id: 1,
            max_retransmits: Some(3),
            ..Default::default()
        };
        params.validate().unwrap();

        assert_eq!(params.ordered, Some(false), "retransmit-limited streams are unordered");
    }

    #[test]
    fn test_sctp_stream_parameters_rejects_conflicts() {
        let mut both = SctpStreamParameters {
            stream_id: 1,
            max_retransmits: Some(3),
            max_packet_life_time: Some(100),
            ..Default::default()
        };
        assert!(both.validate().is_err(), "both limits must be rejected");

        let mut ordered = SctpStreamParameters {
            stream_id: 1,
            ordered: Some(true),
            max_packet_life_time: Some(100),
            ..Default::default()
        };
        assert!(ordered.validate().is_err(), "ordered with a limit must be rejected");
    }

    #[test]
    fn test_parameter_value_parse_and_display() {
        assert_eq!(ParameterValue::parse("1"), ParameterValue::Int(1));
        assert_eq!(ParameterValue::parse("0.5"), ParameterValue::Float(0.5));
        assert_eq!(
            ParameterValue::parse("42e01f"),
            ParameterValue::Str("42e01f".to_string())
        );
        assert_eq!(ParameterValue::Float(0.5).to_string(), "0.5");
        assert_eq!(ParameterValue::Int(48000).to_string(), "48000");
    }

    #[test]
    fn test_rtp_parameters_from_json() {
        let params: RtpParameters = serde_json::from_value(json!({
            "mid": "",
            "codecs": [{
                "mimeType": "video/VP8",
                "payloadType": 96,
                "clockRate": 90000,
                "parameters": { "x-google-start-bitrate": 1000 },
                "rtcpFeedback": [{ "type": "nack" }, { "type": "nack", "parameter": "pli" }]
            }],
            "encodings": [{ "ssrc": 1, "rtx": { "ssrc": 2 } }],
            "rtcp": { "cname": "c" }
        }))
        .unwrap();

        assert_eq!(params.non_empty_mid(), None, "empty mid must be treated as absent");
        assert_eq!(params.codecs[0].codec_name(), "VP8");
        assert_eq!(params.codecs[0].rtcp_feedback[0].parameter, "");
        assert_eq!(params.encodings[0].rtx, Some(RtxParameters { ssrc: 2 }));
        assert!(params.rtcp.mux, "rtcp mux defaults to true");
    }

    #[test]
    fn test_num_sctp_streams_json_shape() {
        let caps = SctpCapabilities {
            num_streams: NumSctpStreams { os: 1024, mis: 1024 },
        };
        assert_eq!(
            serde_json::to_value(caps).unwrap(),
            json!({ "numStreams": { "OS": 1024, "MIS": 1024 } })
        );
    }
}
