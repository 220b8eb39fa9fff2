//! Session description document model
//!
//! A structured view of an SDP document that is rich enough for the
//! synthesized remote descriptions and for inspecting the descriptions a
//! transport engine generates locally. Attribute lines the model does not
//! understand are kept verbatim in `attributes`/`invalid` so that parsing
//! and re-writing an engine description is lossless for our purposes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parameters::{DtlsRole, MediaKind};

/// Origin (o=) line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub username: String,
    pub session_id: u64,
    pub session_version: u64,
    pub net_type: String,
    /// 4 or 6
    pub ip_ver: u8,
    pub address: String,
}

/// Timing (t=) line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timing {
    pub start: u64,
    pub stop: u64,
}

/// `a=msid-semantic` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsidSemantic {
    pub semantic: String,
    pub token: String,
}

/// `a=fingerprint` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub hash_type: String,
    pub hash: String,
}

/// `a=group` value, e.g. `BUNDLE 0 1 2`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub semantics: String,
    pub mids: Vec<String>,
}

/// Connection (c=) line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub ip_ver: u8,
    pub ip: String,
}

impl Connection {
    /// The placeholder address used by synthesized sections
    pub fn loopback() -> Self {
        Self {
            ip_ver: 4,
            ip: "127.0.0.1".to_string(),
        }
    }
}

/// Media direction attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendRecv => "sendrecv",
            Self::SendOnly => "sendonly",
            Self::RecvOnly => "recvonly",
            Self::Inactive => "inactive",
        }
    }

    pub(crate) fn from_attribute(name: &str) -> Option<Self> {
        match name {
            "sendrecv" => Some(Self::SendRecv),
            "sendonly" => Some(Self::SendOnly),
            "recvonly" => Some(Self::RecvOnly),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_attribute(s).ok_or_else(|| Error::parsing(format!("Invalid direction: {}", s)))
    }
}

/// `a=setup` value (RFC 4145)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Setup {
    Active,
    Passive,
    Actpass,
    Holdconn,
}

impl Setup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Passive => "passive",
            Self::Actpass => "actpass",
            Self::Holdconn => "holdconn",
        }
    }

    /// Setup attribute announcing the given DTLS role
    pub fn from_role(role: DtlsRole) -> Self {
        match role {
            DtlsRole::Client => Self::Active,
            DtlsRole::Server => Self::Passive,
            DtlsRole::Auto => Self::Actpass,
        }
    }

    /// DTLS role announced by this setup attribute
    pub fn to_role(self) -> DtlsRole {
        match self {
            Self::Active => DtlsRole::Client,
            Self::Passive => DtlsRole::Server,
            Self::Actpass | Self::Holdconn => DtlsRole::Auto,
        }
    }
}

impl fmt::Display for Setup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Setup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "passive" => Ok(Self::Passive),
            "actpass" => Ok(Self::Actpass),
            "holdconn" => Ok(Self::Holdconn),
            other => Err(Error::parsing(format!("Invalid setup attribute: {}", other))),
        }
    }
}

/// `a=candidate` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub foundation: String,
    pub component: u16,
    pub transport: String,
    pub priority: u64,
    pub ip: String,
    pub port: u16,
    pub candidate_type: String,
    pub rel_addr: Option<String>,
    pub rel_port: Option<u16>,
    pub tcp_type: Option<String>,
    /// Trailing key/value extensions (generation, network-id, ...)
    pub extensions: Vec<(String, String)>,
}

/// `a=rtpmap` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpMap {
    pub payload: u8,
    pub codec: String,
    pub rate: u32,
    /// Channel count, only present when greater than one
    pub encoding: Option<u8>,
}

/// `a=fmtp` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fmtp {
    pub payload: u8,
    pub config: String,
}

/// `a=rtcp-fb` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcpFb {
    /// Payload type or `*`
    pub payload: String,
    pub feedback_type: String,
    pub subtype: Option<String>,
}

/// `a=extmap` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extmap {
    pub value: u16,
    pub direction: Option<String>,
    pub uri: String,
    pub config: Option<String>,
}

/// `a=ssrc` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsrcAttribute {
    pub id: u32,
    pub attribute: String,
    pub value: Option<String>,
}

/// `a=ssrc-group` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsrcGroup {
    pub semantics: String,
    pub ssrcs: Vec<u32>,
}

/// `a=simulcast` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Simulcast {
    pub dir1: String,
    pub list1: String,
    pub dir2: Option<String>,
    pub list2: Option<String>,
}

/// `a=rid` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rid {
    pub id: String,
    pub direction: String,
    pub params: Option<String>,
}

/// One m= section of a description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaObject {
    pub kind: MediaKind,
    pub port: u16,
    pub protocol: String,
    /// Space separated format list of the m= line
    pub payloads: String,
    pub connection: Option<Connection>,
    pub mid: Option<String>,
    pub direction: Option<Direction>,
    pub ice_ufrag: Option<String>,
    pub ice_pwd: Option<String>,
    pub ice_options: Option<String>,
    pub fingerprint: Option<Fingerprint>,
    pub setup: Option<Setup>,
    pub candidates: Vec<Candidate>,
    pub end_of_candidates: bool,
    pub rtp: Vec<RtpMap>,
    pub fmtp: Vec<Fmtp>,
    pub rtcp_fb: Vec<RtcpFb>,
    pub ext: Vec<Extmap>,
    pub extmap_allow_mixed: bool,
    pub msid: Option<String>,
    pub ssrcs: Vec<SsrcAttribute>,
    pub ssrc_groups: Vec<SsrcGroup>,
    pub simulcast: Option<Simulcast>,
    pub rids: Vec<Rid>,
    pub rtcp_mux: bool,
    pub rtcp_rsize: bool,
    pub sctp_port: Option<u16>,
    pub max_message_size: Option<u64>,
    /// Attribute lines not modeled above, without the `a=` prefix
    pub invalid: Vec<String>,
    /// i=, b= and k= lines, verbatim
    pub lines: Vec<String>,
}

impl MediaObject {
    /// An empty section of the given kind
    pub fn new(kind: MediaKind, port: u16, protocol: impl Into<String>) -> Self {
        Self {
            kind,
            port,
            protocol: protocol.into(),
            payloads: String::new(),
            connection: None,
            mid: None,
            direction: None,
            ice_ufrag: None,
            ice_pwd: None,
            ice_options: None,
            fingerprint: None,
            setup: None,
            candidates: Vec::new(),
            end_of_candidates: false,
            rtp: Vec::new(),
            fmtp: Vec::new(),
            rtcp_fb: Vec::new(),
            ext: Vec::new(),
            extmap_allow_mixed: false,
            msid: None,
            ssrcs: Vec::new(),
            ssrc_groups: Vec::new(),
            simulcast: None,
            rids: Vec::new(),
            rtcp_mux: false,
            rtcp_rsize: false,
            sctp_port: None,
            max_message_size: None,
            invalid: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Payload types of the m= line, skipping non-numeric formats
    pub fn payload_types(&self) -> Vec<u8> {
        self.payloads
            .split_whitespace()
            .filter_map(|pt| pt.parse().ok())
            .collect()
    }

    /// The fmtp config for a payload type, if any
    pub fn fmtp_for(&self, payload: u8) -> Option<&Fmtp> {
        self.fmtp.iter().find(|fmtp| fmtp.payload == payload)
    }
}

/// A full session description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub version: u32,
    pub origin: Origin,
    pub name: String,
    pub timing: Timing,
    pub ice_lite: bool,
    pub fingerprint: Option<Fingerprint>,
    pub msid_semantic: Option<MsidSemantic>,
    pub groups: Vec<Group>,
    /// Session attribute lines not modeled above, without the `a=` prefix
    pub attributes: Vec<String>,
    /// Session lines other than v=, o=, s=, t= and a=, verbatim
    pub lines: Vec<String>,
    pub media: Vec<MediaObject>,
}

impl SessionDescription {
    /// Find a media section by mid
    pub fn media_by_mid(&self, mid: &str) -> Option<&MediaObject> {
        self.media.iter().find(|media| media.mid.as_deref() == Some(mid))
    }

    /// Find a media section by mid, mutably
    pub fn media_by_mid_mut(&mut self, mid: &str) -> Option<&mut MediaObject> {
        self.media
            .iter_mut()
            .find(|media| media.mid.as_deref() == Some(mid))
    }

    /// Parse description text
    pub fn parse(text: &str) -> Result<Self> {
        crate::parser::parse_sdp(text)
    }
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::writer::write_sdp(self))
    }
}

impl FromStr for SessionDescription {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        crate::parser::parse_sdp(s)
    }
}
