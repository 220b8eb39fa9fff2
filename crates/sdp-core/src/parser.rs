//! SDP parser
//!
//! Parses description text into a [`SessionDescription`]. Structured lines
//! (`x=` framing, `o=`, `m=` and `a=rtpmap`) use `nom`; attribute values are
//! split by hand since their grammars are simple token lists. Attribute
//! lines that are not modeled are preserved verbatim.

use nom::{
    bytes::complete::{tag, take_till1},
    character::complete::{alpha1, char, digit1, satisfy, space1},
    combinator::{map_res, opt, rest},
    sequence::{preceded, separated_pair, tuple},
    IResult,
};
use tracing::trace;

use crate::error::{Error, Result};
use crate::parameters::MediaKind;
use crate::types::{
    Candidate, Connection, Direction, Extmap, Fingerprint, Fmtp, Group, MediaObject, MsidSemantic,
    Origin, Rid, RtcpFb, RtpMap, SessionDescription, Simulcast, SsrcAttribute, SsrcGroup, Timing,
};

/// Split a description line into its type character and value
fn sdp_line_nom(input: &str) -> IResult<&str, (char, &str)> {
    separated_pair(satisfy(|c| c.is_ascii_lowercase()), char('='), rest)(input)
}

fn u64_nom(input: &str) -> IResult<&str, u64> {
    map_res(digit1, |digits: &str| digits.parse::<u64>())(input)
}

fn u16_nom(input: &str) -> IResult<&str, u16> {
    map_res(digit1, |digits: &str| digits.parse::<u16>())(input)
}

/// Origin line value: `<username> <sess-id> <sess-version> IN <IP4|IP6> <address>`
fn origin_nom(input: &str) -> IResult<&str, Origin> {
    let (input, (username, _, session_id, _, session_version, _, net_type, _, addr_type, _, address)) =
        tuple((
            take_till1(|c| c == ' '),
            space1,
            u64_nom,
            space1,
            u64_nom,
            space1,
            tag("IN"),
            space1,
            take_till1(|c| c == ' '),
            space1,
            take_till1(|c| c == ' '),
        ))(input)?;

    Ok((
        input,
        Origin {
            username: username.to_string(),
            session_id,
            session_version,
            net_type: net_type.to_string(),
            ip_ver: if addr_type == "IP6" { 6 } else { 4 },
            address: address.to_string(),
        },
    ))
}

/// Media line value: `<media> <port>[/<count>] <proto> <fmt> ...`
fn media_line_nom(input: &str) -> IResult<&str, (&str, u16, &str, &str)> {
    let (input, (kind, _, port, _, _, protocol, payloads)) = tuple((
        alpha1,
        space1,
        u16_nom,
        opt(preceded(char('/'), digit1)),
        space1,
        take_till1(|c| c == ' '),
        rest,
    ))(input)?;

    Ok((input, (kind, port, protocol, payloads.trim())))
}

/// rtpmap value: `<payload> <codec>/<rate>[/<channels>]`
fn rtpmap_nom(input: &str) -> IResult<&str, RtpMap> {
    let (input, (payload, _, codec, _, rate, channels)) = tuple((
        map_res(digit1, |digits: &str| digits.parse::<u8>()),
        space1,
        take_till1(|c| c == '/'),
        char('/'),
        map_res(digit1, |digits: &str| digits.parse::<u32>()),
        opt(preceded(
            char('/'),
            map_res(digit1, |digits: &str| digits.parse::<u8>()),
        )),
    ))(input)?;

    Ok((
        input,
        RtpMap {
            payload,
            codec: codec.to_string(),
            rate,
            encoding: channels,
        },
    ))
}

/// Parse an origin line value
pub fn parse_origin_line(value: &str) -> Result<Origin> {
    match origin_nom(value) {
        Ok((remainder, origin)) if remainder.trim().is_empty() => Ok(origin),
        _ => Err(Error::parsing(format!("Invalid o= line format: {}", value))),
    }
}

/// Parse an m= line value into an attribute-less media section
pub fn parse_media_line(value: &str) -> Result<MediaObject> {
    let (_, (kind, port, protocol, payloads)) = media_line_nom(value)
        .map_err(|_| Error::parsing(format!("Invalid m= line format: {}", value)))?;

    let mut media = MediaObject::new(kind.parse::<MediaKind>()?, port, protocol);
    media.payloads = payloads.to_string();
    Ok(media)
}

fn parse_connection(value: &str) -> Result<Connection> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() != 3 || parts[0] != "IN" {
        return Err(Error::parsing(format!("Invalid c= line format: {}", value)));
    }
    // Multicast TTL suffixes are not used by WebRTC endpoints
    let ip = parts[2].split('/').next().unwrap_or_default();
    Ok(Connection {
        ip_ver: if parts[1] == "IP6" { 6 } else { 4 },
        ip: ip.to_string(),
    })
}

fn parse_timing(value: &str) -> Result<Timing> {
    let mut parts = value.split_whitespace().map(str::parse::<u64>);
    match (parts.next(), parts.next()) {
        (Some(Ok(start)), Some(Ok(stop))) => Ok(Timing { start, stop }),
        _ => Err(Error::parsing(format!("Invalid t= line format: {}", value))),
    }
}

fn parse_fingerprint(value: &str) -> Result<Fingerprint> {
    let (hash_type, hash) = value
        .split_once(' ')
        .ok_or_else(|| Error::parsing(format!("Invalid fingerprint attribute: {}", value)))?;
    Ok(Fingerprint {
        hash_type: hash_type.to_string(),
        hash: hash.trim().to_string(),
    })
}

fn parse_number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::parsing(format!("Invalid {}: {}", what, value)))
}

fn parse_candidate(value: &str) -> Result<Candidate> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() < 8 || parts[6] != "typ" {
        return Err(Error::parsing(format!("Invalid candidate attribute: {}", value)));
    }

    let mut candidate = Candidate {
        foundation: parts[0].to_string(),
        component: parse_number(parts[1], "candidate component")?,
        transport: parts[2].to_string(),
        priority: parse_number(parts[3], "candidate priority")?,
        ip: parts[4].to_string(),
        port: parse_number(parts[5], "candidate port")?,
        candidate_type: parts[7].to_string(),
        rel_addr: None,
        rel_port: None,
        tcp_type: None,
        extensions: Vec::new(),
    };

    for pair in parts[8..].chunks(2) {
        let [key, val] = pair else {
            return Err(Error::parsing(format!("Dangling candidate extension: {}", value)));
        };
        match *key {
            "raddr" => candidate.rel_addr = Some(val.to_string()),
            "rport" => candidate.rel_port = Some(parse_number(val, "candidate rport")?),
            "tcptype" => candidate.tcp_type = Some(val.to_string()),
            _ => candidate.extensions.push((key.to_string(), val.to_string())),
        }
    }

    Ok(candidate)
}

fn parse_extmap(value: &str) -> Result<Extmap> {
    let mut parts = value.splitn(3, ' ');
    let (Some(id_part), Some(uri)) = (parts.next(), parts.next()) else {
        return Err(Error::parsing(format!("Invalid extmap attribute: {}", value)));
    };
    let (id, direction) = match id_part.split_once('/') {
        Some((id, direction)) => (id, Some(direction.to_string())),
        None => (id_part, None),
    };
    Ok(Extmap {
        value: parse_number(id, "extmap id")?,
        direction,
        uri: uri.to_string(),
        config: parts.next().map(str::to_string),
    })
}

fn parse_ssrc(value: &str) -> Result<SsrcAttribute> {
    let (id, attribute) = value
        .split_once(' ')
        .ok_or_else(|| Error::parsing(format!("Invalid ssrc attribute: {}", value)))?;
    let (attribute, attr_value) = match attribute.split_once(':') {
        Some((name, attr_value)) => (name, Some(attr_value.to_string())),
        None => (attribute, None),
    };
    Ok(SsrcAttribute {
        id: parse_number(id, "ssrc")?,
        attribute: attribute.to_string(),
        value: attr_value,
    })
}

fn parse_ssrc_group(value: &str) -> Result<SsrcGroup> {
    let mut parts = value.split_whitespace();
    let semantics = parts
        .next()
        .ok_or_else(|| Error::parsing(format!("Invalid ssrc-group attribute: {}", value)))?;
    let ssrcs = parts
        .map(|ssrc| parse_number(ssrc, "ssrc-group ssrc"))
        .collect::<Result<Vec<u32>>>()?;
    Ok(SsrcGroup {
        semantics: semantics.to_string(),
        ssrcs,
    })
}

fn parse_rid(value: &str) -> Result<Rid> {
    let mut parts = value.splitn(3, ' ');
    let (Some(id), Some(direction)) = (parts.next(), parts.next()) else {
        return Err(Error::parsing(format!("Invalid rid attribute: {}", value)));
    };
    Ok(Rid {
        id: id.to_string(),
        direction: direction.to_string(),
        params: parts.next().map(str::to_string),
    })
}

fn parse_simulcast(value: &str) -> Result<Simulcast> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    match parts.as_slice() {
        [dir1, list1] => Ok(Simulcast {
            dir1: dir1.to_string(),
            list1: list1.to_string(),
            dir2: None,
            list2: None,
        }),
        [dir1, list1, dir2, list2] => Ok(Simulcast {
            dir1: dir1.to_string(),
            list1: list1.to_string(),
            dir2: Some(dir2.to_string()),
            list2: Some(list2.to_string()),
        }),
        _ => Err(Error::parsing(format!("Invalid simulcast attribute: {}", value))),
    }
}

fn parse_media_attribute(media: &mut MediaObject, value: &str) -> Result<()> {
    let (name, attr_value) = match value.split_once(':') {
        Some((name, attr_value)) => (name, attr_value),
        None => (value, ""),
    };

    match name {
        "rtpmap" => {
            let (_, rtp) = rtpmap_nom(attr_value)
                .map_err(|_| Error::parsing(format!("Invalid rtpmap attribute: {}", attr_value)))?;
            media.rtp.push(rtp);
        }
        "fmtp" => {
            let (payload, config) = attr_value
                .split_once(' ')
                .ok_or_else(|| Error::parsing(format!("Invalid fmtp attribute: {}", attr_value)))?;
            media.fmtp.push(Fmtp {
                payload: parse_number(payload, "fmtp payload")?,
                config: config.trim().to_string(),
            });
        }
        "rtcp-fb" => {
            let mut parts = attr_value.splitn(3, ' ');
            let (Some(payload), Some(feedback_type)) = (parts.next(), parts.next()) else {
                return Err(Error::parsing(format!("Invalid rtcp-fb attribute: {}", attr_value)));
            };
            media.rtcp_fb.push(RtcpFb {
                payload: payload.to_string(),
                feedback_type: feedback_type.to_string(),
                subtype: parts.next().map(str::to_string),
            });
        }
        "extmap" => media.ext.push(parse_extmap(attr_value)?),
        "extmap-allow-mixed" => media.extmap_allow_mixed = true,
        "setup" => media.setup = Some(attr_value.parse()?),
        "mid" => media.mid = Some(attr_value.to_string()),
        "msid" => media.msid = Some(attr_value.to_string()),
        "ice-ufrag" => media.ice_ufrag = Some(attr_value.to_string()),
        "ice-pwd" => media.ice_pwd = Some(attr_value.to_string()),
        "ice-options" => media.ice_options = Some(attr_value.to_string()),
        "fingerprint" => media.fingerprint = Some(parse_fingerprint(attr_value)?),
        "candidate" => media.candidates.push(parse_candidate(attr_value)?),
        "end-of-candidates" => media.end_of_candidates = true,
        "ssrc" => media.ssrcs.push(parse_ssrc(attr_value)?),
        "ssrc-group" => media.ssrc_groups.push(parse_ssrc_group(attr_value)?),
        "rtcp-mux" => media.rtcp_mux = true,
        "rtcp-rsize" => media.rtcp_rsize = true,
        "rid" => media.rids.push(parse_rid(attr_value)?),
        "simulcast" => media.simulcast = Some(parse_simulcast(attr_value)?),
        "sctp-port" => media.sctp_port = Some(parse_number(attr_value, "sctp-port")?),
        "max-message-size" => {
            media.max_message_size = Some(parse_number(attr_value, "max-message-size")?)
        }
        _ => match Direction::from_attribute(name) {
            Some(direction) if attr_value.is_empty() => media.direction = Some(direction),
            _ => {
                trace!("Keeping unmodeled media attribute: {}", value);
                media.invalid.push(value.to_string());
            }
        },
    }

    Ok(())
}

#[derive(Default)]
struct SessionFields {
    version: Option<u32>,
    origin: Option<Origin>,
    name: Option<String>,
    timing: Timing,
    ice_lite: bool,
    fingerprint: Option<Fingerprint>,
    msid_semantic: Option<MsidSemantic>,
    groups: Vec<Group>,
    attributes: Vec<String>,
    lines: Vec<String>,
}

fn parse_session_attribute(session: &mut SessionFields, value: &str) -> Result<()> {
    let (name, attr_value) = match value.split_once(':') {
        Some((name, attr_value)) => (name, attr_value),
        None => (value, ""),
    };

    match name {
        "ice-lite" => session.ice_lite = true,
        "fingerprint" => session.fingerprint = Some(parse_fingerprint(attr_value)?),
        "msid-semantic" => {
            let mut parts = attr_value.split_whitespace();
            session.msid_semantic = Some(MsidSemantic {
                semantic: parts.next().unwrap_or_default().to_string(),
                token: parts.next().unwrap_or_default().to_string(),
            });
        }
        "group" => {
            let mut parts = attr_value.split_whitespace();
            let semantics = parts
                .next()
                .ok_or_else(|| Error::parsing(format!("Invalid group attribute: {}", value)))?;
            session.groups.push(Group {
                semantics: semantics.to_string(),
                mids: parts.map(str::to_string).collect(),
            });
        }
        _ => session.attributes.push(value.to_string()),
    }

    Ok(())
}

/// Parse description text into a [`SessionDescription`]
pub fn parse_sdp(text: &str) -> Result<SessionDescription> {
    let mut session = SessionFields::default();
    let mut media: Vec<MediaObject> = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let (_, (line_type, value)) = sdp_line_nom(line)
            .map_err(|_| Error::parsing(format!("Invalid SDP line: {}", line)))?;

        match line_type {
            'v' => session.version = Some(parse_number(value, "version")?),
            'o' => session.origin = Some(parse_origin_line(value)?),
            's' => session.name = Some(value.to_string()),
            't' => session.timing = parse_timing(value)?,
            'm' => media.push(parse_media_line(value)?),
            'a' => match media.last_mut() {
                Some(current) => parse_media_attribute(current, value)?,
                None => parse_session_attribute(&mut session, value)?,
            },
            'c' => match media.last_mut() {
                Some(current) => current.connection = Some(parse_connection(value)?),
                None => session.lines.push(line.to_string()),
            },
            other => {
                trace!("Keeping SDP line of type {} verbatim", other);
                match media.last_mut() {
                    Some(current) => current.lines.push(line.to_string()),
                    None => session.lines.push(line.to_string()),
                }
            }
        }
    }

    let origin = session
        .origin
        .ok_or_else(|| Error::parsing("Missing o= line"))?;

    Ok(SessionDescription {
        version: session.version.unwrap_or_default(),
        origin,
        name: session.name.unwrap_or_else(|| "-".to_string()),
        timing: session.timing,
        ice_lite: session.ice_lite,
        fingerprint: session.fingerprint,
        msid_semantic: session.msid_semantic,
        groups: session.groups,
        attributes: session.attributes,
        lines: session.lines,
        media,
    })
}
