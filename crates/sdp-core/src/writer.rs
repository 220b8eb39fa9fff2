//! SDP writer
//!
//! Serializes a [`SessionDescription`] to its textual form. Lines are CRLF
//! terminated and emitted in the conventional order: session lines first,
//! then each media section with its m=/c= lines followed by attributes.

use crate::types::{Candidate, MediaObject, SessionDescription};

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str("\r\n");
}

/// Emit the verbatim lines whose type is one of `types`, in their original order
fn push_typed_lines(out: &mut String, lines: &[String], types: &[char]) {
    for line in lines {
        if line.chars().next().is_some_and(|line_type| types.contains(&line_type)) {
            push_line(out, line);
        }
    }
}

fn ip_token(ip_ver: u8) -> &'static str {
    if ip_ver == 6 {
        "IP6"
    } else {
        "IP4"
    }
}

/// Write a session description to text
pub fn write_sdp(doc: &SessionDescription) -> String {
    let mut out = String::with_capacity(1024);

    push_line(&mut out, &format!("v={}", doc.version));
    push_line(
        &mut out,
        &format!(
            "o={} {} {} {} {} {}",
            doc.origin.username,
            doc.origin.session_id,
            doc.origin.session_version,
            doc.origin.net_type,
            ip_token(doc.origin.ip_ver),
            doc.origin.address
        ),
    );
    push_line(&mut out, &format!("s={}", doc.name));
    push_typed_lines(&mut out, &doc.lines, &['i', 'u', 'e', 'p', 'c', 'b']);
    push_line(&mut out, &format!("t={} {}", doc.timing.start, doc.timing.stop));
    push_typed_lines(&mut out, &doc.lines, &['r', 'z', 'k']);

    if doc.ice_lite {
        push_line(&mut out, "a=ice-lite");
    }
    if let Some(fingerprint) = &doc.fingerprint {
        push_line(
            &mut out,
            &format!("a=fingerprint:{} {}", fingerprint.hash_type, fingerprint.hash),
        );
    }
    if let Some(semantic) = &doc.msid_semantic {
        let line = format!("a=msid-semantic: {} {}", semantic.semantic, semantic.token);
        push_line(&mut out, line.trim_end());
    }
    for group in &doc.groups {
        if group.mids.is_empty() {
            push_line(&mut out, &format!("a=group:{}", group.semantics));
        } else {
            push_line(
                &mut out,
                &format!("a=group:{} {}", group.semantics, group.mids.join(" ")),
            );
        }
    }
    for attribute in &doc.attributes {
        push_line(&mut out, &format!("a={}", attribute));
    }

    for media in &doc.media {
        write_media(&mut out, media);
    }

    out
}

fn write_media(out: &mut String, media: &MediaObject) {
    if media.payloads.is_empty() {
        push_line(
            out,
            &format!("m={} {} {}", media.kind, media.port, media.protocol),
        );
    } else {
        push_line(
            out,
            &format!(
                "m={} {} {} {}",
                media.kind, media.port, media.protocol, media.payloads
            ),
        );
    }

    push_typed_lines(out, &media.lines, &['i']);
    if let Some(connection) = &media.connection {
        push_line(
            out,
            &format!("c=IN {} {}", ip_token(connection.ip_ver), connection.ip),
        );
    }
    push_typed_lines(out, &media.lines, &['b', 'k']);

    for rtp in &media.rtp {
        match rtp.encoding {
            Some(channels) => push_line(
                out,
                &format!("a=rtpmap:{} {}/{}/{}", rtp.payload, rtp.codec, rtp.rate, channels),
            ),
            None => push_line(
                out,
                &format!("a=rtpmap:{} {}/{}", rtp.payload, rtp.codec, rtp.rate),
            ),
        }
    }
    for fmtp in &media.fmtp {
        push_line(out, &format!("a=fmtp:{} {}", fmtp.payload, fmtp.config));
    }
    for fb in &media.rtcp_fb {
        match fb.subtype.as_deref().filter(|subtype| !subtype.is_empty()) {
            Some(subtype) => push_line(
                out,
                &format!("a=rtcp-fb:{} {} {}", fb.payload, fb.feedback_type, subtype),
            ),
            None => push_line(out, &format!("a=rtcp-fb:{} {}", fb.payload, fb.feedback_type)),
        }
    }

    for ext in &media.ext {
        let mut line = format!("a=extmap:{}", ext.value);
        if let Some(direction) = &ext.direction {
            line.push('/');
            line.push_str(direction);
        }
        line.push(' ');
        line.push_str(&ext.uri);
        if let Some(config) = &ext.config {
            line.push(' ');
            line.push_str(config);
        }
        push_line(out, &line);
    }
    if media.extmap_allow_mixed {
        push_line(out, "a=extmap-allow-mixed");
    }

    if let Some(setup) = media.setup {
        push_line(out, &format!("a=setup:{}", setup));
    }
    if let Some(mid) = &media.mid {
        push_line(out, &format!("a=mid:{}", mid));
    }
    if let Some(msid) = &media.msid {
        push_line(out, &format!("a=msid:{}", msid));
    }
    if let Some(direction) = media.direction {
        push_line(out, &format!("a={}", direction));
    }

    if let Some(ufrag) = &media.ice_ufrag {
        push_line(out, &format!("a=ice-ufrag:{}", ufrag));
    }
    if let Some(pwd) = &media.ice_pwd {
        push_line(out, &format!("a=ice-pwd:{}", pwd));
    }
    if let Some(options) = &media.ice_options {
        push_line(out, &format!("a=ice-options:{}", options));
    }
    if let Some(fingerprint) = &media.fingerprint {
        push_line(
            out,
            &format!("a=fingerprint:{} {}", fingerprint.hash_type, fingerprint.hash),
        );
    }
    for candidate in &media.candidates {
        push_line(out, &format!("a=candidate:{}", candidate_value(candidate)));
    }
    if media.end_of_candidates {
        push_line(out, "a=end-of-candidates");
    }

    for group in &media.ssrc_groups {
        let ssrcs: Vec<String> = group.ssrcs.iter().map(u32::to_string).collect();
        push_line(
            out,
            &format!("a=ssrc-group:{} {}", group.semantics, ssrcs.join(" ")),
        );
    }
    for ssrc in &media.ssrcs {
        match &ssrc.value {
            Some(value) => push_line(
                out,
                &format!("a=ssrc:{} {}:{}", ssrc.id, ssrc.attribute, value),
            ),
            None => push_line(out, &format!("a=ssrc:{} {}", ssrc.id, ssrc.attribute)),
        }
    }

    if media.rtcp_mux {
        push_line(out, "a=rtcp-mux");
    }
    if media.rtcp_rsize {
        push_line(out, "a=rtcp-rsize");
    }

    for rid in &media.rids {
        match &rid.params {
            Some(params) => push_line(
                out,
                &format!("a=rid:{} {} {}", rid.id, rid.direction, params),
            ),
            None => push_line(out, &format!("a=rid:{} {}", rid.id, rid.direction)),
        }
    }
    if let Some(simulcast) = &media.simulcast {
        let mut line = format!("a=simulcast:{} {}", simulcast.dir1, simulcast.list1);
        if let (Some(dir2), Some(list2)) = (&simulcast.dir2, &simulcast.list2) {
            line.push_str(&format!(" {} {}", dir2, list2));
        }
        push_line(out, &line);
    }

    if let Some(port) = media.sctp_port {
        push_line(out, &format!("a=sctp-port:{}", port));
    }
    if let Some(size) = media.max_message_size {
        push_line(out, &format!("a=max-message-size:{}", size));
    }

    for attribute in &media.invalid {
        push_line(out, &format!("a={}", attribute));
    }
}

fn candidate_value(candidate: &Candidate) -> String {
    let mut value = format!(
        "{} {} {} {} {} {} typ {}",
        candidate.foundation,
        candidate.component,
        candidate.transport,
        candidate.priority,
        candidate.ip,
        candidate.port,
        candidate.candidate_type
    );
    if let Some(addr) = &candidate.rel_addr {
        value.push_str(&format!(" raddr {}", addr));
    }
    if let Some(port) = candidate.rel_port {
        value.push_str(&format!(" rport {}", port));
    }
    if let Some(tcp_type) = &candidate.tcp_type {
        value.push_str(&format!(" tcptype {}", tcp_type));
    }
    for (key, val) in &candidate.extensions {
        value.push_str(&format!(" {} {}", key, val));
    }
    value
}
