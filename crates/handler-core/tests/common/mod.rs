//! In-memory transport engine and listener for the handler tests
//!
//! `FakeEngine` behaves like a minimal browser peer connection: it assigns
//! mids on offer creation, commits them on `set_local_description`, recycles
//! m-lines of stopped transceivers once the remote side rejected them, and
//! writes real description text with the crate's writer.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use rtcbridge_handler_core::{
    DataChannelHandle, DataChannelInit, EngineError, EngineResult, HandlerConfig,
    HandlerListener, IceConnectionState, ListenerError, MediaTrack, OfferAnswerOptions,
    RecvHandler, SdpType, SendHandler, StatsTarget, TransceiverId, TransceiverInit,
    TransceiverSource, TransportEngine, TransportParameters,
};
use rtcbridge_sdp_core::parameters::{
    IceCandidateType, IceProtocol, ParameterValue, RtcpFeedback, RtcpParameters,
    RtpCodecParameters, RtpHeaderExtensionParameters, RtxParameters,
};
use rtcbridge_sdp_core::types::{
    Connection, Direction, Fingerprint, Fmtp, Group, MediaObject, MsidSemantic, Origin, Rid,
    RtcpFb, RtpMap, Setup, Simulcast, SsrcAttribute, SsrcGroup, Timing,
};
use rtcbridge_sdp_core::{
    parse_sdp, write_sdp, DtlsFingerprint, DtlsParameters, DtlsRole, IceCandidate,
    IceParameters, MediaKind, RtpEncodingParameters, RtpParameters, SctpParameters,
    SessionDescription,
};
use serde_json::json;

pub const LOCAL_FINGERPRINT: &str = "AA:BB:CC:DD:EE:FF:00:11:22:33:44:55:66:77:88:99:AA:BB:CC:DD:EE:FF:00:11:22:33:44:55:66:77:88:99";
pub const REMOTE_FINGERPRINT: &str = "11:22:33:44:55:66:77:88:99:00:AA:BB:CC:DD:EE:FF:11:22:33:44:55:66:77:88:99:00:AA:BB:CC:DD:EE:FF";
pub const LOCAL_CNAME: &str = "fakecname";
/// Bandwidth line the engine puts into every video answer
pub const VIDEO_ANSWER_BANDWIDTH: &str = "b=AS:2000";

const MID_URI: &str = "urn:ietf:params:rtp-hdrext:sdes:mid";
const AUDIO_LEVEL_URI: &str = "urn:ietf:params:rtp-hdrext:ssrc-audio-level";
const ABS_SEND_TIME_URI: &str = "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time";

/// Install a test subscriber; `RUST_LOG` selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub struct FakeTransceiver {
    pub kind: MediaKind,
    pub direction: Direction,
    pub track: Option<MediaTrack>,
    pub mid: Option<String>,
    pending_mid: Option<String>,
    pub encodings: Vec<RtpEncodingParameters>,
    /// Sender removed; the m-line may be recycled once rejected remotely
    pub stopped: bool,
    pub ssrc: u32,
    pub remote_track: Option<MediaTrack>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Transceiver(usize),
    Data,
}

#[derive(Debug, Default)]
struct FakeState {
    transceivers: Vec<FakeTransceiver>,
    /// Creation order of everything that needs an m-line
    order: Vec<Slot>,
    /// m-line order
    slots: Vec<Slot>,
    data_mid: Option<String>,
    pending_data_mid: Option<String>,
    data_channels: Vec<(String, DataChannelInit)>,
    local: Option<String>,
    remote: Option<String>,
    next_mid: u32,
    session_version: u64,
    ice_generation: u32,
    failures: HashSet<String>,
    withhold_mids: bool,
    calls: Vec<String>,
    ice_servers: Vec<String>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call of `operation` fail
    pub fn fail(&self, operation: &str) {
        self.state.lock().failures.insert(operation.to_string());
    }

    pub fn recover(&self, operation: &str) {
        self.state.lock().failures.remove(operation);
    }

    /// Never commit mids on `set_local_description`
    pub fn withhold_mids(&self) {
        self.state.lock().withhold_mids = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn transceiver(&self, id: TransceiverId) -> FakeTransceiver {
        self.state.lock().transceivers[id.0 as usize].clone()
    }

    pub fn transceiver_count(&self) -> usize {
        self.state.lock().transceivers.len()
    }

    pub fn remote_description(&self) -> Option<String> {
        self.state.lock().remote.clone()
    }

    pub fn remote_document(&self) -> SessionDescription {
        let text = self.remote_description().expect("no remote description applied");
        parse_sdp(&text).expect("remote description parses")
    }

    pub fn local_document(&self) -> SessionDescription {
        let text = self.state.lock().local.clone().expect("no local description applied");
        parse_sdp(&text).expect("local description parses")
    }

    pub fn data_channels(&self) -> Vec<(String, DataChannelInit)> {
        self.state.lock().data_channels.clone()
    }

    pub fn ice_servers(&self) -> Vec<String> {
        self.state.lock().ice_servers.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl FakeState {
    fn check(&mut self, operation: &str) -> EngineResult<()> {
        self.calls.push(operation.to_string());
        if self.closed {
            return Err(EngineError::Closed);
        }
        if self.failures.contains(operation) {
            return Err(match operation {
                "create_offer" | "create_answer" => {
                    EngineError::DescriptionCreation(format!("{} refused", operation))
                }
                "set_local_description" | "set_remote_description" => {
                    EngineError::DescriptionRejected(format!("{} refused", operation))
                }
                _ => EngineError::OperationFailed(format!("{} refused", operation)),
            });
        }
        Ok(())
    }

    fn transceiver_mut(&mut self, id: TransceiverId) -> EngineResult<&mut FakeTransceiver> {
        self.transceivers
            .get_mut(id.0 as usize)
            .ok_or(EngineError::UnknownTransceiver(id))
    }

    fn allocate_mid(&mut self) -> String {
        let mid = self.next_mid.to_string();
        self.next_mid += 1;
        mid
    }

    fn remote_port(&self, index: usize) -> Option<u16> {
        let remote = parse_sdp(self.remote.as_deref()?).ok()?;
        remote.media.get(index).map(|media| media.port)
    }

    fn slot_mid(&self, slot: Slot) -> Option<String> {
        match slot {
            Slot::Transceiver(index) => {
                let transceiver = &self.transceivers[index];
                transceiver.mid.clone().or_else(|| transceiver.pending_mid.clone())
            }
            Slot::Data => self.data_mid.clone().or_else(|| self.pending_data_mid.clone()),
        }
    }

    /// Give an m-line to everything created since the last offer
    fn place_pending(&mut self) {
        for item in self.order.clone() {
            if self.slots.contains(&item) {
                continue;
            }
            if let Slot::Transceiver(index) = item {
                let transceiver = &self.transceivers[index];
                // Never negotiated and already rolled back
                if transceiver.mid.is_none() && transceiver.direction == Direction::Inactive {
                    continue;
                }
            }

            let recyclable = (0..self.slots.len()).find(|&position| match self.slots[position] {
                Slot::Transceiver(other) => {
                    self.transceivers[other].stopped && self.remote_port(position) == Some(0)
                }
                Slot::Data => false,
            });
            let mid = self.allocate_mid();
            match item {
                Slot::Transceiver(index) => self.transceivers[index].pending_mid = Some(mid),
                Slot::Data => self.pending_data_mid = Some(mid),
            }
            match (recyclable, item) {
                (Some(position), Slot::Transceiver(_)) => self.slots[position] = item,
                _ => self.slots.push(item),
            }
        }
    }

    fn ice_ufrag(&self) -> String {
        format!("fakeufrag{}", self.ice_generation)
    }

    fn document(&mut self, media: Vec<MediaObject>) -> SessionDescription {
        self.session_version += 1;
        let bundle = media
            .iter()
            .filter(|media| media.port != 0)
            .filter_map(|media| media.mid.clone())
            .collect();
        SessionDescription {
            version: 0,
            origin: Origin {
                username: "-".to_string(),
                session_id: 4242,
                session_version: self.session_version,
                net_type: "IN".to_string(),
                ip_ver: 4,
                address: "127.0.0.1".to_string(),
            },
            name: "-".to_string(),
            timing: Timing::default(),
            ice_lite: false,
            fingerprint: None,
            msid_semantic: Some(MsidSemantic {
                semantic: "WMS".to_string(),
                token: String::new(),
            }),
            groups: vec![Group {
                semantics: "BUNDLE".to_string(),
                mids: bundle,
            }],
            attributes: Vec::new(),
            lines: Vec::new(),
            media,
        }
    }

    fn transport_lines(&self, media: &mut MediaObject, setup: Setup) {
        media.connection = Some(Connection {
            ip_ver: 4,
            ip: "0.0.0.0".to_string(),
        });
        media.ice_ufrag = Some(self.ice_ufrag());
        media.ice_pwd = Some("fakepasswordfakepassword".to_string());
        media.ice_options = Some("trickle".to_string());
        media.fingerprint = Some(Fingerprint {
            hash_type: "sha-256".to_string(),
            hash: LOCAL_FINGERPRINT.to_string(),
        });
        media.setup = Some(setup);
    }

    fn offer_media(&self, slot: Slot) -> MediaObject {
        let mid = self.slot_mid(slot);
        match slot {
            Slot::Data => {
                let mut media = MediaObject::new(MediaKind::Application, 9, "UDP/DTLS/SCTP");
                self.transport_lines(&mut media, Setup::Actpass);
                media.payloads = "webrtc-datachannel".to_string();
                media.mid = mid;
                media.sctp_port = Some(5000);
                media.max_message_size = Some(262144);
                media
            }
            Slot::Transceiver(index) => {
                let transceiver = &self.transceivers[index];
                let mut media = MediaObject::new(transceiver.kind, 9, "UDP/TLS/RTP/SAVPF");
                self.transport_lines(&mut media, Setup::Actpass);
                media.mid = mid;
                add_codecs(&mut media, transceiver.kind);
                media.rtcp_mux = true;
                media.rtcp_rsize = true;

                if transceiver.stopped {
                    media.port = 0;
                    media.direction = Some(Direction::Inactive);
                    return media;
                }
                media.direction = Some(transceiver.direction);

                if let Some(track) = &transceiver.track {
                    let msid = format!("- {}", track.id);
                    media.msid = Some(msid.clone());
                    let rtx = (transceiver.kind == MediaKind::Video).then_some(transceiver.ssrc + 1);
                    if let Some(rtx) = rtx {
                        media.ssrc_groups.push(SsrcGroup {
                            semantics: "FID".to_string(),
                            ssrcs: vec![transceiver.ssrc, rtx],
                        });
                    }
                    for ssrc in std::iter::once(transceiver.ssrc).chain(rtx) {
                        media.ssrcs.push(SsrcAttribute {
                            id: ssrc,
                            attribute: "cname".to_string(),
                            value: Some(LOCAL_CNAME.to_string()),
                        });
                        media.ssrcs.push(SsrcAttribute {
                            id: ssrc,
                            attribute: "msid".to_string(),
                            value: Some(msid.clone()),
                        });
                    }
                }

                let rids: Vec<String> = transceiver
                    .encodings
                    .iter()
                    .filter_map(|encoding| encoding.rid.clone())
                    .collect();
                if rids.len() > 1 {
                    media.rids = rids
                        .iter()
                        .map(|rid| Rid {
                            id: rid.clone(),
                            direction: "send".to_string(),
                            params: None,
                        })
                        .collect();
                    media.simulcast = Some(Simulcast {
                        dir1: "send".to_string(),
                        list1: rids.join(";"),
                        dir2: None,
                        list2: None,
                    });
                }
                media
            }
        }
    }

    fn answer_media(&self, offer: &MediaObject) -> MediaObject {
        let mut media = MediaObject::new(offer.kind, 9, offer.protocol.clone());
        self.transport_lines(&mut media, Setup::Active);
        media.mid = offer.mid.clone();
        media.payloads = offer.payloads.clone();
        if offer.port == 0 {
            media.port = 0;
        }

        if offer.kind == MediaKind::Application {
            media.sctp_port = Some(5000);
            media.max_message_size = Some(262144);
            return media;
        }

        media.direction = Some(match offer.direction {
            Some(Direction::SendOnly) | Some(Direction::SendRecv) if offer.port != 0 => {
                Direction::RecvOnly
            }
            _ => Direction::Inactive,
        });
        media.rtp = offer.rtp.clone();
        media.rtcp_fb = offer.rtcp_fb.clone();
        media.ext = offer.ext.clone();
        media.rtcp_mux = true;
        media.rtcp_rsize = true;
        if offer.kind == MediaKind::Video {
            media.lines.push(VIDEO_ANSWER_BANDWIDTH.to_string());
        }
        for rtp in &offer.rtp {
            if rtp.codec.eq_ignore_ascii_case("opus") {
                media.fmtp.push(Fmtp {
                    payload: rtp.payload,
                    config: "minptime=10;useinbandfec=1".to_string(),
                });
            } else if let Some(fmtp) = offer.fmtp_for(rtp.payload) {
                media.fmtp.push(fmtp.clone());
            }
        }
        media
    }

    fn offered_track(offer: &MediaObject, mid: &str) -> MediaTrack {
        let id = offer
            .ssrcs
            .iter()
            .find(|ssrc| ssrc.attribute == "msid")
            .and_then(|ssrc| ssrc.value.as_deref())
            .and_then(|value| value.split_whitespace().nth(1))
            .map(str::to_string)
            .unwrap_or_else(|| format!("remote-{}", mid));
        MediaTrack::new(id, offer.kind)
    }

    /// Track the transceivers a remote offer implies
    fn apply_remote_offer(&mut self, offer: &SessionDescription) {
        for (position, media) in offer.media.iter().enumerate() {
            let Some(mid) = media.mid.clone() else {
                continue;
            };
            if media.kind == MediaKind::Application {
                self.data_mid = Some(mid);
                if !self.slots.contains(&Slot::Data) {
                    self.slots.push(Slot::Data);
                }
                continue;
            }

            if let Some(existing) = self
                .transceivers
                .iter_mut()
                .rev()
                .find(|t| t.mid.as_deref() == Some(mid.as_str()))
            {
                if media.port == 0 {
                    existing.stopped = true;
                    existing.direction = Direction::Inactive;
                    continue;
                }
                if !existing.stopped {
                    continue;
                }
                // a stopped transceiver's m-line is live again: new transceiver
            }

            let index = self.transceivers.len();
            self.transceivers.push(FakeTransceiver {
                kind: media.kind,
                direction: Direction::RecvOnly,
                track: None,
                mid: Some(mid.clone()),
                pending_mid: None,
                encodings: Vec::new(),
                stopped: media.port == 0,
                ssrc: 5000 + 10 * index as u32,
                remote_track: Some(Self::offered_track(media, &mid)),
            });
            if position < self.slots.len() {
                self.slots[position] = Slot::Transceiver(index);
            } else {
                self.slots.push(Slot::Transceiver(index));
            }
        }
    }
}

fn add_codecs(media: &mut MediaObject, kind: MediaKind) {
    let feedback = |payload: u8, feedback_type: &str, subtype: Option<&str>| RtcpFb {
        payload: payload.to_string(),
        feedback_type: feedback_type.to_string(),
        subtype: subtype.map(str::to_string),
    };
    let ext = |value: u16, uri: &str| rtcbridge_sdp_core::types::Extmap {
        value,
        direction: None,
        uri: uri.to_string(),
        config: None,
    };

    match kind {
        MediaKind::Audio => {
            media.payloads = "111".to_string();
            media.rtp.push(RtpMap {
                payload: 111,
                codec: "opus".to_string(),
                rate: 48000,
                encoding: Some(2),
            });
            media.fmtp.push(Fmtp {
                payload: 111,
                config: "minptime=10;useinbandfec=1".to_string(),
            });
            media.rtcp_fb.push(feedback(111, "transport-cc", None));
            media.ext = vec![ext(1, AUDIO_LEVEL_URI), ext(4, MID_URI)];
        }
        MediaKind::Video => {
            media.payloads = "96 97".to_string();
            media.rtp.push(RtpMap {
                payload: 96,
                codec: "VP8".to_string(),
                rate: 90000,
                encoding: None,
            });
            media.rtp.push(RtpMap {
                payload: 97,
                codec: "rtx".to_string(),
                rate: 90000,
                encoding: None,
            });
            media.fmtp.push(Fmtp {
                payload: 97,
                config: "apt=96".to_string(),
            });
            media.rtcp_fb.push(feedback(96, "goog-remb", None));
            media.rtcp_fb.push(feedback(96, "nack", None));
            media.rtcp_fb.push(feedback(96, "nack", Some("pli")));
            media.ext = vec![ext(3, ABS_SEND_TIME_URI), ext(4, MID_URI)];
        }
        MediaKind::Application => {}
    }
    media.extmap_allow_mixed = true;
}

#[async_trait]
impl TransportEngine for FakeEngine {
    async fn create_offer(&self, options: OfferAnswerOptions) -> EngineResult<String> {
        let mut state = self.state.lock();
        state.check("create_offer")?;
        if options.ice_restart {
            state.ice_generation += 1;
        }
        state.place_pending();
        let media: Vec<MediaObject> = state
            .slots
            .clone()
            .into_iter()
            .map(|slot| state.offer_media(slot))
            .collect();
        let doc = state.document(media);
        Ok(write_sdp(&doc))
    }

    async fn create_answer(&self, options: OfferAnswerOptions) -> EngineResult<String> {
        let mut state = self.state.lock();
        state.check("create_answer")?;
        if options.ice_restart {
            state.ice_generation += 1;
        }
        let remote = state
            .remote
            .as_deref()
            .ok_or_else(|| EngineError::DescriptionCreation("no remote offer".to_string()))?;
        let offer =
            parse_sdp(remote).map_err(|e| EngineError::DescriptionCreation(e.to_string()))?;
        let media: Vec<MediaObject> = offer
            .media
            .iter()
            .map(|media| state.answer_media(media))
            .collect();
        let doc = state.document(media);
        Ok(write_sdp(&doc))
    }

    async fn set_local_description(&self, sdp_type: SdpType, sdp: &str) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.check("set_local_description")?;
        parse_sdp(sdp).map_err(|e| EngineError::DescriptionRejected(e.to_string()))?;

        if sdp_type == SdpType::Offer && !state.withhold_mids {
            for transceiver in state.transceivers.iter_mut() {
                if let Some(mid) = transceiver.pending_mid.take() {
                    transceiver.mid = Some(mid);
                }
            }
            if let Some(mid) = state.pending_data_mid.take() {
                state.data_mid = Some(mid);
            }
        }
        state.local = Some(sdp.to_string());
        Ok(())
    }

    async fn set_remote_description(&self, sdp_type: SdpType, sdp: &str) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.check("set_remote_description")?;
        let doc = parse_sdp(sdp).map_err(|e| EngineError::DescriptionRejected(e.to_string()))?;

        match sdp_type {
            SdpType::Answer => {
                let local = state
                    .local
                    .as_deref()
                    .ok_or_else(|| EngineError::DescriptionRejected("no local offer".to_string()))?;
                let offer = parse_sdp(local)
                    .map_err(|e| EngineError::DescriptionRejected(e.to_string()))?;
                let offered: Vec<_> = offer.media.iter().map(|m| m.mid.clone()).collect();
                let answered: Vec<_> = doc.media.iter().map(|m| m.mid.clone()).collect();
                if offered != answered {
                    return Err(EngineError::DescriptionRejected(format!(
                        "answer mids {:?} do not match offer mids {:?}",
                        answered, offered
                    )));
                }
            }
            SdpType::Offer => state.apply_remote_offer(&doc),
        }
        state.remote = Some(sdp.to_string());
        Ok(())
    }

    fn local_description(&self) -> Option<String> {
        self.state.lock().local.clone()
    }

    fn add_transceiver(
        &self,
        source: TransceiverSource,
        init: TransceiverInit,
    ) -> EngineResult<TransceiverId> {
        let mut state = self.state.lock();
        state.check("add_transceiver")?;
        let index = state.transceivers.len();
        let track = match &source {
            TransceiverSource::Track(track) => Some(track.clone()),
            TransceiverSource::Kind(_) => None,
        };
        state.transceivers.push(FakeTransceiver {
            kind: source.kind(),
            direction: init.direction,
            track,
            mid: None,
            pending_mid: None,
            encodings: init.send_encodings,
            stopped: false,
            ssrc: 1000 + 10 * index as u32,
            remote_track: None,
        });
        state.order.push(Slot::Transceiver(index));
        Ok(TransceiverId(index as u64))
    }

    fn transceivers(&self) -> Vec<TransceiverId> {
        let state = self.state.lock();
        (0..state.transceivers.len())
            .map(|index| TransceiverId(index as u64))
            .collect()
    }

    fn transceiver_mid(&self, id: TransceiverId) -> Option<String> {
        let state = self.state.lock();
        state.transceivers.get(id.0 as usize)?.mid.clone()
    }

    fn set_direction(&self, id: TransceiverId, direction: Direction) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.check("set_direction")?;
        state.transceiver_mut(id)?.direction = direction;
        Ok(())
    }

    fn set_sender_track(&self, id: TransceiverId, track: Option<&MediaTrack>) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.check("set_sender_track")?;
        state.transceiver_mut(id)?.track = track.cloned();
        Ok(())
    }

    fn remove_sender(&self, id: TransceiverId) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.check("remove_sender")?;
        let transceiver = state.transceiver_mut(id)?;
        transceiver.stopped = true;
        transceiver.track = None;
        transceiver.direction = Direction::Inactive;
        Ok(())
    }

    fn sender_encodings(&self, id: TransceiverId) -> EngineResult<Vec<RtpEncodingParameters>> {
        let mut state = self.state.lock();
        state.check("sender_encodings")?;
        Ok(state.transceiver_mut(id)?.encodings.clone())
    }

    fn set_sender_encodings(
        &self,
        id: TransceiverId,
        encodings: Vec<RtpEncodingParameters>,
    ) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.check("set_sender_encodings")?;
        state.transceiver_mut(id)?.encodings = encodings;
        Ok(())
    }

    fn receiver_track(&self, id: TransceiverId) -> EngineResult<MediaTrack> {
        let mut state = self.state.lock();
        state
            .transceiver_mut(id)?
            .remote_track
            .clone()
            .ok_or_else(|| EngineError::OperationFailed(format!("{} receives nothing", id)))
    }

    fn create_data_channel(
        &self,
        label: &str,
        init: &DataChannelInit,
    ) -> EngineResult<DataChannelHandle> {
        let mut state = self.state.lock();
        state.check("create_data_channel")?;
        if !state.order.contains(&Slot::Data) {
            state.order.push(Slot::Data);
        }
        state.data_channels.push((label.to_string(), init.clone()));
        Ok(DataChannelHandle {
            label: label.to_string(),
            stream_id: init.id.unwrap_or_default(),
        })
    }

    async fn stats(&self, target: StatsTarget) -> EngineResult<serde_json::Value> {
        let mut state = self.state.lock();
        state.check("stats")?;
        Ok(match target {
            StatsTarget::Transport => json!({ "type": "transport" }),
            StatsTarget::Sender(id) => json!({ "type": "outbound-rtp", "transceiver": id.0 }),
            StatsTarget::Receiver(id) => json!({ "type": "inbound-rtp", "transceiver": id.0 }),
        })
    }

    fn set_ice_servers(&self, uris: &[String]) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.check("set_ice_servers")?;
        state.ice_servers = uris.to_vec();
        Ok(())
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.calls.push("close".to_string());
        state.closed = true;
    }
}

/// Records everything a handler reports upward
#[derive(Debug, Default)]
pub struct FakeListener {
    connects: Mutex<Vec<DtlsParameters>>,
    states: Mutex<Vec<IceConnectionState>>,
    refuse: Mutex<bool>,
}

impl FakeListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing() -> Self {
        let listener = Self::default();
        *listener.refuse.lock() = true;
        listener
    }

    pub fn connects(&self) -> Vec<DtlsParameters> {
        self.connects.lock().clone()
    }

    pub fn states(&self) -> Vec<IceConnectionState> {
        self.states.lock().clone()
    }
}

#[async_trait]
impl HandlerListener for FakeListener {
    async fn on_connect(&self, dtls_parameters: DtlsParameters) -> Result<(), ListenerError> {
        if *self.refuse.lock() {
            return Err("signaling refused the DTLS parameters".into());
        }
        self.connects.lock().push(dtls_parameters);
        Ok(())
    }

    fn on_connection_state_change(&self, state: IceConnectionState) {
        self.states.lock().push(state);
    }
}

pub fn transport_parameters(with_sctp: bool) -> TransportParameters {
    TransportParameters {
        ice_parameters: IceParameters {
            username_fragment: "remoteufrag".to_string(),
            password: "remotepassword".to_string(),
            ice_lite: true,
        },
        ice_candidates: vec![IceCandidate {
            foundation: "udpcandidate".to_string(),
            priority: 1076302079,
            ip: "203.0.113.10".to_string(),
            protocol: IceProtocol::Udp,
            port: 40000,
            candidate_type: IceCandidateType::Host,
            tcp_type: None,
        }],
        dtls_parameters: DtlsParameters {
            role: DtlsRole::Auto,
            fingerprints: vec![DtlsFingerprint {
                algorithm: "sha-256".to_string(),
                value: REMOTE_FINGERPRINT.to_string(),
            }],
        },
        sctp_parameters: with_sctp.then(|| SctpParameters {
            port: 5000,
            os: 1024,
            mis: 1024,
            max_message_size: 262144,
        }),
    }
}

fn opus_codec(parameters: &[(&str, ParameterValue)]) -> RtpCodecParameters {
    RtpCodecParameters {
        mime_type: "audio/opus".to_string(),
        payload_type: 111,
        clock_rate: 48000,
        channels: Some(2),
        parameters: parameters
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect(),
        rtcp_feedback: vec![RtcpFeedback {
            feedback_type: "transport-cc".to_string(),
            parameter: String::new(),
        }],
    }
}

fn video_codecs(mime_type: &str) -> Vec<RtpCodecParameters> {
    vec![
        RtpCodecParameters {
            mime_type: mime_type.to_string(),
            payload_type: 96,
            clock_rate: 90000,
            channels: None,
            parameters: Default::default(),
            rtcp_feedback: vec![
                RtcpFeedback {
                    feedback_type: "nack".to_string(),
                    parameter: String::new(),
                },
                RtcpFeedback {
                    feedback_type: "nack".to_string(),
                    parameter: "pli".to_string(),
                },
            ],
        },
        RtpCodecParameters {
            mime_type: "video/rtx".to_string(),
            payload_type: 97,
            clock_rate: 90000,
            channels: None,
            parameters: [("apt".to_string(), ParameterValue::Int(96))].into_iter().collect(),
            rtcp_feedback: Vec::new(),
        },
    ]
}

fn header_extensions(kind: MediaKind) -> Vec<RtpHeaderExtensionParameters> {
    let uris: &[(&str, u16)] = match kind {
        MediaKind::Audio => &[(MID_URI, 4), (AUDIO_LEVEL_URI, 1)],
        _ => &[(MID_URI, 4), (ABS_SEND_TIME_URI, 3), ("urn:3gpp:video-orientation", 13)],
    };
    uris.iter()
        .map(|(uri, id)| RtpHeaderExtensionParameters {
            uri: uri.to_string(),
            id: *id,
            encrypt: false,
            parameters: Default::default(),
        })
        .collect()
}

/// Parameters this side announces for a kind
pub fn sending_parameters(kind: MediaKind, video_mime: &str) -> RtpParameters {
    let codecs = match kind {
        MediaKind::Audio => vec![opus_codec(&[("useinbandfec", ParameterValue::Int(1))])],
        _ => video_codecs(video_mime),
    };
    RtpParameters {
        mid: None,
        codecs,
        header_extensions: header_extensions(kind),
        encodings: Vec::new(),
        rtcp: RtcpParameters::default(),
    }
}

pub fn send_handler_with(
    engine: std::sync::Arc<FakeEngine>,
    listener: std::sync::Arc<FakeListener>,
    video_mime: &str,
    with_sctp: bool,
) -> SendHandler {
    let kinds = [MediaKind::Audio, MediaKind::Video];
    let local: HashMap<_, _> = kinds
        .iter()
        .map(|kind| (*kind, sending_parameters(*kind, video_mime)))
        .collect();
    let remote = local.clone();
    SendHandler::new(
        engine,
        listener,
        transport_parameters(with_sctp),
        local,
        remote,
        HandlerConfig::default(),
    )
    .expect("send handler")
}

pub fn send_handler(
    engine: std::sync::Arc<FakeEngine>,
    listener: std::sync::Arc<FakeListener>,
) -> SendHandler {
    send_handler_with(engine, listener, "video/VP8", true)
}

pub fn recv_handler(
    engine: std::sync::Arc<FakeEngine>,
    listener: std::sync::Arc<FakeListener>,
) -> RecvHandler {
    RecvHandler::new(
        engine,
        listener,
        transport_parameters(true),
        HandlerConfig::default(),
    )
    .expect("recv handler")
}

/// Parameters of a track the remote endpoint sends to us
pub fn consumer_parameters(kind: MediaKind, mid: Option<&str>, ssrc: u32) -> RtpParameters {
    let codecs = match kind {
        MediaKind::Audio => vec![opus_codec(&[
            ("sprop-stereo", ParameterValue::Int(1)),
            ("useinbandfec", ParameterValue::Int(1)),
        ])],
        _ => video_codecs("video/VP8"),
    };
    RtpParameters {
        mid: mid.map(str::to_string),
        codecs,
        header_extensions: header_extensions(kind),
        encodings: vec![RtpEncodingParameters {
            ssrc: Some(ssrc),
            rtx: (kind == MediaKind::Video).then_some(RtxParameters { ssrc: ssrc + 1 }),
            ..Default::default()
        }],
        rtcp: RtcpParameters {
            cname: Some("remotecname".to_string()),
            ..Default::default()
        },
    }
}
