//! Synthesized remote description
//!
//! [`RemoteSdp`] fabricates the description of the remote endpoint from its
//! ICE, DTLS and SCTP parameters. Media sections live in a flat
//! [`SectionRegistry`] arena; the BUNDLE group and the emitted document are
//! derived from it on demand, so they can never drift from the sections.
//!
//! # Example
//!
//! ```rust
//! use rtcbridge_sdp_core::parameters::*;
//! use rtcbridge_sdp_core::remote_sdp::{RemoteSdp, RemoteSdpConfig};
//!
//! let ice = IceParameters {
//!     username_fragment: "ufrag".into(),
//!     password: "pwd".into(),
//!     ice_lite: true,
//! };
//! let dtls = DtlsParameters {
//!     role: DtlsRole::Auto,
//!     fingerprints: vec![DtlsFingerprint { algorithm: "sha-256".into(), value: "AB:CD".into() }],
//! };
//!
//! let mut remote = RemoteSdp::new(ice, Vec::new(), dtls, None, &RemoteSdpConfig::default()).unwrap();
//! let first = remote.serialize();
//! let second = remote.serialize();
//! assert!(first.contains("a=ice-lite"));
//! assert!(first.contains(" 1 IN IP4 0.0.0.0") && second.contains(" 2 IN IP4 0.0.0.0"));
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::parameters::{
    CodecOptions, DtlsParameters, DtlsRole, IceCandidate, IceParameters, MediaKind, RtpParameters,
    SctpParameters,
};
use crate::section::{AnswerRtp, MediaSection, OfferRtp, SectionTransport};
use crate::types::{
    Fingerprint, Group, MediaObject, MsidSemantic, Origin, SessionDescription, Timing,
};
use crate::writer::write_sdp;

/// Mid of the data channel section fabricated on the receiving side
pub const DATACHANNEL_MID: &str = "datachannel";

/// Origin settings of synthesized descriptions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteSdpConfig {
    pub origin_username: String,
    pub session_id: u64,
}

impl Default for RemoteSdpConfig {
    fn default() -> Self {
        Self {
            origin_username: "rtcbridge".to_string(),
            session_id: 10000,
        }
    }
}

/// Where the next section goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSlot {
    pub index: usize,
    /// Mid of the closed section occupying the slot, if it is reused
    pub reuse_mid: Option<String>,
}

/// Undo record for one registry mutation
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum SectionChange {
    /// A section was appended, possibly becoming the bundle anchor
    Appended { index: usize, anchored: bool },
    /// A section replaced the one that was at `index`
    Replaced {
        index: usize,
        previous: MediaSection,
    },
}

impl SectionChange {
    pub fn index(&self) -> usize {
        match self {
            Self::Appended { index, .. } | Self::Replaced { index, .. } => *index,
        }
    }
}

/// Ordered arena of media sections
///
/// Indices are contiguous: closed sections keep their slot until a later
/// section replaces them in place.
#[derive(Debug, Clone, Default)]
pub struct SectionRegistry {
    sections: Vec<MediaSection>,
    anchor_mid: Option<String>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sections(&self) -> &[MediaSection] {
        &self.sections
    }

    pub fn get(&self, index: usize) -> Option<&MediaSection> {
        self.sections.get(index)
    }

    /// Mid of the first section ever added; it carries the bundled transport
    pub fn anchor_mid(&self) -> Option<&str> {
        self.anchor_mid.as_deref()
    }

    /// Index of the section with the given mid, preferring open sections
    pub fn index_of(&self, mid: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|section| section.mid() == mid && !section.is_closed())
            .or_else(|| self.sections.iter().position(|section| section.mid() == mid))
    }

    /// First closed slot, or a fresh one at the end
    pub fn next_slot(&self) -> SectionSlot {
        match self.sections.iter().position(MediaSection::is_closed) {
            Some(index) => SectionSlot {
                index,
                reuse_mid: Some(self.sections[index].mid().to_string()),
            },
            None => SectionSlot {
                index: self.sections.len(),
                reuse_mid: None,
            },
        }
    }

    /// Slot for a section that must carry `mid`
    ///
    /// A closed section already named `mid` gives back its own slot so mids
    /// stay unique; otherwise this is [`SectionRegistry::next_slot`].
    pub fn slot_for_mid(&self, mid: &str) -> Result<SectionSlot> {
        match self.index_of(mid) {
            Some(index) if self.sections[index].is_closed() => Ok(SectionSlot {
                index,
                reuse_mid: Some(mid.to_string()),
            }),
            Some(_) => Err(Error::invalid_parameters(format!("mid {} is already in use", mid))),
            None => Ok(self.next_slot()),
        }
    }

    /// Put a section into `slot`
    ///
    /// A reused slot must still hold the closed section it was handed out
    /// for. A fresh slot appends, unless an open section already carries the
    /// new section's mid, in which case that one is replaced.
    pub fn insert(&mut self, section: MediaSection, slot: &SectionSlot) -> Result<SectionChange> {
        match &slot.reuse_mid {
            Some(reuse_mid) => {
                let reusable = self
                    .sections
                    .get(slot.index)
                    .is_some_and(|current| current.is_closed() && current.mid() == reuse_mid);
                if !reusable {
                    return Err(Error::SlotUnavailable(slot.index));
                }
                Ok(self.replace(slot.index, section))
            }
            None if slot.index == self.sections.len() => Ok(self.push(section)),
            None => Err(Error::SlotUnavailable(slot.index)),
        }
    }

    /// Append a section, or replace the open section with the same mid
    pub fn push(&mut self, section: MediaSection) -> SectionChange {
        if let Some(index) = self
            .sections
            .iter()
            .position(|current| current.mid() == section.mid() && !current.is_closed())
        {
            return self.replace(index, section);
        }

        let anchored = self.anchor_mid.is_none();
        if anchored {
            self.anchor_mid = Some(section.mid().to_string());
        }
        self.sections.push(section);
        SectionChange::Appended {
            index: self.sections.len() - 1,
            anchored,
        }
    }

    fn replace(&mut self, index: usize, section: MediaSection) -> SectionChange {
        let previous = std::mem::replace(&mut self.sections[index], section);
        SectionChange::Replaced { index, previous }
    }

    /// Undo a change returned by [`SectionRegistry::insert`]
    pub fn revert(&mut self, change: SectionChange) {
        match change {
            SectionChange::Appended { index, anchored } => {
                if index < self.sections.len() {
                    self.sections.remove(index);
                }
                if anchored {
                    self.anchor_mid = None;
                }
            }
            SectionChange::Replaced { index, previous } => {
                if let Some(slot) = self.sections.get_mut(index) {
                    *slot = previous;
                }
            }
        }
    }

    /// Disable the anchor or close any other section
    pub fn close(&mut self, mid: &str) -> Result<()> {
        let is_anchor = self.anchor_mid.as_deref() == Some(mid);
        let section = self.section_mut(mid)?;
        if is_anchor {
            section.disable();
        } else {
            section.close();
        }
        Ok(())
    }

    fn section_mut(&mut self, mid: &str) -> Result<&mut MediaSection> {
        let index = self
            .index_of(mid)
            .ok_or_else(|| Error::UnknownSection(mid.to_string()))?;
        Ok(&mut self.sections[index])
    }

    /// Mids of every non-closed section, in section order
    pub fn bundle_mids(&self) -> Vec<String> {
        self.sections
            .iter()
            .filter(|section| !section.is_closed())
            .map(|section| section.mid().to_string())
            .collect()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut MediaSection> {
        self.sections.iter_mut()
    }
}

/// The synthesized description of the remote endpoint
#[derive(Debug, Clone)]
pub struct RemoteSdp {
    ice_parameters: IceParameters,
    ice_candidates: Vec<IceCandidate>,
    dtls_parameters: DtlsParameters,
    sctp_parameters: Option<SctpParameters>,
    origin: Origin,
    ice_lite: bool,
    fingerprint: Fingerprint,
    registry: SectionRegistry,
}

impl RemoteSdp {
    /// Create an empty remote description
    ///
    /// When several fingerprints are given the last one is announced.
    pub fn new(
        ice_parameters: IceParameters,
        ice_candidates: Vec<IceCandidate>,
        dtls_parameters: DtlsParameters,
        sctp_parameters: Option<SctpParameters>,
        config: &RemoteSdpConfig,
    ) -> Result<Self> {
        let last = dtls_parameters
            .fingerprints
            .last()
            .ok_or_else(|| Error::invalid_parameters("DTLS parameters carry no fingerprint"))?;
        let fingerprint = Fingerprint {
            hash_type: last.algorithm.clone(),
            hash: last.value.clone(),
        };

        Ok(Self {
            ice_lite: ice_parameters.ice_lite,
            ice_parameters,
            ice_candidates,
            dtls_parameters,
            sctp_parameters,
            origin: Origin {
                username: config.origin_username.clone(),
                session_id: config.session_id,
                session_version: 0,
                net_type: "IN".to_string(),
                ip_ver: 4,
                address: "0.0.0.0".to_string(),
            },
            fingerprint,
            registry: SectionRegistry::new(),
        })
    }

    fn transport(&self) -> SectionTransport<'_> {
        SectionTransport {
            ice_parameters: &self.ice_parameters,
            ice_candidates: &self.ice_candidates,
            dtls_parameters: &self.dtls_parameters,
            sctp_parameters: self.sctp_parameters.as_ref(),
        }
    }

    pub fn update_ice_parameters(&mut self, ice_parameters: IceParameters) {
        debug!("Updating remote ICE parameters");
        if ice_parameters.ice_lite {
            self.ice_lite = true;
        }
        for section in self.registry.iter_mut() {
            section.set_ice_parameters(&ice_parameters);
        }
        self.ice_parameters = ice_parameters;
    }

    pub fn update_dtls_role(&mut self, role: DtlsRole) {
        debug!("Updating remote DTLS role to {}", role);
        self.dtls_parameters.role = role;
        for section in self.registry.iter_mut() {
            section.set_dtls_role(role);
        }
    }

    pub fn next_section_slot(&self) -> SectionSlot {
        self.registry.next_slot()
    }

    /// Answer a section the local engine offered for sending
    pub fn create_answer_section(
        &mut self,
        offer_media: &MediaObject,
        slot: &SectionSlot,
        offer_rtp_parameters: &mut RtpParameters,
        answer_rtp_parameters: &RtpParameters,
        codec_options: Option<&CodecOptions>,
    ) -> Result<SectionChange> {
        let section = MediaSection::answer(
            &self.transport(),
            offer_media,
            Some(AnswerRtp {
                offer: offer_rtp_parameters,
                answer: answer_rtp_parameters,
                codec_options,
            }),
        )?;
        debug!("Adding answer section for mid {} at index {}", section.mid(), slot.index);
        self.registry.insert(section, slot)
    }

    /// Answer the data channel section the local engine offered
    pub fn send_sctp_association(&mut self, offer_media: &MediaObject) -> Result<SectionChange> {
        let section = MediaSection::answer(&self.transport(), offer_media, None)?;
        debug!("Adding SCTP answer section for mid {}", section.mid());
        Ok(self.registry.push(section))
    }

    /// Offer a data channel section to the local engine
    pub fn recv_sctp_association(&mut self) -> Result<SectionChange> {
        let section =
            MediaSection::offer(&self.transport(), DATACHANNEL_MID, MediaKind::Application, None)?;
        debug!("Adding SCTP offer section");
        Ok(self.registry.push(section))
    }

    /// Offer a media section the local engine will receive on
    ///
    /// A mid that names a closed section takes that section's slot back;
    /// any other mid goes to the first closed slot, or the end.
    pub fn create_offer_section(
        &mut self,
        mid: &str,
        kind: MediaKind,
        rtp_parameters: &RtpParameters,
        stream_id: &str,
        track_id: &str,
    ) -> Result<SectionChange> {
        let slot = self.registry.slot_for_mid(mid)?;
        let section = MediaSection::offer(
            &self.transport(),
            mid,
            kind,
            Some(OfferRtp {
                parameters: rtp_parameters,
                stream_id,
                track_id,
            }),
        )?;

        debug!("Adding offer section for mid {} at index {}", mid, slot.index);
        self.registry.insert(section, &slot)
    }

    /// Close a section; the bundle anchor is only disabled
    pub fn close_section(&mut self, mid: &str) -> Result<()> {
        debug!("Closing section {}", mid);
        self.registry.close(mid)
    }

    /// Undo a section change made by a failed negotiation
    pub fn revert(&mut self, change: SectionChange) {
        debug!("Reverting section change at index {}", change.index());
        self.registry.revert(change);
    }

    pub fn section(&self, mid: &str) -> Option<&MediaSection> {
        self.registry.index_of(mid).and_then(|index| self.registry.get(index))
    }

    pub fn registry(&self) -> &SectionRegistry {
        &self.registry
    }

    pub fn bundle_mids(&self) -> Vec<String> {
        self.registry.bundle_mids()
    }

    pub fn session_version(&self) -> u64 {
        self.origin.session_version
    }

    /// The current document, without bumping the session version
    pub fn document(&self) -> SessionDescription {
        SessionDescription {
            version: 0,
            origin: self.origin.clone(),
            name: "-".to_string(),
            timing: Timing::default(),
            ice_lite: self.ice_lite,
            fingerprint: Some(self.fingerprint.clone()),
            msid_semantic: Some(MsidSemantic {
                semantic: "WMS".to_string(),
                token: "*".to_string(),
            }),
            groups: vec![Group {
                semantics: "BUNDLE".to_string(),
                mids: self.registry.bundle_mids(),
            }],
            attributes: Vec::new(),
            lines: Vec::new(),
            media: self
                .registry
                .sections()
                .iter()
                .map(|section| section.media().clone())
                .collect(),
        }
    }

    /// Emit the description text; every call yields a newer session version
    pub fn serialize(&mut self) -> String {
        self.origin.session_version += 1;
        write_sdp(&self.document())
    }
}
