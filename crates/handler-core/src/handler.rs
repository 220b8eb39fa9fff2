//! State and operations shared by the send and receive handlers
//!
//! [`HandlerCore`] owns the synthesized remote description, the local id to
//! transceiver associations, the SCTP stream id allocator and the
//! transport-ready flag. The direction specific handlers wrap it and expose
//! the shared operations through the [`Handler`] trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rtcbridge_sdp_core::utils::extract_dtls_parameters;
use rtcbridge_sdp_core::{
    parse_sdp, DtlsParameters, DtlsRole, IceCandidate, IceParameters, RemoteSdp,
    SctpParameters, SctpStreamParameters, SessionDescription,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::allocator::SctpStreamIdAllocator;
use crate::config::HandlerConfig;
use crate::engine::{
    DataChannelHandle, DataChannelInit, StatsTarget, TransceiverId, TransportEngine,
};
use crate::error::{HandlerError, Result};
use crate::listener::{HandlerListener, IceConnectionState};

/// Transport parameters the remote endpoint announced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportParameters {
    pub ice_parameters: IceParameters,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: DtlsParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sctp_parameters: Option<SctpParameters>,
}

/// A negotiated data channel
#[derive(Debug, Clone, PartialEq)]
pub struct DataChannel {
    /// Local id; the SCTP stream id in decimal
    pub local_id: String,
    pub channel: DataChannelHandle,
    pub sctp_stream_parameters: SctpStreamParameters,
}

#[derive(Debug, Clone, Copy)]
struct Association {
    transceiver: TransceiverId,
    closed: bool,
}

/// Shared negotiation state of one transport
pub struct HandlerCore {
    pub(crate) engine: Arc<dyn TransportEngine>,
    listener: Arc<dyn HandlerListener>,
    pub(crate) remote_sdp: RemoteSdp,
    config: HandlerConfig,
    transport_ready: bool,
    associations: HashMap<String, Association>,
    sctp_stream_ids: SctpStreamIdAllocator,
    pub(crate) has_data_channel_section: bool,
}

impl HandlerCore {
    pub(crate) fn new(
        engine: Arc<dyn TransportEngine>,
        listener: Arc<dyn HandlerListener>,
        transport: TransportParameters,
        config: HandlerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let remote_sdp = RemoteSdp::new(
            transport.ice_parameters,
            transport.ice_candidates,
            transport.dtls_parameters,
            transport.sctp_parameters,
            &config.remote_sdp,
        )?;

        Ok(Self {
            engine,
            listener,
            remote_sdp,
            sctp_stream_ids: SctpStreamIdAllocator::new(config.num_sctp_streams.mis),
            config,
            transport_ready: false,
            associations: HashMap::new(),
            has_data_channel_section: false,
        })
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn remote_sdp(&self) -> &RemoteSdp {
        &self.remote_sdp
    }

    /// Whether the local DTLS parameters were handed to the listener
    pub fn is_transport_ready(&self) -> bool {
        self.transport_ready
    }

    /// Number of local ids ever associated, stopped ones included
    pub fn association_count(&self) -> usize {
        self.associations.len()
    }

    /// Transceiver of an open association
    pub fn transceiver(&self, local_id: &str) -> Option<TransceiverId> {
        self.associations
            .get(local_id)
            .filter(|association| !association.closed)
            .map(|association| association.transceiver)
    }

    pub(crate) fn is_open(&self, local_id: &str) -> bool {
        self.transceiver(local_id).is_some()
    }

    pub(crate) fn require_transceiver(&self, local_id: &str) -> Result<TransceiverId> {
        self.transceiver(local_id).ok_or_else(|| {
            HandlerError::invalid_state(format!(
                "associated transceiver not found for local id {}",
                local_id
            ))
        })
    }

    pub(crate) fn associate(&mut self, local_id: &str, transceiver: TransceiverId) {
        self.associations.insert(
            local_id.to_string(),
            Association {
                transceiver,
                closed: false,
            },
        );
    }

    pub(crate) fn mark_closed(&mut self, local_id: &str) {
        if let Some(association) = self.associations.get_mut(local_id) {
            association.closed = true;
        }
    }

    /// Mid the engine gave a transceiver
    pub(crate) fn transceiver_mid(&self, transceiver: TransceiverId) -> Result<String> {
        self.engine.transceiver_mid(transceiver).ok_or_else(|| {
            HandlerError::invariant(format!("{} has no mid", transceiver))
        })
    }

    /// Parse the engine's applied local description
    pub(crate) fn local_document(&self) -> Result<SessionDescription> {
        let text = self
            .engine
            .local_description()
            .ok_or_else(|| HandlerError::invariant("no local description applied"))?;
        Ok(parse_sdp(&text)?)
    }

    /// Hand the local DTLS parameters to the listener
    ///
    /// The remote description takes the opposite role. Once the listener
    /// accepted, the exchange is never repeated.
    pub(crate) async fn setup_transport(
        &mut self,
        local_role: DtlsRole,
        local_doc: &SessionDescription,
    ) -> Result<()> {
        let mut dtls_parameters = extract_dtls_parameters(local_doc)?;
        dtls_parameters.role = local_role;

        self.remote_sdp.update_dtls_role(local_role.opposite());

        debug!("Handing local DTLS parameters to the listener (role {})", local_role);
        self.listener
            .on_connect(dtls_parameters)
            .await
            .map_err(|e| HandlerError::Listener(e.to_string()))?;

        self.transport_ready = true;
        info!("Transport is ready, local DTLS role {}", local_role);
        Ok(())
    }

    /// Create a negotiated data channel on the next SCTP stream id
    ///
    /// The id is only consumed when the engine created the channel.
    pub(crate) fn open_data_channel(
        &mut self,
        label: &str,
        mut init: DataChannelInit,
    ) -> Result<DataChannel> {
        let stream_id = self.sctp_stream_ids.peek();

        let mut sctp_stream_parameters = SctpStreamParameters {
            stream_id,
            ordered: init.ordered,
            max_packet_life_time: init.max_packet_life_time,
            max_retransmits: init.max_retransmits,
            label: Some(label.to_string()),
            protocol: Some(init.protocol.clone()),
        };
        sctp_stream_parameters
            .validate()
            .map_err(|e| HandlerError::invalid_argument(e.to_string()))?;

        init.negotiated = true;
        init.id = Some(stream_id);
        init.ordered = sctp_stream_parameters.ordered;

        let channel = self.engine.create_data_channel(label, &init)?;
        self.sctp_stream_ids.advance();
        debug!("Created data channel {} on stream {}", label, stream_id);

        Ok(DataChannel {
            local_id: stream_id.to_string(),
            channel,
            sctp_stream_parameters,
        })
    }

    pub fn close(&self) {
        debug!("Closing transport engine");
        self.engine.close();
    }

    pub async fn transport_stats(&self) -> Result<serde_json::Value> {
        Ok(self.engine.stats(StatsTarget::Transport).await?)
    }

    pub fn update_ice_servers(&self, uris: &[String]) -> Result<()> {
        debug!("Updating ICE servers ({} entries)", uris.len());
        Ok(self.engine.set_ice_servers(uris)?)
    }

    pub fn on_ice_connection_change(&self, state: IceConnectionState) {
        debug!("ICE connection state changed to {:?}", state);
        self.listener.on_connection_state_change(state);
    }
}

/// Operations common to both negotiation directions
#[async_trait]
pub trait Handler: Send + Sync {
    fn core(&self) -> &HandlerCore;

    /// Apply new remote ICE credentials and renegotiate
    async fn restart_ice(&mut self, ice_parameters: IceParameters) -> Result<()>;

    /// Close the underlying engine
    fn close(&self) {
        self.core().close();
    }

    async fn get_transport_stats(&self) -> Result<serde_json::Value> {
        self.core().transport_stats().await
    }

    fn update_ice_servers(&self, uris: &[String]) -> Result<()> {
        self.core().update_ice_servers(uris)
    }

    /// Forward an engine ICE state change to the listener
    fn on_ice_connection_change(&self, state: IceConnectionState) {
        self.core().on_ice_connection_change(state);
    }
}
