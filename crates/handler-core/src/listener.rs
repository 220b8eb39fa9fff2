//! Upward callbacks into the signaling layer

use async_trait::async_trait;
use rtcbridge_sdp_core::DtlsParameters;
use serde::{Deserialize, Serialize};

/// Error type a listener may return when it refuses the transport parameters
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// ICE connection state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

/// Receives transport level events from a handler
///
/// `on_connect` is awaited exactly once per handler, the first time local
/// DTLS parameters become known. Returning an error aborts the negotiation
/// that triggered it.
#[async_trait]
pub trait HandlerListener: Send + Sync {
    async fn on_connect(&self, dtls_parameters: DtlsParameters) -> Result<(), ListenerError>;

    fn on_connection_state_change(&self, state: IceConnectionState);
}
