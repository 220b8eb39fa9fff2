//! Handler configuration
//!
//! # Usage
//!
//! ```rust
//! use rtcbridge_handler_core::config::HandlerConfig;
//!
//! let config = HandlerConfig::new()
//!     .with_num_sctp_streams(256, 256)
//!     .with_origin_username("edge-01");
//!
//! assert_eq!(config.num_sctp_streams.mis, 256);
//! assert!(config.validate().is_ok());
//! ```

use rtcbridge_sdp_core::{NumSctpStreams, RemoteSdpConfig, SctpCapabilities};
use serde::{Deserialize, Serialize};

use crate::error::{HandlerError, Result};

/// Outgoing SCTP streams announced by default
pub const SCTP_NUM_STREAMS_OS: u16 = 1024;

/// Incoming SCTP streams accepted by default; also the stream id modulus
pub const SCTP_NUM_STREAMS_MIS: u16 = 1024;

/// Configuration shared by the send and receive handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HandlerConfig {
    /// SCTP stream counts; `mis` bounds the data channel stream ids
    pub num_sctp_streams: NumSctpStreams,
    /// Origin line settings of the synthesized remote description
    pub remote_sdp: RemoteSdpConfig,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            num_sctp_streams: NumSctpStreams {
                os: SCTP_NUM_STREAMS_OS,
                mis: SCTP_NUM_STREAMS_MIS,
            },
            remote_sdp: RemoteSdpConfig::default(),
        }
    }
}

impl HandlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the announced SCTP stream counts
    pub fn with_num_sctp_streams(mut self, os: u16, mis: u16) -> Self {
        self.num_sctp_streams = NumSctpStreams { os, mis };
        self
    }

    /// Set the complete remote description settings
    pub fn with_remote_sdp(mut self, remote_sdp: RemoteSdpConfig) -> Self {
        self.remote_sdp = remote_sdp;
        self
    }

    /// Set the username of the synthesized origin line
    pub fn with_origin_username(mut self, username: impl Into<String>) -> Self {
        self.remote_sdp.origin_username = username.into();
        self
    }

    /// Set the session id of the synthesized origin line
    pub fn with_session_id(mut self, session_id: u64) -> Self {
        self.remote_sdp.session_id = session_id;
        self
    }

    /// Check the configuration for values the handlers cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.num_sctp_streams.os == 0 || self.num_sctp_streams.mis == 0 {
            return Err(HandlerError::invalid_argument(
                "SCTP stream counts must be greater than zero",
            ));
        }
        if self.remote_sdp.origin_username.trim().is_empty()
            || self.remote_sdp.origin_username.contains(char::is_whitespace)
        {
            return Err(HandlerError::invalid_argument(
                "origin username must be a single non-empty token",
            ));
        }
        Ok(())
    }

    /// SCTP capabilities announced to the remote endpoint
    pub fn sctp_capabilities(&self) -> SctpCapabilities {
        SctpCapabilities {
            num_streams: self.num_sctp_streams,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HandlerConfig::default();
        assert_eq!(config.num_sctp_streams.os, 1024);
        assert_eq!(config.num_sctp_streams.mis, 1024);
        assert_eq!(config.remote_sdp.origin_username, "rtcbridge");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_streams() {
        let config = HandlerConfig::new().with_num_sctp_streams(1024, 0);
        assert!(matches!(
            config.validate(),
            Err(HandlerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_username() {
        let config = HandlerConfig::new().with_origin_username("two words");
        assert!(config.validate().is_err(), "origin username is a single token");
    }

    #[test]
    fn test_config_json() {
        let json = serde_json::to_value(HandlerConfig::default()).unwrap();
        assert_eq!(json["numSctpStreams"]["OS"], 1024);
        assert_eq!(json["remoteSdp"]["originUsername"], "rtcbridge");

        let config: HandlerConfig =
            serde_json::from_str(r#"{"numSctpStreams":{"OS":16,"MIS":8}}"#).unwrap();
        assert_eq!(config.num_sctp_streams.mis, 8);
        assert_eq!(config.remote_sdp, RemoteSdpConfig::default());
    }
}
