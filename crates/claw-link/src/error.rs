//! Error types for claw-link.

use std::time::Duration;

use claw_proto::ProtoError;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by the gateway link.
///
/// Everything except [`LinkError::Gateway`] is raised locally: the gateway
/// never saw the call, or the connection dropped before it answered.
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    /// The transport is not open; the call never reached the wire.
    #[error("gateway not connected")]
    NotConnected,

    /// The connection closed while the call was pending.
    #[error("gateway connection closed")]
    ConnectionClosed,

    /// No terminal response arrived within the request timeout.
    #[error("request '{method}' timed out after {timeout:?}")]
    Timeout {
        /// Method that timed out.
        method: String,
        /// Configured timeout.
        timeout: Duration,
    },

    /// The gateway answered with `ok: false`.
    #[error("gateway error {code}: {message}")]
    Gateway {
        /// Machine-readable error code.
        code: String,
        /// Server-supplied message.
        message: String,
        /// Free-form details.
        details: Option<Value>,
    },


    /// A frame could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The settings endpoint could not be queried.
    #[error("settings request failed: {0}")]
    Settings(String),

    /// The connection task is gone.
    #[error("gateway connection has shut down")]
    Shutdown,
}

impl LinkError {
    /// Whether the error was produced locally rather than reported by the gateway.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        !matches!(self, Self::Gateway { .. })
    }
}

impl From<ProtoError> for LinkError {
    fn from(err: ProtoError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<reqwest::Error> for LinkError {
    fn from(err: reqwest::Error) -> Self {
        Self::Settings(err.to_string())
    }
}

/// Result type for link operations.
pub type LinkResult<T> = Result<T, LinkError>;
