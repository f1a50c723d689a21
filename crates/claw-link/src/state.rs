//! Connection state types.

use std::fmt;

use serde::Serialize;

/// Lifecycle state of the gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No transport. Initial state, and terminal after `stop()`.
    Disconnected,
    /// Transport opening or handshake in flight.
    Connecting,
    /// Handshake acknowledged; calls and events flow.
    Connected,
    /// The last attempt failed during the handshake; a retry is scheduled.
    Error,
}

impl ConnectionState {
    /// State to enter when the transport goes away unexpectedly.
    ///
    /// A drop before the handshake completed counts as a failed attempt.
    #[must_use]
    pub const fn after_link_lost(self) -> Self {
        match self {
            Self::Connecting | Self::Error => Self::Error,
            Self::Connected | Self::Disconnected => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ConnectionState::Connected, ConnectionState::Disconnected ; "drop while connected")]
    #[test_case(ConnectionState::Connecting, ConnectionState::Error ; "drop during handshake")]
    #[test_case(ConnectionState::Error, ConnectionState::Error ; "already failed")]
    #[test_case(ConnectionState::Disconnected, ConnectionState::Disconnected ; "already down")]
    fn test_after_link_lost(from: ConnectionState, to: ConnectionState) {
        assert_eq!(from.after_link_lost(), to);
    }

    #[test]
    fn test_display_and_serialize_agree() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Error,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }
}
