//! Lifecycle events emitted by the gateway connection.

use std::fmt;
use std::time::Duration;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectCause {
    /// The gateway or network closed the transport.
    Closed {
        /// WebSocket close code, if one was received.
        code: Option<u16>,
        /// Close reason text.
        reason: String,
    },
    /// The transport could not be opened.
    ConnectFailed(String),
    /// The gateway rejected the handshake or sent a malformed reply.
    HandshakeFailed(String),
    /// Heartbeats stopped arriving.
    Stale,
    /// `force_reconnect()` tore the session down.
    ManualReconnect,
    /// `stop()` was called.
    Stopped,
}

impl DisconnectCause {
    /// Whether the cause came from the gateway refusing the client.
    ///
    /// Callers that consider this terminal (for example a revoked token) can
    /// call `stop()` from their lifecycle observer.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::HandshakeFailed(_))
    }
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed {
                code: Some(code),
                reason,
            } if !reason.is_empty() => write!(f, "closed ({code}): {reason}"),
            Self::Closed { code: Some(code), .. } => write!(f, "closed ({code})"),
            Self::Closed { code: None, .. } => write!(f, "closed"),
            Self::ConnectFailed(err) => write!(f, "connect failed: {err}"),
            Self::HandshakeFailed(err) => write!(f, "handshake failed: {err}"),
            Self::Stale => write!(f, "heartbeat missed"),
            Self::ManualReconnect => write!(f, "manual reconnect"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Connection lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Handshake acknowledged.
    Connected {
        /// Connection id assigned by the gateway.
        conn_id: String,
        /// Gateway version.
        server_version: String,
    },
    /// The session ended.
    Disconnected {
        /// What ended it.
        cause: DisconnectCause,
    },
    /// A reconnect has been scheduled.
    Reconnecting {
        /// Consecutive attempt number, starting at 1.
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(DisconnectCause::Closed { code: Some(1006), reason: String::new() }, "closed (1006)" ; "code only")]
    #[test_case(DisconnectCause::Closed { code: Some(4000), reason: "stale connection".into() }, "closed (4000): stale connection" ; "code and reason")]
    #[test_case(DisconnectCause::Closed { code: None, reason: String::new() }, "closed" ; "bare")]
    #[test_case(DisconnectCause::Stale, "heartbeat missed" ; "stale")]
    #[test_case(DisconnectCause::HandshakeFailed("unauthorized".into()), "handshake failed: unauthorized" ; "handshake")]
    fn test_cause_display(cause: DisconnectCause, expected: &str) {
        assert_eq!(cause.to_string(), expected);
    }

    #[test]
    fn test_only_handshake_failures_are_rejections() {
        assert!(DisconnectCause::HandshakeFailed("x".into()).is_rejection());
        assert!(!DisconnectCause::Stale.is_rejection());
        assert!(!DisconnectCause::ConnectFailed("refused".into()).is_rejection());
    }

    #[test]
    fn test_reconnecting_event() {
        let event = LinkEvent::Reconnecting {
            attempt: 3,
            delay: Duration::from_secs(4),
        };
        if let LinkEvent::Reconnecting { attempt, delay } = event {
            assert_eq!(attempt, 3);
            assert_eq!(delay, Duration::from_secs(4));
        } else {
            panic!("expected Reconnecting");
        }
    }
}
