//! Close codes used when the client tears the connection down itself.

use std::fmt;

/// Reason the client closed the connection.
///
/// Codes in the 4000 range are application codes; they let the gateway's
/// logs tell a rejected handshake apart from a missed heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkCloseCode {
    /// Orderly shutdown or manual reconnect.
    Normal,
    /// The connect handshake was rejected or malformed.
    HandshakeFailed,
    /// No heartbeat arrived within the tolerance window.
    Stale,
}

impl LinkCloseCode {
    /// Numeric WebSocket close code.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::HandshakeFailed => 4008,
            Self::Stale => 4000,
        }
    }

    /// Close reason sent alongside the code.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Normal => "client closed",
            Self::HandshakeFailed => "connect failed",
            Self::Stale => "stale connection",
        }
    }

    /// Map a numeric code back, if it is one the client emits.
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::Normal),
            4008 => Some(Self::HandshakeFailed),
            4000 => Some(Self::Stale),
            _ => None,
        }
    }
}

impl fmt::Display for LinkCloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.reason())
    }
}
