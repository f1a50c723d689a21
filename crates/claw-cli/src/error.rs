//! CLI error types.

use std::fmt;

use claw_link::LinkError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Gateway connection failed.
    Connection(String),
    /// Invalid configuration.
    Config(String),
    /// The gateway rejected a call.
    Command(String),
    /// Output formatting error.
    Format(String),
    /// Invalid argument.
    InvalidArgument(String),
    /// IO error.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "connection error: {msg}"),
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Command(msg) => write!(f, "command error: {msg}"),
            Self::Format(msg) => write!(f, "format error: {msg}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<LinkError> for CliError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Config(msg) | LinkError::Settings(msg) => Self::Config(msg),
            LinkError::Gateway { .. } | LinkError::Timeout { .. } => Self::Command(err.to_string()),
            LinkError::Protocol(msg) => Self::Format(msg),
            other => Self::Connection(other.to_string()),
        }
    }
}
