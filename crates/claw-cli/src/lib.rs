//! # claw-cli
//!
//! Command-line client for a claw gateway.
//!
//! Provides commands for:
//! - Gateway status and heartbeat health
//! - One-shot method calls
//! - Streaming pushed events
//!
//! # Architecture
//!
//! Every command resolves a [`claw_link::ConnectionConfig`] (flags, then the
//! settings endpoint, then the config file), opens a
//! [`claw_link::GatewayConnection`], waits for the handshake, does its work,
//! and stops the connection.
//!
//! ```text
//! ┌───────────┐   req / res / event   ┌─────────────────┐
//! │  claw-cli │◄─────────────────────►│  claw gateway   │
//! └───────────┘      (WebSocket)      └─────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::{CallArgs, Cli, Commands, Format, WatchArgs};
pub use error::CliError;
pub use output::OutputFormat;
