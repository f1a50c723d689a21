//! # claw-link
//!
//! Session-managed WebSocket link to a claw gateway.
//!
//! A [`GatewayConnection`] owns one transport at a time. It performs the
//! `connect` handshake (answering a challenge, or speaking first after a
//! short grace window), correlates concurrent requests with their
//! responses, fans push events out to observers, watches the gateway's
//! heartbeat, and reconnects with exponential backoff until stopped.
//!
//! ```no_run
//! use claw_link::{ConnectionConfig, GatewayConnection};
//!
//! # async fn demo() -> claw_link::LinkResult<()> {
//! let conn = GatewayConnection::new(
//!     ConnectionConfig::new("ws://127.0.0.1:18789").with_token("secret"),
//! )?;
//! let _events = conn.subscribe(|event| println!("{}", event.event));
//! conn.start().await?;
//! conn.connected().await?;
//! let sessions = conn.request("sessions.list", None).await?;
//! println!("{sessions}");
//! conn.stop().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod observers;
pub mod pending;
pub mod reconnect;
pub mod settings;
pub mod slot;
pub mod state;
mod transport;

pub use config::ConnectionConfig;
pub use connection::GatewayConnection;
pub use error::{LinkError, LinkResult};
pub use events::{DisconnectCause, LinkEvent};
pub use heartbeat::{HealthSnapshot, HeartbeatTracker};
pub use observers::{ObserverSet, Subscription};
pub use reconnect::{Backoff, ReconnectConfig, calculate_backoff};
pub use settings::{GatewaySettings, SettingsClient};
pub use slot::ConnectionSlot;
pub use state::ConnectionState;

pub use claw_proto::{EventFrame, HelloOk, LinkCloseCode};
