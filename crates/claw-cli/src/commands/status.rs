//! Gateway status command implementation.
//!
//! Connects, reports what the gateway announced in its handshake along with
//! the current heartbeat view, then disconnects.

use std::io::Write;
use std::time::Duration;

use claw_link::{ConnectionConfig, GatewayConnection};
use tracing::warn;

use crate::commands::open;
use crate::error::CliError;
use crate::output::{GatewayStatus, OutputFormat, is_degraded};

/// Status command executor.
pub struct StatusCommand {
    config: ConnectionConfig,
    connect_timeout: Duration,
}

impl StatusCommand {
    /// Create a new status command.
    #[must_use]
    pub const fn new(config: ConnectionConfig, connect_timeout: Duration) -> Self {
        Self {
            config,
            connect_timeout,
        }
    }

    /// Execute the status command.
    ///
    /// # Errors
    ///
    /// Returns an error if connection to gateway fails or output fails.
    pub async fn execute<W: Write>(
        self,
        writer: &mut W,
        format: &OutputFormat,
    ) -> Result<(), CliError> {
        let conn = open(self.config, self.connect_timeout).await?;
        let result = Self::report(&conn, writer, format).await;
        conn.stop().await?;
        result
    }

    async fn report<W: Write>(
        conn: &GatewayConnection,
        writer: &mut W,
        format: &OutputFormat,
    ) -> Result<(), CliError> {
        let hello = conn
            .hello()
            .ok_or_else(|| CliError::Connection("gateway connection dropped".to_string()))?;
        let health = conn.health().await?;
        if is_degraded(health.state) {
            warn!(state = %health.state, "gateway link degraded while reading status");
        }
        format.write(writer, &GatewayStatus::new(conn.url(), &hello, health))
    }
}
