//! Owner for the application's single active connection.

use tokio::sync::Mutex;
use tracing::info;

use crate::config::ConnectionConfig;
use crate::connection::GatewayConnection;
use crate::error::LinkResult;

/// Holds at most one live [`GatewayConnection`].
///
/// Replacing the connection stops the previous one before the new one
/// starts, so two connections never run side by side.
#[derive(Debug, Default)]
pub struct ConnectionSlot {
    current: Mutex<Option<GatewayConnection>>,
}

impl ConnectionSlot {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the current connection (if any), then create and start a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid. The previous connection is
    /// left stopped and the slot empty in that case.
    pub async fn replace(&self, config: ConnectionConfig) -> LinkResult<GatewayConnection> {
        let mut current = self.current.lock().await;
        if let Some(old) = current.take() {
            info!(url = %old.url(), "replacing gateway connection");
            // A driver that already shut down has nothing left to stop.
            let _ = old.stop().await;
        }

        let conn = GatewayConnection::new(config)?;
        conn.start().await?;
        *current = Some(conn.clone());
        Ok(conn)
    }

    /// The active connection, if any.
    pub async fn current(&self) -> Option<GatewayConnection> {
        self.current.lock().await.clone()
    }

    /// Stop and remove the active connection.
    pub async fn clear(&self) -> LinkResult<()> {
        let old = self.current.lock().await.take();
        match old {
            Some(conn) => conn.stop().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConnectionState;

    async fn silent_gateway() -> (tokio::net::TcpListener, String) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    #[tokio::test]
    async fn test_replace_stops_previous() {
        let (_a, url_a) = silent_gateway().await;
        let (_b, url_b) = silent_gateway().await;
        let slot = ConnectionSlot::new();

        let first = slot.replace(ConnectionConfig::new(url_a)).await.unwrap();
        assert_eq!(first.state(), ConnectionState::Connecting);

        let second = slot.replace(ConnectionConfig::new(url_b.clone())).await.unwrap();
        assert_eq!(first.state(), ConnectionState::Disconnected);
        assert_eq!(second.state(), ConnectionState::Connecting);
        assert_eq!(slot.current().await.unwrap().url(), url_b);

        slot.clear().await.unwrap();
        assert_eq!(second.state(), ConnectionState::Disconnected);
        assert!(slot.current().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_replacement_leaves_slot_empty() {
        let (_a, url_a) = silent_gateway().await;
        let slot = ConnectionSlot::new();
        let first = slot.replace(ConnectionConfig::new(url_a)).await.unwrap();

        assert!(slot.replace(ConnectionConfig::new("")).await.is_err());
        assert_eq!(first.state(), ConnectionState::Disconnected);
        assert!(slot.current().await.is_none());
    }

    #[tokio::test]
    async fn test_clear_empty_slot() {
        ConnectionSlot::new().clear().await.unwrap();
    }
}
