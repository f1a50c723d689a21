//! Event and health streaming.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use claw_link::{ConnectionConfig, EventFrame, GatewayConnection, HealthSnapshot, LinkEvent};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::cli::WatchArgs;
use crate::commands::establish;
use crate::error::CliError;
use crate::output::{EventLine, OutputFormat};

/// Watch command executor.
pub struct WatchCommand {
    config: ConnectionConfig,
    connect_timeout: Duration,
}

impl WatchCommand {
    /// Create a new watch command.
    #[must_use]
    pub const fn new(config: ConnectionConfig, connect_timeout: Duration) -> Self {
        Self {
            config,
            connect_timeout,
        }
    }

    /// Print events (or health snapshots) until `shutdown` resolves or
    /// `args.count` lines have been written.
    ///
    /// The connection keeps reconnecting in the background; outages are
    /// logged but do not end the watch.
    ///
    /// # Errors
    ///
    /// Returns an error if the first handshake fails or writing fails.
    pub async fn execute<W, S>(
        self,
        writer: &mut W,
        format: &OutputFormat,
        args: &WatchArgs,
        shutdown: S,
    ) -> Result<(), CliError>
    where
        W: Write,
        S: Future<Output = ()>,
    {
        if args.count == Some(0) {
            return Ok(());
        }

        let conn = GatewayConnection::new(self.config)?;
        // Subscribe before starting so nothing pushed right after the
        // handshake is missed.
        let (_events_sub, mut events) = conn.event_stream();
        let (_health_sub, mut health) = conn.health_stream();
        let (_lifecycle_sub, mut lifecycle) = conn.lifecycle_stream();
        establish(&conn, self.connect_timeout).await?;

        let result = Self::pump(
            writer,
            format,
            args,
            shutdown,
            &mut events,
            &mut health,
            &mut lifecycle,
        )
        .await;
        conn.stop().await?;
        result
    }

    async fn pump<W, S>(
        writer: &mut W,
        format: &OutputFormat,
        args: &WatchArgs,
        shutdown: S,
        events: &mut UnboundedReceiver<EventFrame>,
        health: &mut UnboundedReceiver<HealthSnapshot>,
        lifecycle: &mut UnboundedReceiver<LinkEvent>,
    ) -> Result<(), CliError>
    where
        W: Write,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut written = 0usize;

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!(written, "watch interrupted");
                    break;
                }
                Some(frame) = events.recv(), if !args.health => {
                    if !args.events.is_empty() && !args.events.contains(&frame.event) {
                        continue;
                    }
                    format.write_line(writer, &EventLine::now(frame))?;
                    written += 1;
                }
                Some(snapshot) = health.recv(), if args.health => {
                    format.write_line(writer, &snapshot)?;
                    written += 1;
                }
                Some(event) = lifecycle.recv() => match event {
                    LinkEvent::Connected { conn_id, .. } => {
                        info!(conn_id = %conn_id, "gateway connected");
                    }
                    LinkEvent::Disconnected { cause } => {
                        warn!(cause = %cause, "gateway disconnected");
                    }
                    LinkEvent::Reconnecting { attempt, delay } => {
                        info!(attempt, delay = ?delay, "reconnecting to gateway");
                    }
                },
                else => break,
            }

            if args.count.is_some_and(|limit| written >= limit) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use crate::commands::test_gateway::TestGateway;
    use serde_json::{Value, json};

    fn args(events: &[&str], count: Option<usize>) -> WatchArgs {
        WatchArgs {
            health: false,
            events: events.iter().map(|e| (*e).to_string()).collect(),
            count,
        }
    }

    fn config(url: String) -> ConnectionConfig {
        ConnectionConfig::new(url).with_handshake_grace(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn watch_prints_filtered_events_in_order() {
        let gateway = TestGateway::bind().await;
        let url = gateway.url();
        let server = tokio::spawn(async move {
            let mut session = gateway.accept_connected().await;
            session.push("chat", json!({"n": 1}), 1).await;
            session.push("presence", json!({}), 2).await;
            session.push("chat", json!({"n": 2}), 3).await;
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let mut buf = Vec::new();
        WatchCommand::new(config(url), Duration::from_secs(5))
            .execute(
                &mut buf,
                &OutputFormat::new(Format::Json),
                &args(&["chat"], Some(2)),
                std::future::pending(),
            )
            .await
            .expect("watch should finish after two events");
        server.abort();

        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).expect("one JSON document per line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["payload"]["n"], 1);
        assert_eq!(lines[1]["payload"]["n"], 2);
        assert_eq!(lines[1]["seq"], 3);
    }

    #[tokio::test]
    async fn watch_stops_on_shutdown_signal() {
        let gateway = TestGateway::bind().await;
        let url = gateway.url();
        let server = tokio::spawn(async move {
            let _session = gateway.accept_connected().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut buf = Vec::new();
        WatchCommand::new(config(url), Duration::from_secs(5))
            .execute(
                &mut buf,
                &OutputFormat::default(),
                &args(&[], None),
                tokio::time::sleep(Duration::from_millis(200)),
            )
            .await
            .expect("watch should stop cleanly");
        server.abort();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn watch_zero_count_returns_immediately() {
        let mut buf = Vec::new();
        WatchCommand::new(config("ws://127.0.0.1:9".into()), Duration::from_secs(5))
            .execute(
                &mut buf,
                &OutputFormat::default(),
                &args(&[], Some(0)),
                std::future::pending(),
            )
            .await
            .expect("nothing to do");
        assert!(buf.is_empty());
    }
}
