//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`status`] - Gateway identity and heartbeat health
//! - [`call`] - One-shot method invocation
//! - [`watch`] - Event and health streaming

use std::time::Duration;

use claw_link::{ConnectionConfig, GatewayConnection, LinkEvent};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::CliError;

pub mod call;
pub mod status;
pub mod watch;

pub use call::CallCommand;
pub use status::StatusCommand;
pub use watch::WatchCommand;

/// Open a connection and wait for the handshake.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or [`establish`] fails.
pub async fn open(
    config: ConnectionConfig,
    connect_timeout: Duration,
) -> Result<GatewayConnection, CliError> {
    let conn = GatewayConnection::new(config)?;
    establish(&conn, connect_timeout).await?;
    Ok(conn)
}

/// Start `conn` and wait for its handshake.
///
/// Transport failures are retried with the connection's own backoff until
/// `connect_timeout` expires. A rejected handshake fails immediately, since
/// retrying with the same credentials will not help a one-shot command. On
/// failure the connection is stopped.
///
/// # Errors
///
/// Returns an error if the gateway rejects the handshake or no handshake
/// completes in time.
pub async fn establish(
    conn: &GatewayConnection,
    connect_timeout: Duration,
) -> Result<(), CliError> {
    let (_lifecycle_sub, mut lifecycle) = conn.lifecycle_stream();
    conn.start().await?;

    let deadline = Instant::now() + connect_timeout;
    let mut last_cause = None;
    let outcome = loop {
        let event = tokio::select! {
            event = lifecycle.recv() => event,
            () = tokio::time::sleep_until(deadline) => {
                let waited = format!("no handshake with {} within {connect_timeout:?}", conn.url());
                break Err(CliError::Connection(match &last_cause {
                    Some(cause) => format!("{waited} (last: {cause})"),
                    None => waited,
                }));
            }
        };
        match event {
            Some(LinkEvent::Connected {
                conn_id,
                server_version,
            }) => {
                debug!(conn_id = %conn_id, server_version = %server_version, "gateway ready");
                break Ok(());
            }
            Some(LinkEvent::Disconnected { cause }) if cause.is_rejection() => {
                break Err(CliError::Connection(cause.to_string()));
            }
            Some(LinkEvent::Disconnected { cause }) => {
                warn!(url = %conn.url(), cause = %cause, "gateway connection attempt failed");
                last_cause = Some(cause);
            }
            Some(LinkEvent::Reconnecting { attempt, delay }) => {
                debug!(attempt, delay = ?delay, "retrying gateway connection");
            }
            None => break Err(CliError::Connection("gateway connection shut down".to_string())),
        }
    };

    if outcome.is_err() {
        let _ = conn.stop().await;
    }
    outcome
}

/// Parse a `--params` argument as JSON.
///
/// # Errors
///
/// Returns [`CliError::InvalidArgument`] if the text is not valid JSON.
pub fn parse_params(raw: Option<&str>) -> Result<Option<serde_json::Value>, CliError> {
    raw.map(|text| {
        serde_json::from_str(text)
            .map_err(|e| CliError::InvalidArgument(format!("--params is not valid JSON: {e}")))
    })
    .transpose()
}

#[cfg(test)]
pub(crate) mod test_gateway {
    //! Minimal in-process gateway used by the command tests.

    use std::net::SocketAddr;

    use claw_proto::{ErrorShape, EventFrame, Frame, RequestFrame, ResponseFrame};
    use futures::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{WebSocketStream, accept_async};

    pub struct TestGateway {
        listener: TcpListener,
        addr: SocketAddr,
    }

    impl TestGateway {
        pub async fn bind() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            let addr = listener.local_addr().expect("local addr");
            Self { listener, addr }
        }

        pub fn url(&self) -> String {
            format!("ws://{}", self.addr)
        }

        /// Accept one client and answer its `connect` request.
        pub async fn accept_connected(&self) -> TestSession {
            let (stream, _) = self.listener.accept().await.expect("accept");
            let ws = accept_async(stream).await.expect("upgrade");
            let mut session = TestSession { ws };
            let req = session.recv_request().await;
            assert_eq!(req.method, "connect");
            session
                .send(ResponseFrame::success(&req.id, hello_payload()))
                .await;
            session
        }

        /// Accept one client and refuse its `connect` request.
        pub async fn accept_rejected(&self) -> TestSession {
            let (stream, _) = self.listener.accept().await.expect("accept");
            let ws = accept_async(stream).await.expect("upgrade");
            let mut session = TestSession { ws };
            let req = session.recv_request().await;
            session
                .send(ResponseFrame::failure(
                    &req.id,
                    ErrorShape::new("UNAUTHORIZED", "bad token"),
                ))
                .await;
            session
        }
    }

    pub struct TestSession {
        ws: WebSocketStream<TcpStream>,
    }

    impl TestSession {
        pub async fn send(&mut self, frame: impl Into<Frame>) {
            let json = frame.into().to_json().expect("encode");
            self.ws
                .send(Message::Text(json.into()))
                .await
                .expect("send");
        }

        pub async fn recv_request(&mut self) -> RequestFrame {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let frame = Frame::from_json(text.as_str()).expect("decode");
                        if let Frame::Request(req) = frame {
                            return req;
                        }
                    }
                    Some(Ok(_)) => {}
                    other => panic!("client went away: {other:?}"),
                }
            }
        }

        pub async fn push(&mut self, event: &str, payload: Value, seq: u64) {
            self.send(EventFrame::new(event, Some(payload)).with_seq(seq))
                .await;
        }
    }

    pub fn hello_payload() -> Value {
        json!({
            "protocol": 3,
            "server": {"version": "2026.1.0", "host": "test", "connId": "cli-1"},
            "features": {"methods": ["sessions.list"], "events": ["chat"]},
            "snapshot": {"sessionDefaults": {"mainSessionKey": "agent:main:main"}},
            "policy": {"tickIntervalMs": 30000}
        })
    }
}
