//! The gateway connection: a handle plus a single driver task.
//!
//! All connection state (transport, handshake guard, pending calls, backoff,
//! heartbeat) lives inside the driver and is only touched from its event
//! loop. Handles talk to it over a command channel.

use std::sync::Arc;

use claw_proto::{
    CHALLENGE_EVENT, CONNECT_METHOD, ConnectChallenge, EventFrame, Frame, HelloOk,
    LinkCloseCode, PROTOCOL_VERSION, RequestFrame, ResponseFrame, TICK_EVENT,
};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::{LinkError, LinkResult};
use crate::events::{DisconnectCause, LinkEvent};
use crate::heartbeat::{HealthSnapshot, HeartbeatTracker};
use crate::observers::{ObserverSet, Subscription};
use crate::pending::{PendingCalls, Settlement, Waiter};
use crate::reconnect::Backoff;
use crate::state::ConnectionState;
use crate::transport::{Link, TransportEvent};

enum Command {
    Start {
        ack: oneshot::Sender<()>,
    },
    Stop {
        ack: oneshot::Sender<()>,
    },
    ForceReconnect {
        ack: oneshot::Sender<()>,
    },
    Request {
        frame: RequestFrame,
        reply: oneshot::Sender<LinkResult<Value>>,
    },
    Abandon {
        id: String,
    },
    Health {
        reply: oneshot::Sender<HealthSnapshot>,
    },
}

struct Shared {
    state: watch::Sender<ConnectionState>,
    hello: RwLock<Option<HelloOk>>,
    health: RwLock<HealthSnapshot>,
    events: ObserverSet<EventFrame>,
    health_observers: ObserverSet<HealthSnapshot>,
    lifecycle: ObserverSet<LinkEvent>,
}

/// Handle to a gateway connection.
///
/// Cheap to clone; all clones drive the same connection. The connection
/// shuts down when the last handle is dropped.
#[derive(Clone)]
pub struct GatewayConnection {
    url: Arc<str>,
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    request_timeout: Option<std::time::Duration>,
}

impl std::fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConnection")
            .field("url", &self.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl GatewayConnection {
    /// Validate `config` and spawn the connection driver.
    ///
    /// The connection starts idle in [`ConnectionState::Disconnected`]; call
    /// [`start`](Self::start) to open it. Must be called from within a Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Config`] if the configuration is invalid.
    pub fn new(config: ConnectionConfig) -> LinkResult<Self> {
        config.validate()?;

        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(Shared {
            state,
            hello: RwLock::new(None),
            health: RwLock::new(HealthSnapshot::disconnected()),
            events: ObserverSet::new(),
            health_observers: ObserverSet::new(),
            lifecycle: ObserverSet::new(),
        });

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let url: Arc<str> = Arc::from(config.url.as_str());
        let request_timeout = config.request_timeout;

        let driver = Driver::new(config, Arc::clone(&shared), commands_rx);
        tokio::spawn(driver.run());

        Ok(Self {
            url,
            commands,
            shared,
            request_timeout,
        })
    }

    /// Gateway URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Begin connecting. Reconnects automatically until [`stop`](Self::stop).
    ///
    /// Returns once the state is `connecting`; use
    /// [`connected`](Self::connected) to wait for the handshake.
    pub async fn start(&self) -> LinkResult<()> {
        self.command(|ack| Command::Start { ack }).await
    }

    /// Close the connection, reject pending calls, and disable reconnects.
    pub async fn stop(&self) -> LinkResult<()> {
        self.command(|ack| Command::Stop { ack }).await
    }

    /// Tear the connection down and reconnect immediately with fresh backoff.
    pub async fn force_reconnect(&self) -> LinkResult<()> {
        self.command(|ack| Command::ForceReconnect { ack }).await
    }

    async fn command(&self, make: impl FnOnce(oneshot::Sender<()>) -> Command) -> LinkResult<()> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(make(ack))
            .map_err(|_| LinkError::Shutdown)?;
        done.await.map_err(|_| LinkError::Shutdown)
    }

    /// Issue a request and wait for its terminal response.
    ///
    /// # Errors
    ///
    /// - [`LinkError::NotConnected`] if the transport is not open.
    /// - [`LinkError::Gateway`] if the gateway answered `ok: false`.
    /// - [`LinkError::ConnectionClosed`] if the connection dropped first.
    /// - [`LinkError::Timeout`] if a request timeout is configured and expired.
    pub async fn request(&self, method: &str, params: Option<Value>) -> LinkResult<Value> {
        let frame = RequestFrame::new(method, params);
        let id = frame.id.clone();
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Command::Request { frame, reply })
            .map_err(|_| LinkError::Shutdown)?;

        let Some(timeout) = self.request_timeout else {
            return outcome.await.map_err(|_| LinkError::Shutdown)?;
        };

        match tokio::time::timeout(timeout, outcome).await {
            Ok(result) => result.map_err(|_| LinkError::Shutdown)?,
            Err(_) => {
                let _ = self.commands.send(Command::Abandon { id });
                Err(LinkError::Timeout {
                    method: method.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Typed wrapper around [`request`](Self::request).
    pub async fn call<P, T>(&self, method: &str, params: &P) -> LinkResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        let params = (!params.is_null()).then_some(params);
        let payload = self.request(method, params).await?;
        Ok(serde_json::from_value(payload)?)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch lifecycle state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Wait until the handshake has completed.
    pub async fn connected(&self) -> LinkResult<()> {
        let mut state = self.watch_state();
        state
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .map(|_| ())
            .map_err(|_| LinkError::Shutdown)
    }

    /// Acknowledgment of the current session; `None` while no handshake has
    /// completed on the open transport.
    #[must_use]
    pub fn hello(&self) -> Option<HelloOk> {
        self.shared.hello.read().clone()
    }

    /// Session key announced by the gateway, if any.
    #[must_use]
    pub fn default_session_key(&self) -> Option<String> {
        self.shared
            .hello
            .read()
            .as_ref()
            .and_then(|h| h.default_session_key().map(str::to_string))
    }

    /// Compute a fresh health snapshot.
    pub async fn health(&self) -> LinkResult<HealthSnapshot> {
        let (reply, snapshot) = oneshot::channel();
        self.commands
            .send(Command::Health { reply })
            .map_err(|_| LinkError::Shutdown)?;
        snapshot.await.map_err(|_| LinkError::Shutdown)
    }

    /// Most recently broadcast health snapshot.
    #[must_use]
    pub fn last_health(&self) -> HealthSnapshot {
        self.shared.health.read().clone()
    }

    /// Observe gateway push events. Ticks and challenges are not delivered.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&EventFrame) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(observer)
    }

    /// Observe health snapshots.
    pub fn subscribe_health<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&HealthSnapshot) + Send + Sync + 'static,
    {
        self.shared.health_observers.subscribe(observer)
    }

    /// Observe lifecycle transitions.
    pub fn subscribe_lifecycle<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&LinkEvent) + Send + Sync + 'static,
    {
        self.shared.lifecycle.subscribe(observer)
    }

    /// Push events as a channel.
    pub fn event_stream(&self) -> (Subscription, mpsc::UnboundedReceiver<EventFrame>) {
        self.shared.events.subscribe_channel()
    }

    /// Health snapshots as a channel.
    pub fn health_stream(&self) -> (Subscription, mpsc::UnboundedReceiver<HealthSnapshot>) {
        self.shared.health_observers.subscribe_channel()
    }

    /// Lifecycle events as a channel.
    pub fn lifecycle_stream(&self) -> (Subscription, mpsc::UnboundedReceiver<LinkEvent>) {
        self.shared.lifecycle.subscribe_channel()
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

struct Driver {
    config: ConnectionConfig,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
    transport_tx: mpsc::UnboundedSender<TransportEvent>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    link: Option<Link>,
    link_open: bool,
    epoch: u64,
    running: bool,
    handshake_sent: bool,
    grace_deadline: Option<Instant>,
    reconnect_at: Option<Instant>,
    pending: PendingCalls,
    backoff: Backoff,
    heartbeat: HeartbeatTracker,
    last_seq: Option<u64>,
}

impl Driver {
    fn new(
        config: ConnectionConfig,
        shared: Arc<Shared>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let backoff = Backoff::new(config.reconnect.clone());
        let heartbeat = HeartbeatTracker::new(config.stale_multiplier);
        Self {
            config,
            shared,
            commands,
            transport_tx,
            transport_rx,
            link: None,
            link_open: false,
            epoch: 0,
            running: false,
            handshake_sent: false,
            grace_deadline: None,
            reconnect_at: None,
            pending: PendingCalls::new(),
            backoff,
            heartbeat,
            last_seq: None,
        }
    }

    async fn run(mut self) {
        let mut health_check = tokio::time::interval(self.config.health_check_interval);
        health_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
                Some(event) = self.transport_rx.recv() => self.on_transport(event),
                () = sleep_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    if self.running {
                        self.connect();
                    }
                }
                () = sleep_until(self.grace_deadline) => {
                    self.grace_deadline = None;
                    self.send_handshake("grace window elapsed");
                }
                _ = health_check.tick() => self.on_health_check(),
            }
        }

        debug!(url = %self.config.url, "all connection handles dropped, shutting down");
        self.running = false;
        self.drop_link(Some(LinkCloseCode::Normal));
    }

    fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = self.shared.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            debug!(state = %next, "connection state changed");
            self.publish_health();
        }
    }

    fn health_snapshot(&self) -> HealthSnapshot {
        self.heartbeat
            .snapshot(self.state(), self.backoff.attempts(), Instant::now())
    }

    fn publish_health(&self) {
        let snapshot = self.health_snapshot();
        *self.shared.health.write() = snapshot.clone();
        self.shared.health_observers.notify(&snapshot);
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Start { ack } => {
                if !self.running {
                    info!(url = %self.config.url, "starting gateway connection");
                    self.running = true;
                    self.backoff.reset();
                    if self.link.is_none() && self.reconnect_at.is_none() {
                        self.connect();
                    }
                }
                let _ = ack.send(());
            }
            Command::Stop { ack } => {
                self.stop();
                let _ = ack.send(());
            }
            Command::ForceReconnect { ack } => {
                info!(url = %self.config.url, "forcing gateway reconnect");
                self.running = true;
                self.backoff.reset();
                self.reconnect_at = None;
                if self.link.is_some() {
                    self.drop_link(Some(LinkCloseCode::Normal));
                    self.notify_lifecycle(LinkEvent::Disconnected {
                        cause: DisconnectCause::ManualReconnect,
                    });
                }
                self.connect();
                let _ = ack.send(());
            }
            Command::Request { frame, reply } => self.send_request(frame, reply),
            Command::Abandon { id } => {
                if self.pending.remove(&id).is_some() {
                    debug!(id = %id, "request abandoned after timeout");
                }
            }
            Command::Health { reply } => {
                let _ = reply.send(self.health_snapshot());
            }
        }
    }

    fn connect(&mut self) {
        self.epoch += 1;
        self.handshake_sent = false;
        self.link_open = false;
        self.grace_deadline = None;
        self.last_seq = None;
        self.set_state(ConnectionState::Connecting);
        debug!(url = %self.config.url, epoch = self.epoch, "connecting to gateway");
        self.link = Some(Link::spawn(
            self.config.url.clone(),
            self.config.connect_timeout,
            self.epoch,
            self.transport_tx.clone(),
        ));
    }

    fn stop(&mut self) {
        let was_running = self.running;
        self.running = false;
        self.reconnect_at = None;
        self.drop_link(Some(LinkCloseCode::Normal));
        self.set_state(ConnectionState::Disconnected);
        if was_running {
            info!(url = %self.config.url, "gateway connection stopped");
            self.notify_lifecycle(LinkEvent::Disconnected {
                cause: DisconnectCause::Stopped,
            });
        }
    }

    /// Release the current transport and fail everything waiting on it.
    fn drop_link(&mut self, close: Option<LinkCloseCode>) {
        if let Some(link) = self.link.take() {
            if let Some(code) = close {
                debug!(epoch = link.epoch(), code = %code, "closing gateway transport");
                link.close(code);
            }
        }
        self.link_open = false;
        self.handshake_sent = false;
        self.grace_deadline = None;
        *self.shared.hello.write() = None;
        let rejected = self.pending.reject_all();
        if rejected > 0 {
            debug!(rejected, "rejected pending requests");
        }
    }

    fn notify_lifecycle(&self, event: LinkEvent) {
        self.shared.lifecycle.notify(&event);
    }

    fn schedule_reconnect(&mut self) {
        if !self.running || self.reconnect_at.is_some() {
            return;
        }
        let delay = self.backoff.next_delay();
        let attempt = self.backoff.attempts();
        info!(attempt, ?delay, "scheduling gateway reconnect");
        self.reconnect_at = Some(Instant::now() + delay);
        self.notify_lifecycle(LinkEvent::Reconnecting { attempt, delay });
        self.publish_health();
    }

    fn on_transport(&mut self, event: TransportEvent) {
        if event.epoch() != self.epoch || self.link.is_none() {
            trace!(epoch = event.epoch(), "ignoring event from retired transport");
            return;
        }

        match event {
            TransportEvent::Opened { .. } => {
                debug!(epoch = self.epoch, "transport open, awaiting challenge");
                self.link_open = true;
                self.grace_deadline = Some(Instant::now() + self.config.handshake_grace);
            }
            TransportEvent::Text { text, .. } => self.on_text(&text),
            TransportEvent::Closed { code, reason, .. } => {
                self.link_lost(DisconnectCause::Closed { code, reason });
            }
            TransportEvent::Failed { error, .. } => {
                self.link_lost(DisconnectCause::ConnectFailed(error));
            }
        }
    }

    fn link_lost(&mut self, cause: DisconnectCause) {
        self.drop_link(None);
        let next = self.state().after_link_lost();
        warn!(url = %self.config.url, cause = %cause, "gateway link lost");
        self.set_state(next);
        self.notify_lifecycle(LinkEvent::Disconnected { cause });
        self.schedule_reconnect();
    }

    fn on_text(&mut self, text: &str) {
        match Frame::from_json(text) {
            Ok(Frame::Event(event)) => self.on_event(event),
            Ok(Frame::Response(response)) => self.on_response(response),
            Ok(Frame::Request(request)) => {
                debug!(method = %request.method, "ignoring request frame from gateway");
            }
            Err(e) => warn!(error = %e, "dropping malformed frame"),
        }
    }

    fn on_event(&mut self, event: EventFrame) {
        if let Some(seq) = event.seq {
            self.track_seq(seq);
        }

        match event.event.as_str() {
            CHALLENGE_EVENT => {
                let nonce = event
                    .payload
                    .and_then(|p| serde_json::from_value::<ConnectChallenge>(p).ok())
                    .map(|c| c.nonce);
                debug!(nonce = ?nonce, "connect challenge received");
                self.send_handshake("challenge");
            }
            TICK_EVENT => {
                self.heartbeat.record(Instant::now());
                self.publish_health();
            }
            _ => self.shared.events.notify(&event),
        }
    }

    fn track_seq(&mut self, seq: u64) {
        match self.last_seq {
            Some(last) if seq > last.saturating_add(1) => {
                warn!(expected = last.saturating_add(1), received = seq, "event sequence gap");
            }
            _ => {}
        }
        self.last_seq = Some(seq);
    }

    fn send_handshake(&mut self, trigger: &'static str) {
        if self.handshake_sent || !self.link_open {
            return;
        }

        let params = match serde_json::to_value(self.config.connect_params()) {
            Ok(params) => params,
            Err(e) => {
                self.fail_handshake(format!("cannot encode connect params: {e}"));
                return;
            }
        };
        let frame = RequestFrame::new(CONNECT_METHOD, Some(params));
        let id = frame.id.clone();
        let json = match Frame::from(frame).to_json() {
            Ok(json) => json,
            Err(e) => {
                self.fail_handshake(e.to_string());
                return;
            }
        };

        self.handshake_sent = true;
        self.grace_deadline = None;
        self.pending.insert(id, Waiter::Handshake);
        debug!(trigger, "sending connect handshake");
        if !self.link.as_ref().is_some_and(|link| link.send_text(json)) {
            debug!("handshake not queued, transport writer is gone");
        }
    }

    fn fail_handshake(&mut self, reason: String) {
        warn!(url = %self.config.url, reason = %reason, "gateway handshake failed");
        self.drop_link(Some(LinkCloseCode::HandshakeFailed));
        self.set_state(ConnectionState::Error);
        self.notify_lifecycle(LinkEvent::Disconnected {
            cause: DisconnectCause::HandshakeFailed(reason),
        });
        self.schedule_reconnect();
    }

    fn on_response(&mut self, response: ResponseFrame) {
        let id = response.id.clone();
        match self.pending.settle(response) {
            Settlement::Unknown => trace!(id = %id, "dropping response for unknown request"),
            Settlement::Interim => debug!(id = %id, "request accepted, awaiting final response"),
            Settlement::Delivered => {}
            Settlement::Handshake(reply) => self.on_handshake_reply(reply),
        }
    }

    fn on_handshake_reply(&mut self, reply: ResponseFrame) {
        if !reply.ok {
            self.fail_handshake(format!("{}: {}", reply.error_code(), reply.error_message()));
            return;
        }

        let hello = match reply.payload.map(serde_json::from_value::<HelloOk>) {
            Some(Ok(hello)) => hello,
            Some(Err(e)) => {
                self.fail_handshake(format!("malformed hello: {e}"));
                return;
            }
            None => {
                self.fail_handshake("empty hello".to_string());
                return;
            }
        };

        if let Some(protocol) = hello.protocol.filter(|p| *p != PROTOCOL_VERSION) {
            self.fail_handshake(format!(
                "protocol mismatch: server speaks {protocol}, client speaks {PROTOCOL_VERSION}"
            ));
            return;
        }

        self.backoff.reset();
        self.heartbeat.reset(hello.tick_interval(), Instant::now());
        info!(
            conn_id = %hello.server.conn_id,
            server_version = %hello.server.version,
            tick_interval_ms = ?hello.policy.tick_interval_ms,
            "gateway handshake complete"
        );

        let event = LinkEvent::Connected {
            conn_id: hello.server.conn_id.clone(),
            server_version: hello.server.version.clone(),
        };
        *self.shared.hello.write() = Some(hello);
        self.set_state(ConnectionState::Connected);
        self.notify_lifecycle(event);
    }

    fn send_request(&mut self, frame: RequestFrame, reply: oneshot::Sender<LinkResult<Value>>) {
        if !self.link_open {
            let _ = reply.send(Err(LinkError::NotConnected));
            return;
        }

        let id = frame.id.clone();
        let method = frame.method.clone();
        let json = match Frame::from(frame).to_json() {
            Ok(json) => json,
            Err(e) => {
                let _ = reply.send(Err(e.into()));
                return;
            }
        };

        let sent = self.link.as_ref().is_some_and(|link| link.send_text(json));
        if !sent {
            let _ = reply.send(Err(LinkError::NotConnected));
            return;
        }
        trace!(id = %id, method = %method, "request sent");
        self.pending.insert(id, Waiter::Caller { method, reply });
    }

    fn on_health_check(&mut self) {
        let now = Instant::now();
        if !self.heartbeat.is_stale(self.state(), now) {
            self.publish_health();
            return;
        }

        warn!(
            url = %self.config.url,
            elapsed = ?self.heartbeat.elapsed(now),
            interval = ?self.heartbeat.interval(),
            "gateway heartbeat missed, closing stale connection"
        );
        self.publish_health();
        self.drop_link(Some(LinkCloseCode::Stale));
        let next = self.state().after_link_lost();
        self.set_state(next);
        self.notify_lifecycle(LinkEvent::Disconnected {
            cause: DisconnectCause::Stale,
        });
        self.schedule_reconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::reconnect::ReconnectConfig;

    async fn refused_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let err = GatewayConnection::new(ConnectionConfig::new("http://nope")).unwrap_err();
        assert!(matches!(err, LinkError::Config(_)));
    }

    #[tokio::test]
    async fn test_idle_connection() {
        let conn = GatewayConnection::new(ConnectionConfig::new("ws://127.0.0.1:1")).unwrap();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.hello().is_none());
        assert!(conn.default_session_key().is_none());
        assert_eq!(conn.last_health(), HealthSnapshot::disconnected());
    }

    #[tokio::test]
    async fn test_request_before_start_is_not_connected() {
        let conn = GatewayConnection::new(ConnectionConfig::new("ws://127.0.0.1:1")).unwrap();
        let err = conn.request("sessions.list", None).await.unwrap_err();
        assert!(matches!(err, LinkError::NotConnected));
        assert!(err.is_local());
    }

    #[tokio::test]
    async fn test_refused_connect_schedules_base_delay() {
        let config = ConnectionConfig::new(refused_url().await).with_reconnect_config(
            ReconnectConfig {
                initial_delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(30),
                backoff_multiplier: 2.0,
            },
        );
        let conn = GatewayConnection::new(config).unwrap();
        let (_sub, mut lifecycle) = conn.lifecycle_stream();

        conn.start().await.unwrap();

        match lifecycle.recv().await.unwrap() {
            LinkEvent::Disconnected {
                cause: DisconnectCause::ConnectFailed(_),
            } => {}
            other => panic!("expected connect failure, got {other:?}"),
        }
        assert_eq!(
            lifecycle.recv().await.unwrap(),
            LinkEvent::Reconnecting {
                attempt: 1,
                delay: Duration::from_secs(5),
            }
        );
        assert_eq!(conn.state(), ConnectionState::Error);

        let health = conn.health().await.unwrap();
        assert_eq!(health.reconnect_attempts, 1);
        assert!(!health.is_stale);

        conn.stop().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(
            lifecycle.recv().await.unwrap(),
            LinkEvent::Disconnected {
                cause: DisconnectCause::Stopped,
            }
        );
    }

    #[tokio::test]
    async fn test_stop_when_idle_emits_nothing() {
        let conn = GatewayConnection::new(ConnectionConfig::new("ws://127.0.0.1:1")).unwrap();
        let (_sub, mut lifecycle) = conn.lifecycle_stream();
        conn.stop().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(lifecycle.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_force_reconnect_enters_connecting() {
        // Accepts TCP but never answers the upgrade, so the attempt stays open.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let conn = GatewayConnection::new(ConnectionConfig::new(url)).unwrap();

        conn.force_reconnect().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);

        conn.force_reconnect().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);

        conn.stop().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }
}
