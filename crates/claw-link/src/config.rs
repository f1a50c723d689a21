//! Connection configuration.

use std::time::Duration;

use claw_proto::{ClientInfo, ConnectParams};
use url::Url;

use crate::error::{LinkError, LinkResult};
use crate::heartbeat::DEFAULT_STALE_MULTIPLIER;
use crate::reconnect::ReconnectConfig;

/// Wait after the socket opens before sending the handshake unprompted.
pub const DEFAULT_HANDSHAKE_GRACE: Duration = Duration::from_millis(500);

/// Upper bound on opening the transport.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How often heartbeat freshness is checked.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Accepted range for the stale multiplier.
const STALE_MULTIPLIER_RANGE: (f64, f64) = (2.0, 2.5);

/// Everything needed to run a [`GatewayConnection`](crate::GatewayConnection).
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Gateway WebSocket URL.
    pub url: String,
    /// Bearer token sent with the handshake.
    pub token: Option<String>,
    /// Client descriptor.
    pub client: ClientInfo,
    /// Requested role.
    pub role: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
    /// Advertised capabilities.
    pub caps: Vec<String>,
    /// Reconnect backoff.
    pub reconnect: ReconnectConfig,
    /// Handshake grace window.
    pub handshake_grace: Duration,
    /// Transport open timeout.
    pub connect_timeout: Duration,
    /// Heartbeat check interval.
    pub health_check_interval: Duration,
    /// Tolerated multiple of the tick interval.
    pub stale_multiplier: f64,
    /// Per-request timeout. `None` waits until the connection closes.
    pub request_timeout: Option<Duration>,
}

impl ConnectionConfig {
    /// Create a configuration with defaults for everything but the URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let defaults = ConnectParams::new(default_client());
        Self {
            url: url.into(),
            token: None,
            client: defaults.client,
            role: defaults.role,
            scopes: defaults.scopes,
            caps: defaults.caps,
            reconnect: ReconnectConfig::default(),
            handshake_grace: DEFAULT_HANDSHAKE_GRACE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            stale_multiplier: DEFAULT_STALE_MULTIPLIER,
            request_timeout: None,
        }
    }

    /// Set the bearer token. Empty strings clear it.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.is_empty()).then_some(token);
        self
    }

    /// Replace the client descriptor.
    #[must_use]
    pub fn with_client(mut self, client: ClientInfo) -> Self {
        self.client = client;
        self
    }

    /// Set the client display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.client.display_name = Some(name.into());
        self
    }

    /// Set the requested role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Set the requested scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Set the advertised capabilities.
    #[must_use]
    pub fn with_caps(mut self, caps: Vec<String>) -> Self {
        self.caps = caps;
        self
    }

    /// Set reconnection configuration.
    #[must_use]
    pub fn with_reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    /// Set the handshake grace window.
    #[must_use]
    pub const fn with_handshake_grace(mut self, grace: Duration) -> Self {
        self.handshake_grace = grace;
        self
    }

    /// Set the transport open timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the heartbeat check interval.
    #[must_use]
    pub const fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Set the stale multiplier.
    #[must_use]
    pub const fn with_stale_multiplier(mut self, multiplier: f64) -> Self {
        self.stale_multiplier = multiplier;
        self
    }

    /// Set a per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Config`] describing the first invalid value.
    pub fn validate(&self) -> LinkResult<()> {
        if self.url.is_empty() {
            return Err(LinkError::Config("gateway url cannot be empty".to_string()));
        }

        let parsed = Url::parse(&self.url)
            .map_err(|e| LinkError::Config(format!("invalid gateway url '{}': {e}", self.url)))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(LinkError::Config(
                "gateway url must start with ws:// or wss://".to_string(),
            ));
        }

        if self.client.id.is_empty() {
            return Err(LinkError::Config("client id cannot be empty".to_string()));
        }

        if self.reconnect.initial_delay.is_zero() {
            return Err(LinkError::Config(
                "reconnect initial delay must be greater than 0".to_string(),
            ));
        }
        if self.reconnect.initial_delay > self.reconnect.max_delay {
            return Err(LinkError::Config(
                "reconnect initial delay cannot exceed max delay".to_string(),
            ));
        }
        if self.reconnect.backoff_multiplier < 1.0 {
            return Err(LinkError::Config(
                "backoff multiplier must be at least 1.0".to_string(),
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(LinkError::Config(
                "connect timeout must be greater than 0".to_string(),
            ));
        }
        if self.health_check_interval.is_zero() {
            return Err(LinkError::Config(
                "health check interval must be greater than 0".to_string(),
            ));
        }

        let (low, high) = STALE_MULTIPLIER_RANGE;
        if !(low..=high).contains(&self.stale_multiplier) {
            return Err(LinkError::Config(format!(
                "stale multiplier must be between {low} and {high}"
            )));
        }

        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(LinkError::Config(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Handshake parameters derived from this configuration.
    #[must_use]
    pub fn connect_params(&self) -> ConnectParams {
        ConnectParams::new(self.client.clone())
            .with_token(self.token.as_deref())
            .with_role(self.role.clone())
            .with_scopes(self.scopes.clone())
            .with_caps(self.caps.clone())
    }
}

fn default_client() -> ClientInfo {
    ClientInfo {
        id: "claw-link".to_string(),
        display_name: None,
        version: env!("CARGO_PKG_VERSION").to_string(),
        platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
        mode: "backend".to_string(),
        instance_id: Some(uuid::Uuid::new_v4().to_string()),
    }
}
