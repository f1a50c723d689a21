//! Connect handshake payloads.
//!
//! After the socket opens the gateway may push a [`CHALLENGE_EVENT`] carrying
//! a nonce. Either way the client sends exactly one [`CONNECT_METHOD`]
//! request with [`ConnectParams`]; a successful reply carries [`HelloOk`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol version implemented by this crate.
pub const PROTOCOL_VERSION: u32 = 3;

/// Method name of the handshake request.
pub const CONNECT_METHOD: &str = "connect";

/// Event pushed by the gateway before it expects the handshake.
pub const CHALLENGE_EVENT: &str = "connect.challenge";

/// Periodic keepalive event.
pub const TICK_EVENT: &str = "tick";

/// Parameters of the `connect` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    /// Lowest protocol version the client accepts.
    pub min_protocol: u32,
    /// Highest protocol version the client accepts.
    pub max_protocol: u32,
    /// Client descriptor.
    pub client: ClientInfo,
    /// Capabilities advertised by the client.
    #[serde(default)]
    pub caps: Vec<String>,
    /// Credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthParams>,
    /// Requested role.
    pub role: String,
    /// Requested scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl ConnectParams {
    /// Create params for the single protocol version this crate speaks.
    #[must_use]
    pub fn new(client: ClientInfo) -> Self {
        Self {
            min_protocol: PROTOCOL_VERSION,
            max_protocol: PROTOCOL_VERSION,
            client,
            caps: Vec::new(),
            auth: None,
            role: "operator".to_string(),
            scopes: vec!["operator.admin".to_string()],
        }
    }

    /// Attach a bearer token. Empty tokens are ignored.
    #[must_use]
    pub fn with_token(mut self, token: Option<&str>) -> Self {
        self.auth = token
            .filter(|t| !t.is_empty())
            .map(|t| AuthParams {
                token: Some(t.to_string()),
            });
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
}

/// Description of the connecting client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Stable client identifier.
    pub id: String,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Client version string.
    pub version: String,
    /// Platform, e.g. `linux x86_64`.
    pub platform: String,
    /// Interaction mode, e.g. `cli`, `ui`, `backend`.
    pub mode: String,
    /// Per-process instance id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// Credentials sent with the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    /// Opaque bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Payload of the `connect.challenge` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectChallenge {
    /// Server nonce.
    pub nonce: String,
    /// Server timestamp in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<u64>,
}

/// Successful handshake acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloOk {
    /// Negotiated protocol version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<u32>,
    /// Server identity.
    pub server: ServerInfo,
    /// Methods and events the server supports.
    #[serde(default)]
    pub features: Features,
    /// Initial state snapshot.
    #[serde(default)]
    pub snapshot: Snapshot,
    /// Connection policy.
    #[serde(default)]
    pub policy: Policy,
}

impl HelloOk {
    /// Declared heartbeat interval, if the server announced a positive one.
    #[must_use]
    pub fn tick_interval(&self) -> Option<Duration> {
        self.policy
            .tick_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Session key the caller should use by default.
    #[must_use]
    pub fn default_session_key(&self) -> Option<&str> {
        self.snapshot
            .session_defaults
            .as_ref()
            .and_then(|d| d.main_session_key.as_deref().or(d.main_key.as_deref()))
    }

    /// Whether the server advertised the given method.
    #[must_use]
    pub fn supports_method(&self, method: &str) -> bool {
        self.features.methods.iter().any(|m| m == method)
    }
}

/// Server identity block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    /// Server version string.
    pub version: String,
    /// Host name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Id the server assigned to this connection.
    pub conn_id: String,
}

/// Feature advertisement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    /// Supported request methods.
    #[serde(default)]
    pub methods: Vec<String>,
    /// Event names the server may push.
    #[serde(default)]
    pub events: Vec<String>,
}

/// Initial state snapshot. Only the session defaults are interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Default session selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_defaults: Option<SessionDefaults>,
    /// Remaining snapshot fields, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Session defaults announced in the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDefaults {
    /// Default agent id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_agent_id: Option<String>,
    /// Main session key without agent prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_key: Option<String>,
    /// Fully qualified main session key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_session_key: Option<String>,
}

/// Connection policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Interval between `tick` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_interval_ms: Option<u64>,
    /// Largest frame the server accepts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}
