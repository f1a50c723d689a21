//! Frame definitions.
//!
//! Frames are tagged by their `type` field:
//!
//! ```text
//! {"type":"req","id":"..","method":"sessions.list","params":{..}}
//! {"type":"res","id":"..","ok":true,"payload":{..}}
//! {"type":"res","id":"..","ok":false,"error":{"code":"..","message":".."}}
//! {"type":"event","event":"chat","payload":{..},"seq":42}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ProtoError;

/// Payload `status` value marking a response as an interim acknowledgment.
///
/// The gateway may acknowledge receipt of a long-running call before the
/// work completes; the terminal response follows later with the same id.
pub const ACCEPTED_STATUS: &str = "accepted";

/// Fallback message for failed responses that carry no error text.
const DEFAULT_ERROR_MESSAGE: &str = "request failed";

/// A single message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Call issued by the client.
    #[serde(rename = "req")]
    Request(RequestFrame),
    /// Reply to a request, correlated by id.
    #[serde(rename = "res")]
    Response(ResponseFrame),
    /// Unsolicited push from the gateway.
    #[serde(rename = "event")]
    Event(EventFrame),
}

impl Frame {
    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encoding(e.to_string()))
    }

    /// Deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a well-formed frame.
    pub fn from_json(json: &str) -> Result<Self, ProtoError> {
        serde_json::from_str(json).map_err(|e| ProtoError::Decoding(e.to_string()))
    }

    /// Short name of the frame type, as used in the `type` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "req",
            Self::Response(_) => "res",
            Self::Event(_) => "event",
        }
    }
}

impl From<RequestFrame> for Frame {
    fn from(frame: RequestFrame) -> Self {
        Self::Request(frame)
    }
}

impl From<ResponseFrame> for Frame {
    fn from(frame: ResponseFrame) -> Self {
        Self::Response(frame)
    }
}

impl From<EventFrame> for Frame {
    fn from(frame: EventFrame) -> Self {
        Self::Event(frame)
    }
}

/// Request frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Correlation id, unique per connection.
    pub id: String,
    /// Method name, e.g. `chat.send`.
    pub method: String,
    /// Method parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestFrame {
    /// Create a request with a fresh random correlation id.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), method, params)
    }

    /// Create a request with an explicit correlation id.
    #[must_use]
    pub fn with_id(
        id: impl Into<String>,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Id of the request being answered.
    pub id: String,
    /// Whether the call succeeded.
    pub ok: bool,
    /// Result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Error details when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl ResponseFrame {
    /// Successful response.
    #[must_use]
    pub fn success(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Failed response.
    #[must_use]
    pub fn failure(id: impl Into<String>, error: ErrorShape) -> Self {
        Self {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(error),
        }
    }

    /// Interim acknowledgment; the call stays open.
    #[must_use]
    pub fn accepted(id: impl Into<String>) -> Self {
        Self::success(id, serde_json::json!({ "status": ACCEPTED_STATUS }))
    }

    /// Whether this response is an interim acknowledgment rather than the
    /// terminal reply.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.payload
            .as_ref()
            .and_then(|p| p.get("status"))
            .and_then(Value::as_str)
            == Some(ACCEPTED_STATUS)
    }

    /// Error code reported by the gateway, empty if none.
    #[must_use]
    pub fn error_code(&self) -> &str {
        self.error.as_ref().map_or("", |e| e.code.as_str())
    }

    /// Human-readable error message, falling back to a generic text.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| e.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string())
    }
}

/// Error carried by a failed response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorShape {
    /// Machine-readable code, e.g. `INVALID_REQUEST`.
    #[serde(default)]
    pub code: String,
    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Free-form details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Whether retrying the call may succeed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    /// Suggested delay before retrying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl ErrorShape {
    /// Create an error with a code and message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Event frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrame {
    /// Event name, e.g. `chat` or `tick`.
    pub event: String,
    /// Event payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Per-connection sequence number, when the gateway assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    /// Opaque state version attached to presence/health updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_version: Option<Value>,
}

impl EventFrame {
    /// Create an event without a sequence number.
    #[must_use]
    pub fn new(event: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            event: event.into(),
            payload,
            seq: None,
            state_version: None,
        }
    }

    /// Attach a sequence number.
    #[must_use]
    pub const fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }
}
