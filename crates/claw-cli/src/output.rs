//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use chrono::{DateTime, Utc};
use claw_link::{ConnectionState, EventFrame, HealthSnapshot, HelloOk};
use serde::Serialize;
use serde_json::Value;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write one streamed record. JSON output is one compact document per
    /// line so it can be piped into line-oriented tools.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_line<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + LineDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                writeln!(writer, "{}", value.line())?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Trait for streamed records rendered as a single line.
pub trait LineDisplay {
    /// Human-readable rendering without a trailing newline.
    fn line(&self) -> String;
}

/// Gateway identity and link health.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    /// Gateway URL.
    pub url: String,
    /// Server version reported in the handshake.
    pub server_version: String,
    /// Server host, when reported.
    pub host: Option<String>,
    /// Connection id assigned by the gateway.
    pub conn_id: String,
    /// Negotiated protocol version.
    pub protocol: Option<u32>,
    /// Default session key for chat calls.
    pub default_session_key: Option<String>,
    /// Methods the gateway advertises.
    pub methods: Vec<String>,
    /// Events the gateway advertises.
    pub events: Vec<String>,
    /// Heartbeat view at the time of the query.
    pub health: HealthSnapshot,
}

impl GatewayStatus {
    /// Build a status report from a handshake acknowledgment.
    #[must_use]
    pub fn new(url: impl Into<String>, hello: &HelloOk, health: HealthSnapshot) -> Self {
        Self {
            url: url.into(),
            server_version: hello.server.version.clone(),
            host: hello.server.host.clone(),
            conn_id: hello.server.conn_id.clone(),
            protocol: hello.protocol,
            default_session_key: hello.default_session_key().map(str::to_string),
            methods: hello.features.methods.clone(),
            events: hello.features.events.clone(),
            health,
        }
    }
}

impl TableDisplay for GatewayStatus {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Gateway Status")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "URL:              {}", self.url)?;
        writeln!(writer, "Server Version:   {}", self.server_version)?;
        if let Some(host) = &self.host {
            writeln!(writer, "Host:             {host}")?;
        }
        writeln!(writer, "Connection:       {}", self.conn_id)?;
        if let Some(protocol) = self.protocol {
            writeln!(writer, "Protocol:         {protocol}")?;
        }
        if let Some(key) = &self.default_session_key {
            writeln!(writer, "Default Session:  {key}")?;
        }
        writeln!(writer)?;
        writeln!(writer, "Health")?;
        writeln!(writer, "  State:          {}", self.health.state)?;
        writeln!(
            writer,
            "  Last Heartbeat: {}",
            format_timestamp(self.health.last_heartbeat)
        )?;
        writeln!(
            writer,
            "  Tick Interval:  {}",
            self.health
                .tick_interval_ms
                .map_or_else(|| "-".to_string(), |ms| format!("{ms} ms"))
        )?;
        writeln!(
            writer,
            "  Stale:          {}",
            if self.health.is_stale { "yes" } else { "no" }
        )?;
        writeln!(writer)?;
        writeln!(writer, "Features")?;
        writeln!(writer, "  Methods:        {}", self.methods.len())?;
        writeln!(writer, "  Events:         {}", self.events.len())?;
        Ok(())
    }
}

/// Result of a single gateway call.
#[derive(Debug, Clone, Serialize)]
pub struct CallResult {
    /// Method that was invoked.
    pub method: String,
    /// Final response payload.
    pub result: Value,
}

impl TableDisplay for CallResult {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let body = serde_json::to_string_pretty(&self.result)
            .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
        writeln!(writer, "{body}")?;
        Ok(())
    }
}

/// A pushed gateway event, as printed by `watch`.
#[derive(Debug, Clone, Serialize)]
pub struct EventLine {
    /// Local receive time.
    pub received_at: DateTime<Utc>,
    /// The event as delivered.
    #[serde(flatten)]
    pub frame: EventFrame,
}

impl EventLine {
    /// Stamp an event with the current time.
    #[must_use]
    pub fn now(frame: EventFrame) -> Self {
        Self {
            received_at: Utc::now(),
            frame,
        }
    }
}

impl LineDisplay for EventLine {
    fn line(&self) -> String {
        let seq = self
            .frame
            .seq
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        let payload = self
            .frame
            .payload
            .as_ref()
            .map_or_else(String::new, Value::to_string);
        format!(
            "{}  {:<20}  {:>6}  {}",
            self.received_at.format("%H:%M:%S%.3f"),
            truncate(&self.frame.event, 20),
            seq,
            truncate(&payload, 120)
        )
    }
}

impl LineDisplay for HealthSnapshot {
    fn line(&self) -> String {
        format!(
            "{:<12}  heartbeat {}  stale {}  attempts {}",
            self.state.to_string(),
            format_timestamp(self.last_heartbeat),
            if self.is_stale { "yes" } else { "no" },
            self.reconnect_attempts
        )
    }
}

/// Whether a state should be highlighted as unhealthy.
#[must_use]
pub const fn is_degraded(state: ConnectionState) -> bool {
    !matches!(state, ConnectionState::Connected)
}

fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(
        || "never".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hello() -> HelloOk {
        serde_json::from_value(json!({
            "protocol": 3,
            "server": {"version": "2026.1.0", "host": "gw-1", "connId": "c-42"},
            "features": {"methods": ["chat.send", "sessions.list"], "events": ["chat"]},
            "snapshot": {"sessionDefaults": {"mainSessionKey": "agent:main:main"}},
            "policy": {"tickIntervalMs": 30000}
        }))
        .expect("valid hello")
    }

    fn health() -> HealthSnapshot {
        HealthSnapshot {
            state: ConnectionState::Connected,
            last_heartbeat: None,
            tick_interval_ms: Some(30_000),
            is_stale: false,
            reconnect_attempts: 0,
        }
    }

    #[test]
    fn output_format_default_is_table() {
        let fmt = OutputFormat::default();
        assert_eq!(fmt.format(), Format::Table);
        assert!(!fmt.is_json());
    }

    #[test]
    fn output_format_json() {
        let fmt = OutputFormat::new(Format::Json);
        assert_eq!(fmt.format(), Format::Json);
        assert!(fmt.is_json());
    }

    #[test]
    fn gateway_status_table_output() {
        let status = GatewayStatus::new("ws://gw:18789", &hello(), health());
        let output = OutputFormat::new(Format::Table)
            .to_string(&status)
            .expect("should format");

        assert!(output.contains("Gateway Status"));
        assert!(output.contains("Server Version:   2026.1.0"));
        assert!(output.contains("Connection:       c-42"));
        assert!(output.contains("Default Session:  agent:main:main"));
        assert!(output.contains("Last Heartbeat: never"));
        assert!(output.contains("Tick Interval:  30000 ms"));
        assert!(output.contains("Methods:        2"));
    }

    #[test]
    fn gateway_status_json_output() {
        let status = GatewayStatus::new("ws://gw:18789", &hello(), health());
        let output = OutputFormat::new(Format::Json)
            .to_string(&status)
            .expect("should format");

        let parsed: Value = serde_json::from_str(&output).expect("valid JSON");
        assert_eq!(parsed["server_version"], "2026.1.0");
        assert_eq!(parsed["health"]["state"], "connected");
        assert_eq!(parsed["health"]["tickIntervalMs"], 30000);
    }

    #[test]
    fn call_result_table_is_pretty_json() {
        let result = CallResult {
            method: "sessions.list".into(),
            result: json!({"sessions": []}),
        };
        let output = OutputFormat::default()
            .to_string(&result)
            .expect("should format");
        assert_eq!(output, "{\n  \"sessions\": []\n}\n");
    }

    #[test]
    fn event_line_json_is_single_line() {
        let line = EventLine::now(EventFrame::new("chat", Some(json!({"text": "hi"}))).with_seq(7));
        let mut buf = Vec::new();
        OutputFormat::new(Format::Json)
            .write_line(&mut buf, &line)
            .expect("should write");

        let text = String::from_utf8(buf).expect("utf8");
        assert_eq!(text.lines().count(), 1);
        let parsed: Value = serde_json::from_str(text.trim()).expect("valid JSON");
        assert_eq!(parsed["event"], "chat");
        assert_eq!(parsed["seq"], 7);
        assert!(parsed["received_at"].is_string());
    }

    #[test]
    fn event_line_table_shows_name_and_seq() {
        let line = EventLine::now(EventFrame::new("agent", None).with_seq(12));
        let rendered = line.line();
        assert!(rendered.contains("agent"));
        assert!(rendered.contains("12"));
    }

    #[test]
    fn health_line_mentions_state() {
        let mut snapshot = health();
        snapshot.is_stale = true;
        snapshot.reconnect_attempts = 2;
        let rendered = snapshot.line();
        assert!(rendered.starts_with("connected"));
        assert!(rendered.contains("stale yes"));
        assert!(rendered.contains("attempts 2"));
    }

    #[test]
    fn degraded_states() {
        assert!(!is_degraded(ConnectionState::Connected));
        assert!(is_degraded(ConnectionState::Error));
        assert!(is_degraded(ConnectionState::Connecting));
    }

    #[test]
    fn truncate_short_string() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn truncate_long_string() {
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn truncate_multibyte() {
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }
}
