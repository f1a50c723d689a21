//! Resolving the connection configuration.
//!
//! Values come from three places, highest precedence first: command-line
//! flags (or their environment variables), the settings endpoint, and the
//! JSON config file.

use std::path::Path;
use std::time::Duration;

use claw_link::{ConnectionConfig, GatewaySettings, ReconnectConfig, SettingsClient};
use serde::Deserialize;
use tracing::debug;

use crate::cli::Cli;
use crate::error::CliError;

/// Display name the CLI announces in the handshake.
const CLIENT_DISPLAY_NAME: &str = "claw cli";

/// Contents of the JSON config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    /// Gateway WebSocket URL.
    #[serde(default)]
    pub gateway_url: Option<String>,
    /// Gateway bearer token.
    #[serde(default)]
    pub gateway_token: Option<String>,
    /// Settings endpoint.
    #[serde(default)]
    pub settings_url: Option<String>,
    /// Per-request timeout in milliseconds.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// First reconnect delay in milliseconds.
    #[serde(default)]
    pub reconnect_initial_ms: Option<u64>,
    /// Reconnect delay ceiling in milliseconds.
    #[serde(default)]
    pub reconnect_max_ms: Option<u64>,
}

impl FileConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CliError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn from_json(content: &str) -> Result<Self, CliError> {
        serde_json::from_str(content).map_err(|e| CliError::Config(format!("invalid JSON: {e}")))
    }
}

/// Explicit overrides taken from flags or the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Gateway URL.
    pub gateway_url: Option<String>,
    /// Gateway token.
    pub gateway_token: Option<String>,
}

impl From<&Cli> for Overrides {
    fn from(cli: &Cli) -> Self {
        Self {
            gateway_url: cli.gateway.clone(),
            gateway_token: cli.token.clone(),
        }
    }
}

/// Merge the three sources into a validated connection configuration.
///
/// # Errors
///
/// Returns an error if no source supplies a gateway URL or the result is
/// invalid.
pub fn merge(
    overrides: &Overrides,
    settings: Option<&GatewaySettings>,
    file: &FileConfig,
) -> Result<ConnectionConfig, CliError> {
    let url = overrides
        .gateway_url
        .clone()
        .or_else(|| settings.and_then(|s| s.gateway_url.clone()))
        .or_else(|| file.gateway_url.clone())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            CliError::Config(
                "no gateway URL: pass --gateway, set CLAW_GATEWAY_URL, or configure a settings endpoint"
                    .to_string(),
            )
        })?;

    let token = overrides
        .gateway_token
        .clone()
        .or_else(|| settings.and_then(|s| s.gateway_token.clone()))
        .or_else(|| file.gateway_token.clone());

    let mut config = ConnectionConfig::new(url).with_display_name(CLIENT_DISPLAY_NAME);
    config.client.mode = "cli".to_string();
    if let Some(token) = token {
        config = config.with_token(token);
    }
    if let Some(ms) = file.request_timeout_ms {
        config = config.with_request_timeout(Duration::from_millis(ms));
    }
    if file.reconnect_initial_ms.is_some() || file.reconnect_max_ms.is_some() {
        let defaults = ReconnectConfig::default();
        config = config.with_reconnect_config(ReconnectConfig {
            initial_delay: file
                .reconnect_initial_ms
                .map_or(defaults.initial_delay, Duration::from_millis),
            max_delay: file
                .reconnect_max_ms
                .map_or(defaults.max_delay, Duration::from_millis),
            ..defaults
        });
    }

    config.validate()?;
    Ok(config)
}

/// Resolve the configuration for a CLI invocation.
///
/// # Errors
///
/// Returns an error if the config file or settings endpoint cannot be read,
/// or if the merged configuration is invalid.
pub async fn resolve(cli: &Cli) -> Result<ConnectionConfig, CliError> {
    let file = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let overrides = Overrides::from(cli);

    // Settings are only consulted when flags do not already name a gateway.
    let settings_url = cli.settings_url.clone().or_else(|| file.settings_url.clone());
    let settings = match settings_url {
        Some(endpoint) if overrides.gateway_url.is_none() => {
            debug!(endpoint = %endpoint, "resolving gateway from settings endpoint");
            Some(SettingsClient::new(endpoint)?.fetch().await?)
        }
        _ => None,
    };

    merge(&overrides, settings.as_ref(), &file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("failed to write temp file");
        file
    }

    fn settings(url: &str, token: &str) -> GatewaySettings {
        GatewaySettings {
            gateway_url: Some(url.to_string()),
            gateway_token: Some(token.to_string()),
        }
    }

    #[test]
    fn test_load_file_config() {
        let file = create_temp_config(
            r#"{"gatewayUrl": "ws://file:1", "gatewayToken": "f", "requestTimeoutMs": 2500}"#,
        );
        let config = FileConfig::from_file(file.path()).expect("should parse");
        assert_eq!(config.gateway_url.as_deref(), Some("ws://file:1"));
        assert_eq!(config.request_timeout_ms, Some(2500));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(FileConfig::from_json(r#"{"gateway": "ws://x"}"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = FileConfig::from_file("/nonexistent/claw.json").unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn test_flags_beat_settings_and_file() {
        let overrides = Overrides {
            gateway_url: Some("ws://flag:1".into()),
            gateway_token: Some("flag-token".into()),
        };
        let file = FileConfig {
            gateway_url: Some("ws://file:1".into()),
            gateway_token: Some("file-token".into()),
            ..FileConfig::default()
        };
        let config = merge(&overrides, Some(&settings("ws://settings:1", "s")), &file).unwrap();
        assert_eq!(config.url, "ws://flag:1");
        assert_eq!(config.token.as_deref(), Some("flag-token"));
        assert_eq!(config.client.mode, "cli");
    }

    #[test]
    fn test_settings_beat_file() {
        let file = FileConfig {
            gateway_url: Some("ws://file:1".into()),
            gateway_token: Some("file-token".into()),
            ..FileConfig::default()
        };
        let config = merge(
            &Overrides::default(),
            Some(&settings("ws://settings:1", "settings-token")),
            &file,
        )
        .unwrap();
        assert_eq!(config.url, "ws://settings:1");
        assert_eq!(config.token.as_deref(), Some("settings-token"));
    }

    #[test]
    fn test_file_fills_gaps() {
        let overrides = Overrides {
            gateway_url: Some("ws://flag:1".into()),
            gateway_token: None,
        };
        let file = FileConfig {
            gateway_token: Some("file-token".into()),
            request_timeout_ms: Some(1000),
            reconnect_initial_ms: Some(250),
            ..FileConfig::default()
        };
        let config = merge(&overrides, None, &file).unwrap();
        assert_eq!(config.token.as_deref(), Some("file-token"));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(1)));
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_no_url_anywhere() {
        let err = merge(&Overrides::default(), None, &FileConfig::default()).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let overrides = Overrides {
            gateway_url: Some("http://invalid".into()),
            gateway_token: None,
        };
        assert!(merge(&overrides, None, &FileConfig::default()).is_err());
    }
}
