//! Gateway settings fetched over HTTP.
//!
//! Hosts that manage several gateways expose the active gateway's URL and
//! token from a small JSON endpoint: `{"gatewayUrl": "...", "gatewayToken": "..."}`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::{LinkError, LinkResult};

/// Request timeout for the settings endpoint.
const SETTINGS_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings served by the settings endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySettings {
    /// Gateway WebSocket URL.
    #[serde(default)]
    pub gateway_url: Option<String>,
    /// Gateway bearer token.
    #[serde(default)]
    pub gateway_token: Option<String>,
}

impl GatewaySettings {
    /// Build a connection configuration from these settings.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Settings`] if no gateway URL was provided.
    pub fn into_config(self) -> LinkResult<ConnectionConfig> {
        let url = self
            .gateway_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| LinkError::Settings("settings carry no gateway url".to_string()))?;
        let config = ConnectionConfig::new(url);
        Ok(match self.gateway_token {
            Some(token) => config.with_token(token),
            None => config,
        })
    }
}

/// Client for the settings endpoint.
#[derive(Debug, Clone)]
pub struct SettingsClient {
    endpoint: String,
    http: reqwest::Client,
}

impl SettingsClient {
    /// Create a client for the given endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>) -> LinkResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(SETTINGS_TIMEOUT)
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }

    /// Endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the current settings.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Settings`] on transport failure, a non-success
    /// status, or an unparseable body.
    pub async fn fetch(&self) -> LinkResult<GatewaySettings> {
        debug!(endpoint = %self.endpoint, "fetching gateway settings");
        let response = self.http.get(&self.endpoint).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LinkError::Settings(format!(
                "settings endpoint returned {status}"
            )));
        }

        response
            .json::<GatewaySettings>()
            .await
            .map_err(|e| LinkError::Settings(format!("invalid settings body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_settings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/settings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "gatewayUrl": "ws://127.0.0.1:18789",
                "gatewayToken": "abc"
            })))
            .mount(&server)
            .await;

        let client = SettingsClient::new(format!("{}/api/settings", server.uri())).unwrap();
        let settings = client.fetch().await.unwrap();
        assert_eq!(settings.gateway_url.as_deref(), Some("ws://127.0.0.1:18789"));

        let config = settings.into_config().unwrap();
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/settings"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let client = SettingsClient::new(format!("{}/api/settings", server.uri())).unwrap();
        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, LinkError::Settings(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = SettingsClient::new(server.uri()).unwrap();
        assert!(matches!(client.fetch().await, Err(LinkError::Settings(_))));
    }

    #[test]
    fn test_missing_url_is_rejected() {
        let settings = GatewaySettings {
            gateway_url: None,
            gateway_token: Some("abc".to_string()),
        };
        assert!(matches!(settings.into_config(), Err(LinkError::Settings(_))));
    }

    #[test]
    fn test_settings_without_token() {
        let settings: GatewaySettings =
            serde_json::from_value(json!({"gatewayUrl": "wss://gw.example.com"})).unwrap();
        let config = settings.into_config().unwrap();
        assert!(config.token.is_none());
    }
}
