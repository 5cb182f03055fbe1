//! Client for the agent's OpenAI-compatible gateway.
//!
//! Covers the three ways the dashboard talks to the gateway: streaming chat
//! relayed to the browser, one-shot completions used by the khal calendar
//! fallback, and cheap liveness/connectivity probes.

pub mod khal;

use crate::data::ChatMessage;
use crate::store::settings::DashboardSettings;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::time::Duration;

/// Shared client for one-shot requests, pooled connections.
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build HTTP client")
});

/// Streaming client: no overall timeout since chat responses can run long.
/// The relay enforces its own deadline around each read.
static STREAM_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to build streaming HTTP client")
});

/// Shared pooled client for miscellaneous outbound requests (exchange
/// rates). Same 30 s budget as the gateway one-shots.
pub fn http_client() -> &'static reqwest::Client {
    &HTTP_CLIENT
}

/// Outcome of a connectivity test, serialized for the settings UI.
#[derive(Debug, Clone, PartialEq)]
pub enum TestOutcome {
    Ok,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    url: String,
    token: String,
    model: String,
}

impl GatewayClient {
    pub fn new(url: &str, token: &str, model: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            model: model.to_string(),
        }
    }

    /// Build a client from the stored settings (env overrides applied).
    /// `None` when no gateway URL is configured.
    pub fn from_settings(settings: &DashboardSettings) -> Option<Self> {
        let url = settings.effective_gateway_url();
        if url.is_empty() {
            return None;
        }
        Some(Self::new(
            &url,
            &settings.effective_gateway_token(),
            &settings.model(),
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.url
    }

    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.url)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.token)
        }
    }

    /// One-shot completion, returning the assistant message content.
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": max_tokens,
        });

        let response = self
            .authorized(HTTP_CLIENT.post(self.completions_url()))
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Failed to reach gateway at {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Gateway returned HTTP {}", status.as_u16());
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse gateway response")?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(content)
    }

    /// Start a streaming chat completion. The caller inspects the status and
    /// reads the SSE body incrementally.
    pub async fn stream_chat(&self, messages: &[ChatMessage]) -> reqwest::Result<reqwest::Response> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });

        self.authorized(STREAM_CLIENT.post(self.completions_url()))
            .json(&payload)
            .send()
            .await
    }

    /// Liveness probe: any HTTP response below 500 means the gateway process
    /// is up, even a 404. Tries a few well-known paths.
    pub async fn probe(&self) -> bool {
        for path in ["/v1/models", "/v1/chat/completions", "/"] {
            let url = format!("{}{}", self.url, path);
            let request = self
                .authorized(HTTP_CLIENT.get(&url))
                .timeout(Duration::from_secs(5));

            match request.send().await {
                Ok(response) if response.status().as_u16() < 500 => return true,
                Ok(response) => {
                    tracing::debug!("Gateway probe {} returned {}", path, response.status());
                }
                Err(e) => {
                    tracing::debug!("Gateway probe {} failed: {}", path, e);
                }
            }
        }
        false
    }

    /// Minimal chat ping used by the settings "test connection" button.
    /// A 4xx from the gateway still proves connectivity, so each status maps
    /// to an actionable message rather than a bare error.
    pub async fn test_connection(&self) -> TestOutcome {
        let payload = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": "ping"}],
            "max_tokens": 1,
        });

        let result = self
            .authorized(HTTP_CLIENT.post(self.completions_url()))
            .json(&payload)
            .timeout(Duration::from_secs(10))
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return TestOutcome::Failed("Connection timed out".to_string());
            }
            Err(e) if e.is_connect() => {
                return TestOutcome::Failed(format!("Cannot connect to {}", self.url));
            }
            Err(e) => return TestOutcome::Failed(e.to_string()),
        };

        match response.status().as_u16() {
            200 => TestOutcome::Ok,
            401 => TestOutcome::Failed("Authentication failed. Check your token.".to_string()),
            404 | 405 => TestOutcome::Failed(endpoint_disabled_message(response.status().as_u16())),
            code => TestOutcome::Failed(format!("Gateway returned HTTP {code}")),
        }
    }
}

/// The actionable message for a gateway with chat completions disabled.
pub fn endpoint_disabled_message(code: u16) -> String {
    format!(
        "The Chat Completions HTTP endpoint is not enabled on your Gateway (HTTP {code}). \
         Enable it in your OpenClaw config: \
         {{ \"gateway\": {{ \"http\": {{ \"endpoints\": {{ \"chatCompletions\": {{ \"enabled\": true }} }} }} }} }} \
         then restart the Gateway."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = GatewayClient::new("http://gw:18789/", "", "openclaw:main");
        assert_eq!(
            client.completions_url(),
            "http://gw:18789/v1/chat/completions"
        );
    }

    #[test]
    fn test_from_settings_requires_url() {
        let settings = DashboardSettings::default();
        assert!(GatewayClient::from_settings(&settings).is_none());

        let mut settings = DashboardSettings::default();
        settings.gateway_url = "http://gw:18789".to_string();
        settings.gateway_token = "tok-12345".to_string();
        let client = GatewayClient::from_settings(&settings).unwrap();
        assert!(client.has_token());
        assert_eq!(client.base_url(), "http://gw:18789");
    }

    #[test]
    fn test_endpoint_disabled_message_names_status() {
        let msg = endpoint_disabled_message(404);
        assert!(msg.contains("HTTP 404"));
        assert!(msg.contains("chatCompletions"));
    }
}
