//! Runtime dashboard settings, persisted as `config.json` in the data dir.
//!
//! Gateway URL/token env vars take priority over stored values so a
//! containerized deployment can pin the connection without touching the
//! settings endpoints.

use super::Store;
use anyhow::Result;
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};

pub const SETTINGS_FILE: &str = "config.json";

/// A stored exchange rate older than this is reported as stale.
pub const RATE_STALE_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub gateway_url: String,
    pub gateway_token: String,
    pub default_model: String,
    pub currency: String,
    pub exchange_rate: f64,
    /// RFC 3339 timestamp of the last rate fetch, empty if never fetched
    pub rate_updated: String,
    pub custom_models: Vec<String>,
    pub onboarding_complete: bool,
    pub bot_name: String,
    pub calendar_path: String,
    pub enabled_calendars: Vec<String>,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            gateway_url: String::new(),
            gateway_token: String::new(),
            default_model: String::new(),
            currency: "USD".to_string(),
            exchange_rate: 1.0,
            rate_updated: String::new(),
            custom_models: Vec::new(),
            onboarding_complete: false,
            bot_name: String::new(),
            calendar_path: "/calendars".to_string(),
            enabled_calendars: Vec::new(),
        }
    }
}

impl DashboardSettings {
    pub fn load(store: &Store) -> Self {
        store.read_json(SETTINGS_FILE).unwrap_or_default()
    }

    pub fn save(&self, store: &Store) -> Result<()> {
        store.with_resource_lock(SETTINGS_FILE, |s| s.write_json_atomic(SETTINGS_FILE, self))
    }

    /// Gateway URL with env override ($OPENCLAW_GATEWAY_URL wins).
    pub fn effective_gateway_url(&self) -> String {
        override_or(std::env::var("OPENCLAW_GATEWAY_URL").ok(), &self.gateway_url)
    }

    /// Gateway token with env override ($OPENCLAW_GATEWAY_TOKEN wins).
    pub fn effective_gateway_token(&self) -> String {
        override_or(
            std::env::var("OPENCLAW_GATEWAY_TOKEN").ok(),
            &self.gateway_token,
        )
    }

    /// Model to request from the gateway.
    pub fn model(&self) -> String {
        if self.default_model.is_empty() {
            "openclaw:main".to_string()
        } else {
            self.default_model.clone()
        }
    }

    /// Whether the stored exchange rate is older than [`RATE_STALE_DAYS`].
    /// A never-fetched rate (manual or default) is not flagged.
    pub fn rate_stale(&self) -> bool {
        if self.rate_updated.is_empty() {
            return false;
        }
        match DateTime::parse_from_rfc3339(&self.rate_updated) {
            Ok(updated) => {
                Local::now().signed_duration_since(updated) > Duration::days(RATE_STALE_DAYS)
            }
            Err(_) => true,
        }
    }
}

/// A non-empty env value beats the stored one.
fn override_or(env: Option<String>, stored: &str) -> String {
    env.filter(|v| !v.is_empty())
        .unwrap_or_else(|| stored.to_string())
}

/// Mask a token for display: first and last 4 chars visible on long
/// tokens, almost everything hidden on short ones. Counts chars, not
/// bytes, since tokens are stored verbatim and may not be ASCII.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    if chars.len() > 10 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
    } else {
        let visible = chars.len().min(2);
        let head: String = chars[..visible].iter().collect();
        format!("{head}{}", "*".repeat(chars.len() - visible))
    }
}
