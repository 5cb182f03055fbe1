//! Core read endpoints plus settings management.

use super::auth::require_api_key;
use super::SharedState;
use crate::gateway::{self, GatewayClient, TestOutcome};
use crate::store::settings::{mask_token, DashboardSettings};
use crate::workspace;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Local;
use serde_json::{json, Value};

const DEFAULT_BOT_NAME: &str = "OpenClaw";
const BOT_NAME_MAX: usize = 50;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Local::now().to_rfc3339(),
    }))
}

/// The last written snapshot, or the documented empty shape before the
/// first collector run.
pub async fn get_data(State(state): State<SharedState>) -> Json<crate::data::Snapshot> {
    Json(state.store.read_snapshot())
}

pub async fn get_history(State(state): State<SharedState>) -> Json<crate::data::DailyHistory> {
    Json(state.store.read_history())
}

/// Queue an immediate collector run. A trigger already pending counts as
/// triggered.
pub async fn trigger_collect(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if let Err(e) = require_api_key(&state, &headers) {
        return e.into_response();
    }

    match state.collect_tx.try_send(()) {
        Ok(()) | Err(tokio::sync::mpsc::error::TrySendError::Full(())) => {
            Json(json!({"triggered": true})).into_response()
        }
        Err(tokio::sync::mpsc::error::TrySendError::Closed(())) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"triggered": false, "error": "Collector is not running"})),
        )
            .into_response(),
    }
}

/// Settings for the UI: token masked, env-vs-config source markers,
/// branding auto-filled from IDENTITY.md on first read.
pub async fn get_settings(State(state): State<SharedState>) -> Json<Value> {
    let mut settings = DashboardSettings::load(&state.store);

    let mut bot_name = settings.bot_name.clone();
    if bot_name.is_empty() {
        if let Some(identity) = workspace::read_identity(&state.config.paths.workspace_dir) {
            if !identity.name.is_empty() {
                bot_name = identity.name;
                settings.bot_name = bot_name.clone();
                if let Err(e) = settings.save(&state.store) {
                    tracing::warn!("Failed to persist auto-detected bot name: {:#}", e);
                }
            }
        }
    }
    if bot_name.is_empty() {
        bot_name = DEFAULT_BOT_NAME.to_string();
    }

    let token = settings.effective_gateway_token();
    let env_url = std::env::var("OPENCLAW_GATEWAY_URL").is_ok_and(|v| !v.is_empty());
    let env_token = std::env::var("OPENCLAW_GATEWAY_TOKEN").is_ok_and(|v| !v.is_empty());

    Json(json!({
        "gateway_url": settings.effective_gateway_url(),
        "gateway_token_masked": mask_token(&token),
        "has_token": !token.is_empty(),
        "source_url": if env_url { "env" } else { "config" },
        "source_token": if env_token { "env" } else { "config" },
        "default_model": settings.default_model,
        "custom_models": settings.custom_models,
        "currency": settings.currency,
        "exchange_rate": settings.exchange_rate,
        "rate_updated": settings.rate_updated,
        "rate_stale": settings.rate_stale(),
        "onboarding_complete": settings.onboarding_complete,
        "bot_name": bot_name,
        "calendar_path": settings.calendar_path,
        "enabled_calendars": settings.enabled_calendars,
    }))
}

/// Partial settings update. A gateway change queues a collector run so the
/// status card reflects the new connection promptly.
pub async fn save_settings(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(e) = require_api_key(&state, &headers) {
        return e.into_response();
    }

    let mut settings = DashboardSettings::load(&state.store);
    let mut gateway_changed = false;

    if let Some(url) = body.get("gateway_url").and_then(Value::as_str) {
        let url = url.trim();
        if !url.is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Gateway URL must start with http:// or https://"})),
            )
                .into_response();
        }
        gateway_changed |= settings.gateway_url != url;
        settings.gateway_url = url.to_string();
    }

    if let Some(token) = body.get("gateway_token").and_then(Value::as_str) {
        let token = token.trim();
        gateway_changed |= settings.gateway_token != token;
        settings.gateway_token = token.to_string();
    }

    if let Some(model) = body.get("default_model").and_then(Value::as_str) {
        settings.default_model = model.trim().to_string();
    }

    if let Some(currency) = body.get("currency").and_then(Value::as_str) {
        settings.currency = currency.trim().to_uppercase();
    }

    if let Some(rate) = body.get("exchange_rate").and_then(Value::as_f64) {
        if rate > 0.0 {
            settings.exchange_rate = rate;
        }
    }

    if let Some(updated) = body.get("rate_updated").and_then(Value::as_str) {
        settings.rate_updated = updated.to_string();
    }

    if let Some(models) = body.get("custom_models").and_then(Value::as_array) {
        settings.custom_models = models
            .iter()
            .filter_map(Value::as_str)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
    }

    if let Some(done) = body.get("onboarding_complete").and_then(Value::as_bool) {
        settings.onboarding_complete = done;
    }

    if let Some(name) = body.get("bot_name").and_then(Value::as_str) {
        let name = name.trim();
        if !name.is_empty() {
            settings.bot_name = name.chars().take(BOT_NAME_MAX).collect();
        }
    }

    if let Some(path) = body.get("calendar_path").and_then(Value::as_str) {
        settings.calendar_path = path.trim().to_string();
    }

    if let Some(calendars) = body.get("enabled_calendars").and_then(Value::as_array) {
        settings.enabled_calendars = calendars
            .iter()
            .filter_map(Value::as_str)
            .map(|c| c.trim().to_string())
            .collect();
    }

    if let Err(e) = settings.save(&state.store) {
        tracing::warn!("Failed to save settings: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Failed to save settings"})),
        )
            .into_response();
    }

    if gateway_changed {
        let _ = state.collect_tx.try_send(());
    }

    Json(json!({"saved": true})).into_response()
}

/// Minimal gateway ping for the settings "test connection" button.
pub async fn test_gateway(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if let Err(e) = require_api_key(&state, &headers) {
        return e.into_response();
    }

    let settings = DashboardSettings::load(&state.store);
    let Some(client) = GatewayClient::from_settings(&settings) else {
        return Json(json!({"ok": false, "error": "No Gateway URL configured"})).into_response();
    };

    match client.test_connection().await {
        TestOutcome::Ok => {
            Json(json!({"ok": true, "message": "Connected successfully"})).into_response()
        }
        TestOutcome::Failed(error) => Json(json!({"ok": false, "error": error})).into_response(),
    }
}

const RATES_URL: &str = "https://open.er-api.com/v6/latest/USD";

/// Fetch USD-based exchange rates and store the requested currency's rate.
pub async fn fetch_rates(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(e) = require_api_key(&state, &headers) {
        return e.into_response();
    }

    let currency = body
        .get("currency")
        .and_then(Value::as_str)
        .map(|c| c.trim().to_uppercase())
        .unwrap_or_default();
    if currency.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Currency code required"})),
        )
            .into_response();
    }

    let result = gateway::http_client()
        .get(RATES_URL)
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await;

    let response = match result {
        Ok(r) => r,
        Err(e) if e.is_timeout() => {
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": "Exchange rate API timed out"})),
            )
                .into_response();
        }
        Err(_) => {
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": "Cannot reach exchange rate API. Check internet connection."})),
            )
                .into_response();
        }
    };

    if !response.status().is_success() {
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": format!("Rate API returned HTTP {}", response.status().as_u16())})),
        )
            .into_response();
    }

    let data: Value = match response.json().await {
        Ok(d) => d,
        Err(e) => {
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": format!("Invalid rate API response: {e}")})),
            )
                .into_response();
        }
    };

    let Some(rate) = data["rates"].get(currency.as_str()).and_then(Value::as_f64) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("Currency '{currency}' not found in rate data")})),
        )
            .into_response();
    };

    let now = Local::now().to_rfc3339();
    let mut settings = DashboardSettings::load(&state.store);
    settings.currency = currency.clone();
    settings.exchange_rate = rate;
    settings.rate_updated = now.clone();
    if let Err(e) = settings.save(&state.store) {
        tracing::warn!("Failed to save exchange rate: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Failed to save exchange rate"})),
        )
            .into_response();
    }

    Json(json!({
        "currency": currency,
        "exchange_rate": rate,
        "rate_updated": now,
    }))
    .into_response()
}
