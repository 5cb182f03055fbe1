//! Streaming chat relay to the gateway, plus persisted chat history.
//!
//! Upstream SSE data lines are re-emitted to the browser as they arrive.
//! Any upstream failure produces exactly one `{"error": ...}` event
//! followed by `[DONE]`, so the client never hangs on a half-open stream.
//! Dropping the client connection drops the stream and with it the
//! upstream read.

use super::auth::require_api_key;
use super::SharedState;
use crate::data::{ChatHistory, ChatMessage};
use crate::gateway::{endpoint_disabled_message, GatewayClient};
use crate::store::settings::DashboardSettings;
use async_stream::stream;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Turns of prior conversation forwarded for context.
const HISTORY_TURNS: usize = 6;

/// Persisted transcript cap.
const HISTORY_CAP: usize = 200;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

fn error_event(message: impl Into<String>) -> Event {
    Event::default().data(json!({"error": message.into()}).to_string())
}

fn done_event() -> Event {
    Event::default().data("[DONE]")
}

pub async fn relay(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    if let Err(e) = require_api_key(&state, &headers) {
        return e.into_response();
    }

    let settings = DashboardSettings::load(&state.store);
    let Some(client) = GatewayClient::from_settings(&settings) else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "Gateway URL not configured. Go to Settings to set it up."})),
        )
            .into_response();
    };

    let message = request.message.trim().to_string();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Empty message"})),
        )
            .into_response();
    }

    let mut messages: Vec<ChatMessage> = request
        .history
        .into_iter()
        .rev()
        .take(HISTORY_TURNS)
        .rev()
        .collect();
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: message,
    });

    let gateway_url = client.base_url().to_string();
    let relay_timeout = Duration::from_secs(state.config.server.chat_relay_timeout_secs);

    let stream = stream! {
        let deadline = Instant::now() + relay_timeout;

        let response = match timeout_at(deadline, client.stream_chat(&messages)).await {
            Err(_) => {
                yield Ok(error_event("Gateway request timed out"));
                yield Ok(done_event());
                return;
            }
            Ok(Err(e)) if e.is_connect() => {
                yield Ok(error_event(format!("Cannot connect to OpenClaw Gateway at {gateway_url}")));
                yield Ok(done_event());
                return;
            }
            Ok(Err(e)) => {
                yield Ok(error_event(e.to_string()));
                yield Ok(done_event());
                return;
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if status != StatusCode::OK {
            let message = if status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED {
                endpoint_disabled_message(status.as_u16())
            } else {
                let body = timeout_at(deadline, response.text())
                    .await
                    .ok()
                    .and_then(Result::ok)
                    .unwrap_or_default();
                let body: String = body.chars().take(500).collect();
                format!("Gateway returned {}: {}", status.as_u16(), body)
            };
            yield Ok(error_event(message));
            yield Ok(done_event());
            return;
        }

        let mut upstream = response.bytes_stream();
        let mut buffer = String::new();
        loop {
            let chunk = match timeout_at(deadline, upstream.next()).await {
                Err(_) => {
                    yield Ok(error_event("Gateway request timed out"));
                    yield Ok(done_event());
                    return;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    yield Ok(error_event(format!("Stream error: {e}")));
                    yield Ok(done_event());
                    return;
                }
                Ok(Some(Ok(chunk))) => chunk,
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim_end_matches('\r').trim().to_string();
                buffer.drain(..=pos);
                if line.is_empty() {
                    continue;
                }
                // Upstream emits "data: {...}" lines; re-emit the payload
                // and skip other SSE fields
                if let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) {
                    yield Ok::<Event, std::convert::Infallible>(Event::default().data(data.trim()));
                }
            }
        }
    };

    Sse::new(stream).into_response()
}

// -----------------------------------------------------------------------------
// Persisted history
// -----------------------------------------------------------------------------

pub async fn get_history(State(state): State<SharedState>) -> Json<ChatHistory> {
    Json(state.store.read_chat_history())
}

/// Replace the whole transcript (the frontend owns the merge), capped at
/// the last 200 messages.
pub async fn save_history(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(e) = require_api_key(&state, &headers) {
        return e.into_response();
    }

    let Some(raw) = body.get("messages").and_then(Value::as_array) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "messages must be an array"})),
        )
            .into_response();
    };

    let start = raw.len().saturating_sub(HISTORY_CAP);
    let messages: Vec<ChatMessage> = raw[start..]
        .iter()
        .filter_map(|m| serde_json::from_value(m.clone()).ok())
        .collect();
    let count = messages.len();

    if let Err(e) = state.store.write_chat_history(&ChatHistory { messages }) {
        tracing::warn!("Failed to save chat history: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Failed to save chat history"})),
        )
            .into_response();
    }

    Json(json!({"saved": true, "count": count})).into_response()
}

pub async fn clear_history(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if let Err(e) = require_api_key(&state, &headers) {
        return e.into_response();
    }

    if let Err(e) = state.store.write_chat_history(&ChatHistory::default()) {
        tracing::warn!("Failed to clear chat history: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Failed to clear chat history"})),
        )
            .into_response();
    }

    Json(json!({"cleared": true})).into_response()
}

/// Whether the chat feature is usable at all.
pub async fn status(State(state): State<SharedState>) -> Json<Value> {
    let settings = DashboardSettings::load(&state.store);
    let url = settings.effective_gateway_url();
    let has_token = !settings.effective_gateway_token().is_empty();

    Json(json!({
        "configured": !url.is_empty(),
        "gateway_url": if url.is_empty() { Value::Null } else { Value::String(url) },
        "has_token": has_token,
    }))
}
