//! Optional bearer-token guard for mutating endpoints.
//!
//! Reads stay open; writes require `Authorization: Bearer <key>` once a key
//! is configured (config file or DASHBOARD_API_KEY env var).

use super::AppState;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};

pub type AuthError = (StatusCode, Json<Value>);

/// Check the request against the configured API key. No configured key
/// means open access.
pub fn require_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), AuthError> {
    let Some(expected) = state.config.api_key() else {
        return Ok(());
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if provided == Some(expected.as_str()) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized"})),
        ))
    }
}
