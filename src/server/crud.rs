//! CRUD endpoints for goals, content ideas, and learning entries.
//!
//! Records are stored as raw JSON with generated ids and display-format
//! timestamps. Unknown ids are a 404 with the file left untouched.

use super::auth::require_api_key;
use super::SharedState;
use crate::store::resources::{self, ResourceFile, CONTENT, GOALS, LEARNING};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

fn list(state: &SharedState, resource: &ResourceFile) -> Json<Value> {
    Json(resource.list(&state.store))
}

fn create(
    state: &SharedState,
    headers: &HeaderMap,
    resource: &ResourceFile,
    record: Value,
) -> Response {
    if let Err(e) = require_api_key(state, headers) {
        return e.into_response();
    }

    match resource.create(&state.store, record) {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => {
            tracing::warn!("Failed to create {} record: {:#}", resource.key, e);
            storage_error()
        }
    }
}

fn update(
    state: &SharedState,
    headers: &HeaderMap,
    resource: &ResourceFile,
    id: &str,
    patch: &Value,
) -> Response {
    if let Err(e) = require_api_key(state, headers) {
        return e.into_response();
    }

    match resource.update(&state.store, id, patch) {
        Ok(Some(updated)) => Json(updated).into_response(),
        Ok(None) => not_found(),
        Err(e) => {
            tracing::warn!("Failed to update {} record {}: {:#}", resource.key, id, e);
            storage_error()
        }
    }
}

fn delete(state: &SharedState, headers: &HeaderMap, resource: &ResourceFile, id: &str) -> Response {
    if let Err(e) = require_api_key(state, headers) {
        return e.into_response();
    }

    match resource.delete(&state.store, id) {
        Ok(true) => Json(json!({"deleted": id})).into_response(),
        Ok(false) => not_found(),
        Err(e) => {
            tracing::warn!("Failed to delete {} record {}: {:#}", resource.key, id, e);
            storage_error()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"error": "Not found"}))).into_response()
}

fn storage_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Storage error"})),
    )
        .into_response()
}

fn field<'a>(body: &'a Value, key: &str) -> &'a Value {
    body.get(key).unwrap_or(&Value::Null)
}

fn str_field(body: &Value, key: &str, default: &str) -> String {
    field(body, key)
        .as_str()
        .unwrap_or(default)
        .to_string()
}

fn array_field(body: &Value, key: &str) -> Value {
    match field(body, key) {
        Value::Array(a) => Value::Array(a.clone()),
        _ => json!([]),
    }
}

// -----------------------------------------------------------------------------
// Goals
// -----------------------------------------------------------------------------

pub async fn list_goals(State(state): State<SharedState>) -> Json<Value> {
    list(&state, &GOALS)
}

pub async fn create_goal(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let now = resources::timestamp();
    let record = json!({
        "id": resources::new_id(),
        "title": str_field(&body, "title", ""),
        "description": str_field(&body, "description", ""),
        "milestones": array_field(&body, "milestones"),
        "progress": field(&body, "progress").as_i64().unwrap_or(0),
        "status": str_field(&body, "status", "active"),
        "deadline": str_field(&body, "deadline", ""),
        "created": now,
        "updated": now,
    });
    create(&state, &headers, &GOALS, record)
}

pub async fn update_goal(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    update(&state, &headers, &GOALS, &id, &body)
}

pub async fn delete_goal(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    delete(&state, &headers, &GOALS, &id)
}

// -----------------------------------------------------------------------------
// Content ideas
// -----------------------------------------------------------------------------

pub async fn list_content(State(state): State<SharedState>) -> Json<Value> {
    list(&state, &CONTENT)
}

pub async fn create_content(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let now = resources::timestamp();
    let record = json!({
        "id": resources::new_id(),
        "title": str_field(&body, "title", ""),
        "type": str_field(&body, "type", "idea"),
        "tags": array_field(&body, "tags"),
        "notes": str_field(&body, "notes", ""),
        "status": str_field(&body, "status", "idea"),
        "created": now,
        "updated": now,
    });
    create(&state, &headers, &CONTENT, record)
}

pub async fn update_content(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    update(&state, &headers, &CONTENT, &id, &body)
}

pub async fn delete_content(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    delete(&state, &headers, &CONTENT, &id)
}

// -----------------------------------------------------------------------------
// Learning log (append and delete only, capped at the last 100)
// -----------------------------------------------------------------------------

pub async fn list_learning(State(state): State<SharedState>) -> Json<Value> {
    list(&state, &LEARNING)
}

pub async fn create_learning(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let record = json!({
        "id": resources::new_id(),
        "type": str_field(&body, "type", "observation"),
        "title": str_field(&body, "title", ""),
        "detail": str_field(&body, "detail", ""),
        "outcome": str_field(&body, "outcome", ""),
        "date": resources::timestamp(),
    });
    create(&state, &headers, &LEARNING, record)
}

pub async fn delete_learning(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    delete(&state, &headers, &LEARNING, &id)
}
