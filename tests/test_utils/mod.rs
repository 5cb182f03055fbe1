//! Test utilities and fixtures for clawdash tests

#![allow(dead_code)]

use clawdash::config::Config;
use clawdash::server::{build_router, AppState};
use clawdash::store::Store;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// A workspace of temp directories standing in for the agent's disk layout.
pub struct Fixture {
    pub root: TempDir,
    pub config: Config,
    pub store: Store,
}

impl Fixture {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let data_dir = root.path().join("data");
        let sessions_dir = root.path().join("sessions");
        let workspace_dir = root.path().join("workspace");
        std::fs::create_dir_all(&sessions_dir).unwrap();
        std::fs::create_dir_all(&workspace_dir).unwrap();

        let mut config = Config::default();
        config.paths.data_dir = data_dir.clone();
        config.paths.sessions_dir = sessions_dir;
        config.paths.workspace_dir = workspace_dir;
        config.paths.log_files = vec![root.path().join("agent.log")];

        let store = Store::new(&data_dir).unwrap();
        Self { root, config, store }
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.config.paths.sessions_dir
    }

    /// Write a transcript file of `bytes` size, backdated by `age`.
    pub fn write_session(&self, name: &str, bytes: usize, age: Duration) {
        let path = self.sessions_dir().join(format!("{name}.jsonl"));
        std::fs::write(&path, "x".repeat(bytes)).unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    /// Write the sessions.json index with authoritative token/cost figures.
    pub fn write_session_index(&self, entries: &[(&str, u64, f64)]) {
        let mut index = serde_json::Map::new();
        for (id, tokens, cost) in entries {
            index.insert(
                format!("agent:default:{id}"),
                serde_json::json!({
                    "sessionId": id,
                    "updatedAt": 1706745600000u64,
                    "totalTokens": tokens,
                    "cost": cost,
                }),
            );
        }
        std::fs::write(
            self.sessions_dir().join("sessions.json"),
            serde_json::to_string_pretty(&Value::Object(index)).unwrap(),
        )
        .unwrap();
    }

    /// An in-process router over this fixture's store, without a live
    /// collector behind the trigger channel.
    pub fn router(&self) -> (axum::Router, mpsc::Receiver<()>) {
        let (collect_tx, collect_rx) = mpsc::channel(4);
        let state = Arc::new(AppState {
            config: self.config.clone(),
            store: self.store.clone(),
            collect_tx,
        });
        (build_router(state), collect_rx)
    }
}

/// Run one collection pass over the fixture.
pub async fn collect(fixture: &Fixture) -> clawdash::data::Snapshot {
    clawdash::collector::collect_once(&fixture.config, &fixture.store)
        .await
        .unwrap()
}

/// Send a request to the router and return (status, parsed JSON body).
pub async fn request(
    router: axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (axum::http::StatusCode, Value) {
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    let mut builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            builder.body(Body::from(json.to_string())).unwrap()
        }
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
