//! HTTP API layer: route table, shared state, and the serve loop.

pub mod auth;
pub mod calendar;
pub mod chat;
pub mod crud;
pub mod handlers;

use crate::config::Config;
use crate::store::Store;
use anyhow::{Context, Result};
use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

/// Shared across handlers and the collector trigger path.
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub collect_tx: mpsc::Sender<()>,
}

pub type SharedState = Arc<AppState>;

pub fn build_router(state: SharedState) -> Router {
    // The dashboard is self-hosted behind the user's own network; keep the
    // browser side unrestricted.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/data", get(handlers::get_data))
        .route("/api/history", get(handlers::get_history))
        .route("/api/collect", post(handlers::trigger_collect))
        .route("/api/goals", get(crud::list_goals).post(crud::create_goal))
        .route(
            "/api/goals/:id",
            put(crud::update_goal).delete(crud::delete_goal),
        )
        .route(
            "/api/content",
            get(crud::list_content).post(crud::create_content),
        )
        .route(
            "/api/content/:id",
            put(crud::update_content).delete(crud::delete_content),
        )
        .route(
            "/api/learning",
            get(crud::list_learning).post(crud::create_learning),
        )
        .route("/api/learning/:id", delete(crud::delete_learning))
        .route("/api/chat", post(chat::relay))
        .route(
            "/api/chat/history",
            get(chat::get_history)
                .post(chat::save_history)
                .delete(chat::clear_history),
        )
        .route("/api/chat/status", get(chat::status))
        .route("/api/calendars/discover", get(calendar::discover))
        .route("/api/calendars/events", get(calendar::events))
        .route(
            "/api/settings",
            get(handlers::get_settings).post(handlers::save_settings),
        )
        .route("/api/settings/test", post(handlers::test_gateway))
        .route("/api/settings/rates", post(handlers::fetch_rates))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(state: SharedState) -> Result<()> {
    let port = state.config.server.port;
    let router = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("Dashboard API listening on http://{addr}");
    axum::serve(listener, router)
        .await
        .context("Server error")?;
    Ok(())
}
