//! Read endpoints, settings round trips, and the bearer-token guard.

mod test_utils;

use pretty_assertions::assert_eq;
use serde_json::json;
use test_utils::{request, Fixture};

#[tokio::test]
async fn health_reports_ok() {
    let fixture = Fixture::new();
    let (router, _rx) = fixture.router();

    let (status, body) = request(router, "GET", "/api/health", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn data_before_first_collection_is_empty_shape() {
    let fixture = Fixture::new();
    let (router, _rx) = fixture.router();

    let (status, body) = request(router, "GET", "/api/data", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["totalTokens"], 0);
    assert_eq!(body["sessionCount"], 0);
    assert!(body["sessions"].as_array().unwrap().is_empty());
    assert_eq!(body["agentStatus"]["running"], false);
}

#[tokio::test]
async fn history_defaults_to_empty_daily_map() {
    let fixture = Fixture::new();
    let (router, _rx) = fixture.router();

    let (status, body) = request(router, "GET", "/api/history", None).await;
    assert_eq!(status, 200);
    assert!(body["daily"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn collect_endpoint_queues_a_trigger() {
    let fixture = Fixture::new();
    let (router, mut rx) = fixture.router();

    let (status, body) = request(router, "POST", "/api/collect", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["triggered"], true);
    assert!(rx.try_recv().is_ok());
}

#[tokio::test]
async fn settings_round_trip_and_validation() {
    let fixture = Fixture::new();
    let (router, _rx) = fixture.router();

    let (status, body) = request(
        router.clone(),
        "POST",
        "/api/settings",
        Some(json!({
            "gateway_url": "http://gw:18789",
            "gateway_token": "tok-1234567890abc",
            "currency": "eur",
            "bot_name": "Scuttle",
        })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["saved"], true);

    let (_, settings) = request(router, "GET", "/api/settings", None).await;
    assert_eq!(settings["gateway_url"], "http://gw:18789");
    assert_eq!(settings["currency"], "EUR");
    assert_eq!(settings["bot_name"], "Scuttle");
    assert_eq!(settings["has_token"], true);
    assert_eq!(settings["rate_stale"], false);
    // Token never comes back in the clear
    let masked = settings["gateway_token_masked"].as_str().unwrap();
    assert!(masked.contains('*'));
    assert_ne!(masked, "tok-1234567890abc");
}

#[tokio::test]
async fn settings_rejects_non_http_gateway_url() {
    let fixture = Fixture::new();
    let (router, _rx) = fixture.router();

    let (status, body) = request(
        router,
        "POST",
        "/api/settings",
        Some(json!({"gateway_url": "ftp://nope"})),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("http"));
}

#[tokio::test]
async fn gateway_settings_change_triggers_collect() {
    let fixture = Fixture::new();
    let (router, mut rx) = fixture.router();

    request(
        router,
        "POST",
        "/api/settings",
        Some(json!({"gateway_url": "http://gw:18789"})),
    )
    .await;
    assert!(rx.try_recv().is_ok());
}

#[tokio::test]
async fn writes_require_bearer_token_when_key_configured() {
    let mut fixture = Fixture::new();
    fixture.config.server.api_key = Some("sekrit".to_string());
    let (router, _rx) = fixture.router();

    // Reads stay open
    let (status, _) = request(router.clone(), "GET", "/api/goals", None).await;
    assert_eq!(status, 200);

    // Writes without the key are rejected
    let (status, body) = request(
        router.clone(),
        "POST",
        "/api/goals",
        Some(json!({"title": "x"})),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "Unauthorized");

    // With the right key they pass
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;
    let request = Request::builder()
        .method("POST")
        .uri("/api/goals")
        .header("content-type", "application/json")
        .header("authorization", "Bearer sekrit")
        .body(Body::from(json!({"title": "x"}).to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn chat_status_reports_unconfigured() {
    let fixture = Fixture::new();
    let (router, _rx) = fixture.router();

    let (status, body) = request(router, "GET", "/api/chat/status", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["configured"], false);
    assert!(body["gateway_url"].is_null());
}

#[tokio::test]
async fn chat_history_save_cap_and_clear() {
    let fixture = Fixture::new();
    let (router, _rx) = fixture.router();

    let messages: Vec<_> = (0..210)
        .map(|i| json!({"role": "user", "content": format!("msg {i}")}))
        .collect();
    let (status, body) = request(
        router.clone(),
        "POST",
        "/api/chat/history",
        Some(json!({"messages": messages})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 200);

    let (_, stored) = request(router.clone(), "GET", "/api/chat/history", None).await;
    let stored_messages = stored["messages"].as_array().unwrap();
    assert_eq!(stored_messages.len(), 200);
    assert_eq!(stored_messages[0]["content"], "msg 10");

    let (status, body) = request(
        router.clone(),
        "POST",
        "/api/chat/history",
        Some(json!({"messages": "not an array"})),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("array"));

    let (status, body) = request(router.clone(), "DELETE", "/api/chat/history", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["cleared"], true);

    let (_, stored) = request(router, "GET", "/api/chat/history", None).await;
    assert!(stored["messages"].as_array().unwrap().is_empty());
}
