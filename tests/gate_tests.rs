use assert_json_diff::assert_json_eq;
use axum::{body::Body, extract::ConnectInfo, Router};
use futures::future::join_all;
use http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use windowgate::{
    build_app,
    cors::CorsConfig,
    rate_limit::{RateLimitConfig, RateLimiter},
    store::MemoryCounterStore,
};

/// Helper function to create a gated app over an in-memory store
fn setup_app(config: RateLimitConfig) -> (Router, Arc<MemoryCounterStore>) {
    let store = Arc::new(MemoryCounterStore::new());
    let limiter = RateLimiter::new(store.clone(), config);
    let app = build_app(limiter, &CorsConfig::default(), None).unwrap();
    (app, store)
}

fn request_from(ip: Option<[u8; 4]>, path: &str) -> Request<Body> {
    let mut request = Request::builder()
        .uri(path)
        .method("GET")
        .body(Body::empty())
        .unwrap();

    if let Some(ip) = ip {
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
    }

    request
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };

    (status, json)
}

async fn get_resource(app: &Router, ip: [u8; 4]) -> (StatusCode, Value) {
    send(app, request_from(Some(ip), "/api/resource")).await
}

#[tokio::test(start_paused = true)]
async fn test_limit_two_window_sixty_end_to_end() {
    let (app, _store) = setup_app(RateLimitConfig::new(2, 60));
    let client = [203, 0, 113, 7];

    let (status, body) = get_resource(&app, client).await;
    assert_eq!(status, StatusCode::OK);
    assert_json_eq!(
        body,
        json!({ "message": "Success! You have accessed the protected resource." })
    );

    let (status, _) = get_resource(&app, client).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get_resource(&app, client).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_json_eq!(
        body,
        json!({ "message": "Too Many Requests", "limit": 2, "window": "60s" })
    );

    tokio::time::advance(Duration::from_secs(61)).await;

    let (status, _) = get_resource(&app, client).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rejection_carries_rate_limit_headers() {
    let (app, _store) = setup_app(RateLimitConfig::new(1, 30));
    let client = [10, 0, 0, 1];

    get_resource(&app, client).await;
    let response = app
        .clone()
        .oneshot(request_from(Some(client), "/api/resource"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "1");
    assert_eq!(response.headers().get("retry-after").unwrap(), "30");
}

#[tokio::test]
async fn test_clients_are_limited_independently() {
    let (app, _store) = setup_app(RateLimitConfig::new(3, 60));

    for _ in 0..3 {
        assert_eq!(get_resource(&app, [10, 0, 0, 1]).await.0, StatusCode::OK);
    }
    assert_eq!(
        get_resource(&app, [10, 0, 0, 1]).await.0,
        StatusCode::TOO_MANY_REQUESTS
    );

    assert_eq!(get_resource(&app, [10, 0, 0, 2]).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_unresolvable_address_uses_shared_fallback_bucket() {
    let (app, store) = setup_app(RateLimitConfig::new(1, 60));

    let (status, _) = send(&app, request_from(None, "/api/resource")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, request_from(None, "/api/resource")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    assert_eq!(store.count("windowgate:ratelimit:unknown"), Some(2));
}

#[tokio::test]
async fn test_fail_open_when_store_not_ready() {
    let (app, store) = setup_app(RateLimitConfig::new(1, 60));
    let client = [192, 168, 0, 10];

    get_resource(&app, client).await;
    assert_eq!(
        get_resource(&app, client).await.0,
        StatusCode::TOO_MANY_REQUESTS
    );

    store.set_ready(false);
    for _ in 0..5 {
        assert_eq!(get_resource(&app, client).await.0, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_fail_open_when_transaction_fails() {
    let (app, store) = setup_app(RateLimitConfig::new(1, 60));
    store.set_failing(true);

    for _ in 0..5 {
        assert_eq!(get_resource(&app, [192, 168, 0, 11]).await.0, StatusCode::OK);
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_fail_closed_returns_service_unavailable() {
    let (app, store) = setup_app(RateLimitConfig::new(5, 60).with_fail_open(false));
    store.set_failing(true);

    let (status, body) = get_resource(&app, [192, 168, 0, 12]).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], 503);
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let (app, store) = setup_app(RateLimitConfig::new(1, 60));
    let client = [172, 16, 0, 1];

    for _ in 0..5 {
        let (status, body) = send(&app, request_from(Some(client), "/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_json_eq!(body, json!({ "status": "ok", "store": "ready" }));
    }

    store.set_ready(false);
    let (_, body) = send(&app, request_from(Some(client), "/health")).await;
    assert_eq!(body["store"], "error");

    assert_eq!(store.count("windowgate:ratelimit:172.16.0.1"), None);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let (app, store) = setup_app(RateLimitConfig::new(5, 60));

    let mut request = request_from(Some([198, 51, 100, 1]), "/api/resource");
    request
        .headers_mut()
        .insert("origin", "https://frontend.example".parse().unwrap());

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );

    // Preflight is answered by the CORS layer and does not consume quota
    let preflight = Request::builder()
        .uri("/api/resource")
        .method(Method::OPTIONS)
        .header("origin", "https://frontend.example")
        .header("access-control-request-method", "GET")
        .extension(ConnectInfo(SocketAddr::from(([198, 51, 100, 1], 40000))))
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(preflight).await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(store.count("windowgate:ratelimit:198.51.100.1"), Some(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_respect_limit() {
    let (app, store) = setup_app(RateLimitConfig::new(10, 60));
    let client = [100, 64, 0, 1];

    let responses = join_all((0..40).map(|_| {
        let app = app.clone();
        tokio::spawn(async move { get_resource(&app, client).await.0 })
    }))
    .await;

    let statuses: Vec<StatusCode> = responses.into_iter().map(|r| r.unwrap()).collect();
    let admitted = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    let rejected = statuses
        .iter()
        .filter(|s| **s == StatusCode::TOO_MANY_REQUESTS)
        .count();

    assert_eq!(admitted, 10);
    assert_eq!(rejected, 30);
    assert_eq!(store.count("windowgate:ratelimit:100.64.0.1"), Some(40));
}
