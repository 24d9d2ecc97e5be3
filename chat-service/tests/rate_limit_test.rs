mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{test_config, TestApp};
use tower::ServiceExt;

fn from_ip(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn chat_routes_are_limited_per_ip() {
    let mut config = test_config();
    config.security.chat_requests_per_minute = 2;
    let app = TestApp::with_config(config);

    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(from_ip("/api/chat/models", "203.0.113.7"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .router
        .clone()
        .oneshot(from_ip("/api/chat/models", "203.0.113.7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));

    let other = app
        .router
        .clone()
        .oneshot(from_ip("/api/chat/models", "203.0.113.8"))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_is_not_rate_limited() {
    let mut config = test_config();
    config.security.chat_requests_per_minute = 1;
    let app = TestApp::with_config(config);

    for _ in 0..3 {
        let response = app
            .router
            .clone()
            .oneshot(from_ip("/health", "203.0.113.9"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
