//! Shared setup for chat-service integration tests.
//!
//! Builds the full router over an in-memory store and the mock provider, so
//! no Redis or upstream model is needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chat_service::{
    build_router,
    config::{
        ChatConfig, ChatSettings, JwtConfig, OpenRouterConfig, SecurityConfig, SessionConfig,
        StoreBackend, StoreConfig,
    },
    models::Principal,
    services::{ChatProvider, KvStore, MemoryStore, MockChatProvider},
    AppState,
};
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::Value;
use service_core::config::{Config, Environment};
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

pub fn test_config() -> ChatConfig {
    ChatConfig {
        common: Config {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        environment: Environment::Test,
        service_name: "chat-service".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        store: StoreConfig {
            backend: StoreBackend::Memory,
            redis_url: Secret::new("redis://127.0.0.1:6379/0".to_string()),
        },
        session: SessionConfig::default(),
        chat: ChatSettings::default(),
        openrouter: OpenRouterConfig {
            api_key: None,
            base_url: "http://127.0.0.1:0".to_string(),
            timeout_seconds: 5,
            referer: "http://localhost:3000".to_string(),
            app_name: "Chat Backend".to_string(),
        },
        jwt: JwtConfig {
            secret: Secret::new(TEST_JWT_SECRET.to_string()),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            chat_requests_per_minute: 1000,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<MockChatProvider>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ChatConfig) -> Self {
        Self::with_provider(config, MockChatProvider::default())
    }

    pub fn with_provider(config: ChatConfig, provider: MockChatProvider) -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(provider);
        let state = AppState::new(
            config,
            store.clone() as Arc<dyn KvStore>,
            provider.clone() as Arc<dyn ChatProvider>,
        );

        Self {
            router: build_router(state.clone()),
            state,
            store,
            provider,
        }
    }

    /// A valid bearer token for `user_id`.
    pub fn token_for(&self, user_id: &str) -> String {
        let principal = Principal {
            id: user_id.to_string(),
            email: format!("{}@example.com", user_id),
            name: format!("User {}", user_id),
        };
        self.state
            .jwt
            .issue(&principal, 15)
            .expect("Failed to sign test token")
    }

    /// Send a request through the router and decode the JSON body
    /// (`Value::Null` when the body is empty or not JSON).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    /// Create a session through the API and return its id.
    pub async fn create_session(&self, token: &str, title: &str) -> String {
        let (status, body) = self
            .post(
                "/api/sessions",
                Some(token),
                serde_json::json!({ "title": title }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        body["data"]["id"]
            .as_str()
            .expect("session id missing")
            .to_string()
    }
}
