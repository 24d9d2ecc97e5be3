pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{make_request_span, request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ChatConfig;
use crate::services::{ChatOrchestrator, ChatProvider, JwtService, KvStore, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub config: ChatConfig,
    pub store: Arc<dyn KvStore>,
    pub sessions: Arc<SessionStore>,
    pub chat: Arc<ChatOrchestrator>,
    pub jwt: JwtService,
    pub chat_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire the session store, orchestrator, token verifier and rate limiter
    /// around an already connected store and provider.
    pub fn new(config: ChatConfig, store: Arc<dyn KvStore>, provider: Arc<dyn ChatProvider>) -> Self {
        let sessions = Arc::new(SessionStore::new(store.clone(), config.session.clone()));
        let chat = Arc::new(ChatOrchestrator::new(
            sessions.clone(),
            provider,
            config.chat.clone(),
        ));
        let jwt = JwtService::new(&config.jwt);
        let chat_rate_limiter = create_ip_rate_limiter(config.security.chat_requests_per_minute);

        Self {
            config,
            store,
            sessions,
            chat,
            jwt,
            chat_rate_limiter,
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(parse_origins(allowed_origins))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

fn parse_origins(allowed_origins: &[String]) -> Vec<HeaderValue> {
    allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

pub fn build_router(state: AppState) -> Router {
    let session_routes = Router::new()
        .route(
            "/api/sessions",
            post(handlers::sessions::create_session).get(handlers::sessions::list_sessions),
        )
        .route(
            "/api/sessions/:session_id",
            get(handlers::sessions::get_session).delete(handlers::sessions::delete_session),
        )
        .route(
            "/api/sessions/:session_id/extend",
            put(handlers::sessions::extend_session),
        )
        .route(
            "/api/sessions/:session_id/messages",
            get(handlers::sessions::get_messages).post(handlers::sessions::add_message),
        )
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    // Stored conversations need a principal; the catalogue and one-off chat are public.
    let chat_session_routes = Router::new()
        .route("/api/chat/session/start", post(handlers::chat::start_session))
        .route("/api/chat/session", post(handlers::chat::send_message))
        .route(
            "/api/chat/session/:session_id/history",
            get(handlers::chat::session_history),
        )
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    let chat_routes = Router::new()
        .route("/api/chat/models", get(handlers::chat::list_models))
        .route("/api/chat/models/filtered", get(handlers::chat::filtered_models))
        .route("/api/chat/cost-estimate", post(handlers::chat::cost_estimate))
        .route("/api/chat/health", get(handlers::chat::upstream_health))
        .route("/api/chat/message", post(handlers::chat::direct_message))
        .route("/api/chat/simple", post(handlers::chat::simple_chat))
        .route("/api/chat/conversation", post(handlers::chat::conversation))
        .route("/api/chat/complete", post(handlers::chat::complete))
        .merge(chat_session_routes)
        .layer(from_fn_with_state(
            state.chat_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .merge(session_routes)
        .merge(chat_routes)
        .with_state(state.clone())
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<axum::body::Body>))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
}
