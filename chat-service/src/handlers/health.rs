use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

/// Liveness: the process is up; reports the last known store state.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": state.config.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "store": if state.store.is_ready() { "connected" } else { "disconnected" },
        "provider": state.chat.provider().name(),
    }))
}

/// Readiness: the store answers a ping. Upstream health is reported but
/// does not fail the check.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.ping().await;
    let provider = state.chat.provider().health_check().await;

    if let Err(e) = &store {
        tracing::warn!(error = %e, "Readiness check: store unavailable");
    }
    if let Err(e) = &provider {
        tracing::warn!(error = %e, "Readiness check: upstream unavailable");
    }

    let status = if store.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if store.is_ok() { "ready" } else { "unavailable" },
            "checks": {
                "store": store.is_ok(),
                "provider": provider.is_ok(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
