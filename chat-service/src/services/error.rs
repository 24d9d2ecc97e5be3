use crate::models::DecodeError;
use crate::services::providers::ProviderError;
use service_core::error::AppError;
use thiserror::Error;

/// Failures of the key-value store adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Key-value store is not connected")]
    NotConnected,

    #[error("Failed to connect to key-value store: {0}")]
    Connection(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt record at '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: DecodeError,
    },

    #[error("Store command failed: {0}")]
    Command(String),
}

impl StoreError {
    /// Whether the failure means the store could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        match self {
            StoreError::NotConnected | StoreError::Connection(_) => true,
            StoreError::Redis(e) => {
                e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal()
            }
            StoreError::Corrupt { .. } | StoreError::Command(_) => false,
        }
    }
}

/// Errors surfaced by the session store and the chat orchestrator.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Upstream model error: {0}")]
    Upstream(String),
}

impl ChatError {
    pub fn session_not_found() -> Self {
        ChatError::NotFound("Session not found".to_string())
    }
}

impl From<ProviderError> for ChatError {
    fn from(err: ProviderError) -> Self {
        ChatError::Upstream(err.to_string())
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ChatError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ChatError::Store(e) if e.is_connectivity() => AppError::ServiceUnavailable(e.to_string()),
            ChatError::Store(e) => AppError::InternalError(anyhow::Error::new(e)),
            ChatError::Upstream(msg) => AppError::BadGateway(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::axum::{http::StatusCode, response::IntoResponse};

    fn status_of(err: ChatError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_http_statuses() {
        assert_eq!(
            status_of(ChatError::Validation("sessionId and message are required".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ChatError::session_not_found()), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ChatError::Store(StoreError::NotConnected)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ChatError::Upstream("quota exceeded".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn corrupt_records_are_internal_errors() {
        let err = ChatError::Store(StoreError::Corrupt {
            key: "session:abc".to_string(),
            source: DecodeError::MissingField("id"),
        });
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
