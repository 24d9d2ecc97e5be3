//! Session management endpoints under `/api/sessions`.
//!
//! Every route acts on the authenticated caller's own sessions; another
//! user's session is reported as not found.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        session::{AddMessageRequest, CreateSessionRequest, MessagesResponse, PageQuery},
        ApiResponse, MessageResponse,
    },
    middleware::AuthUser,
    models::{NewMessage, Role},
    services::{chat::Pagination, ChatError},
    utils::ValidatedJson,
    AppState,
};

pub async fn create_session(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .sessions
        .create_session(&principal.id, req.title, req.model)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(session))))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let sessions = state.sessions.get_user_sessions(&principal.id).await?;
    Ok(Json(ApiResponse::ok(sessions)))
}

pub async fn get_session(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .sessions
        .get_owned_session(&session_id, &principal.id)
        .await?;
    Ok(Json(ApiResponse::ok(session)))
}

pub async fn delete_session(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state
        .sessions
        .get_owned_session(&session_id, &principal.id)
        .await?;

    if !state.sessions.delete_session(&session_id).await? {
        return Err(ChatError::session_not_found().into());
    }
    Ok(Json(MessageResponse::ok("Session deleted successfully")))
}

pub async fn extend_session(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state
        .sessions
        .get_owned_session(&session_id, &principal.id)
        .await?;

    if !state.sessions.extend_session(&session_id).await? {
        return Err(ChatError::session_not_found().into());
    }
    Ok(Json(MessageResponse::ok("Session extended successfully")))
}

pub async fn get_messages(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(session_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    state
        .sessions
        .get_owned_session(&session_id, &principal.id)
        .await?;

    let (limit, offset) = (page.limit(), page.offset());
    let messages = state
        .sessions
        .get_session_messages(&session_id, limit, offset)
        .await?;

    Ok(Json(MessagesResponse {
        success: true,
        pagination: Pagination {
            limit,
            offset,
            count: messages.len(),
        },
        data: messages,
    }))
}

pub async fn add_message(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(session_id): Path<String>,
    ValidatedJson(req): ValidatedJson<AddMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role: Role = req
        .role
        .parse()
        .map_err(|e: String| AppError::BadRequest(anyhow::anyhow!(e)))?;

    state
        .sessions
        .get_owned_session(&session_id, &principal.id)
        .await?;

    let message = state
        .sessions
        .add_message(
            &session_id,
            NewMessage {
                role,
                content: req.content,
                model: req.model,
                tokens: req.tokens,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(message))))
}
