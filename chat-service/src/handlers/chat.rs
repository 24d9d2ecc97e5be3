//! Chat endpoints under `/api/chat`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        chat::{
            CompletionRequest, ConversationRequest, CostEstimateRequest, DirectMessageRequest,
            ModelListResponse, Noted, ReplyData, SendMessageRequest, SimpleChatResponse,
            StartSessionRequest, SIMULATED_MODELS_NOTE, SIMULATED_NOTE,
        },
        session::PageQuery,
        ApiResponse,
    },
    middleware::AuthUser,
    services::providers::ModelFilter,
    utils::ValidatedJson,
    AppState,
};

fn simulated_note(state: &AppState) -> Option<&'static str> {
    state
        .chat
        .provider()
        .is_simulated()
        .then_some(SIMULATED_NOTE)
}

pub async fn start_session(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let started = state
        .chat
        .start_session(
            &principal,
            req.title.as_deref(),
            req.model_id.as_deref(),
            req.initial_message.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(started))))
}

pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let reply = state
        .chat
        .send_session_message(
            &principal,
            &req.session_id,
            &req.message,
            req.model_id.as_deref(),
        )
        .await?;

    Ok(Json(ApiResponse::ok(ReplyData {
        reply,
        note: simulated_note(&state),
    })))
}

pub async fn session_history(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(session_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let history = state
        .chat
        .session_history(&principal, &session_id, page.limit(), page.offset())
        .await?;
    Ok(Json(ApiResponse::ok(history)))
}

pub async fn list_models(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let models = state.chat.list_models().await?;

    let mut response = ModelListResponse::new(models);
    if state.chat.provider().is_simulated() {
        response.note = Some(SIMULATED_MODELS_NOTE);
    }
    Ok(Json(response))
}

pub async fn filtered_models(
    State(state): State<AppState>,
    Query(filter): Query<ModelFilter>,
) -> Result<impl IntoResponse, AppError> {
    let models = state.chat.filtered_models(&filter).await?;

    let mut response = ModelListResponse::new(models);
    response.filters = Some(filter);
    Ok(Json(response))
}

pub async fn cost_estimate(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CostEstimateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quote = state
        .chat
        .estimate_cost(&req.model_id, req.prompt_tokens, req.completion_tokens)
        .await?;
    Ok(Json(ApiResponse::ok(quote)))
}

pub async fn direct_message(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<DirectMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let reply = state.chat.direct_message(&req.model_id, &req.message).await?;
    Ok(Json(ApiResponse::ok(Noted {
        data: reply,
        note: simulated_note(&state),
    })))
}

pub async fn simple_chat(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<DirectMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let reply = state.chat.direct_message(&req.model_id, &req.message).await?;
    Ok(Json(SimpleChatResponse {
        success: true,
        model_id: reply.model_id,
        message: reply.message,
        response: reply.response,
        note: simulated_note(&state),
    }))
}

pub async fn conversation(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ConversationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let reply = state
        .chat
        .conversation(&req.model_id, &req.message, &req.context)
        .await?;
    Ok(Json(ApiResponse::ok(Noted {
        data: reply,
        note: simulated_note(&state),
    })))
}

pub async fn complete(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CompletionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .chat
        .complete(&req.model_id, &req.message, req.options.into())
        .await?;
    Ok(Json(ApiResponse::ok(Noted {
        data: result,
        note: simulated_note(&state),
    })))
}

pub async fn upstream_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.chat.upstream_health().await))
}
