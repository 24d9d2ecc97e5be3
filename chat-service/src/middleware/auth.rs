use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{models::Principal, AppState};

/// Require a valid bearer token and attach the caller's `Principal`.
///
/// A missing token is 401; a token that fails verification is 403.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Access token required")))?;

    let principal = state.jwt.verify(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        AppError::InvalidToken(e)
    })?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

/// Extractor for the authenticated caller.
pub struct AuthUser(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts.extensions.get::<Principal>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Principal missing from request extensions"
            ))
        })?;

        Ok(AuthUser(principal.clone()))
    }
}
