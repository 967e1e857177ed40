use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::{resolve_context, AuthContext};

/// Verifies the bearer token, resolves the stored role and attaches an `AuthContext`.
/// Nothing downstream runs on failure.
pub async fn require_authenticated(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers()).map_err(|reason| {
        warn!(path = %request.uri().path(), "Authentication failed: {}", reason);
        ApiError::unauthenticated(reason)
    })?;

    let context = resolve_context(&state.verifier, state.users.as_ref(), &token)
        .await
        .inspect_err(|e| {
            if matches!(e, ApiError::Unauthenticated(_)) {
                warn!(path = %request.uri().path(), "Authentication failed: {}", e);
            }
        })?;

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Extract the bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, &'static str> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err("Empty bearer token"),
        None => Err("Authorization header must use Bearer token format"),
    }
}

/// Handlers taking `AuthContext` fail closed when the middleware has not run.
#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| ApiError::unauthenticated("Authentication required"))
    }
}
