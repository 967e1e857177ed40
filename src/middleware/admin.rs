use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::services::AuthContext;

/// A missing context means authentication never ran, which is a rejection, not a pass.
pub fn authorize_admin(context: Option<&AuthContext>) -> Result<&AuthContext, ApiError> {
    let context = context.ok_or_else(|| ApiError::unauthenticated("Authentication required"))?;
    if !context.is_admin() {
        warn!(identity = %context.identity_id(), role = %context.role(), "Admin access denied");
        return Err(ApiError::forbidden("Admin access required"));
    }
    Ok(context)
}

/// Route gate for admin-only routes. Must be layered inside `require_authenticated`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    authorize_admin(request.extensions().get::<AuthContext>())?;
    Ok(next.run(request).await)
}

/// Extractor form of the admin gate, for routes that mix admin and non-admin methods.
#[derive(Debug, Clone)]
pub struct AdminContext(pub AuthContext);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        authorize_admin(parts.extensions.get::<AuthContext>())
            .cloned()
            .map(AdminContext)
    }
}
