use axum::{
    extract::State,
    http::{Method, Uri},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::{json, Value};
use std::any::Any;
use tracing::error;

use crate::app::AppState;
use crate::database::{DocumentStore, UserStore};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /health - Liveness plus a store round trip
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    UserStore::health_check(state.users.as_ref()).await?;
    DocumentStore::health_check(state.documents.as_ref()).await?;

    Ok(ApiResponse::success(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "database": "ok",
    })))
}

/// GET /api - Build and environment info (nothing sensitive)
pub async fn info(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "name": "Estate Portal API",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment.as_str(),
        "endpoints": {
            "public": ["/health", "/api", "/api/auth/register", "/api/auth/login"],
            "auth": "/api/auth/me, /api/auth/change-password",
            "events": "/api/events[/:id[/rsvp]]",
            "documents": "/api/documents[/:id]",
            "gallery": "/api/gallery[/:id]",
            "announcements": "/api/announcements[/:id]",
            "residents": "/api/residents[/:id] (list is admin only)",
            "directory": "/api/directory",
        }
    })))
}

/// Fallback for unknown routes
pub async fn not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::not_found(format!("Route {} {} not found", method, uri.path()))
}

/// Fallback for a known path with an unrouted method
pub async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    ApiError::method_not_allowed(format!("Method {} not allowed on {}", method, uri.path()))
}

/// Converts a panic in a request path into the 500 envelope.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!("Request handler panicked: {}", detail);
    ApiError::upstream(format!("panic: {}", detail)).into_response()
}
