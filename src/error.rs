// HTTP API Error Types
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::IdentityError;
use crate::database::StoreError;

/// HTTP API error. Every variant renders as the uniform error envelope.
#[derive(Debug, Clone)]
pub enum ApiError {
    // 401 Unauthorized
    Unauthenticated(String),

    // 403 Forbidden
    Forbidden(String),

    // 400 Bad Request
    Validation {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 404 Not Found
    NotFound(String),

    // 405 Method Not Allowed
    MethodNotAllowed(String),

    // 500 Internal Server Error (database, identity provider or a bug)
    Upstream {
        message: String,
        reference: String,
    },
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthenticated(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::Validation { message, .. } => message,
            ApiError::NotFound(msg) => msg,
            ApiError::MethodNotAllowed(msg) => msg,
            ApiError::Upstream { message, .. } => message,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            ApiError::Upstream { .. } => "UPSTREAM_ERROR",
        }
    }

    /// Convert to the error envelope
    pub fn to_json(&self) -> Value {
        let mut error = json!({ "code": self.error_code() });

        match self {
            ApiError::Validation { field_errors: Some(fields), .. } => {
                error["fields"] = json!(fields);
            }
            ApiError::Upstream { reference, .. } => {
                error["reference"] = json!(reference);
            }
            _ => {}
        }

        json!({
            "success": false,
            "message": self.message(),
            "error": error,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation { message: message.into(), field_errors: None }
    }

    pub fn validation_fields(message: impl Into<String>, field_errors: HashMap<String, String>) -> Self {
        ApiError::Validation { message: message.into(), field_errors: Some(field_errors) }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        ApiError::MethodNotAllowed(message.into())
    }

    /// Log the real cause server-side and hand the caller an opaque reference.
    pub fn upstream(cause: impl std::fmt::Display) -> Self {
        let reference = Uuid::new_v4().simple().to_string();
        tracing::error!(reference = %reference, "Upstream failure: {}", cause);
        ApiError::Upstream {
            message: "An error occurred while processing your request".to_string(),
            reference,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ApiError::validation(msg),
            StoreError::Filter(err) => err.into(),
            other => ApiError::upstream(other),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidToken(reason) => {
                tracing::warn!("Token rejected: {}", reason);
                ApiError::unauthenticated("Invalid or expired token")
            }
            IdentityError::InvalidCredentials => ApiError::unauthenticated("Invalid email or password"),
            IdentityError::EmailExists => ApiError::validation("An account with this email already exists"),
            IdentityError::InvalidEmail => {
                let mut fields = HashMap::new();
                fields.insert("email".to_string(), "Invalid email address".to_string());
                ApiError::validation_fields("Invalid email address", fields)
            }
            IdentityError::WeakPassword(msg) => {
                let mut fields = HashMap::new();
                fields.insert("password".to_string(), msg.clone());
                ApiError::validation_fields(msg, fields)
            }
            IdentityError::AccountNotFound => ApiError::not_found("Account not found"),
            IdentityError::Unavailable(msg) => ApiError::upstream(format!("identity provider: {}", msg)),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::validation("Request body too large");
        }
        ApiError::validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
