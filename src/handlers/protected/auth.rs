use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

use crate::app::AppState;
use crate::auth::IdentityError;
use crate::database::models::validate::Validator;
use crate::database::models::UserUpdate;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::{residents, AuthContext, Profile};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// GET /api/auth/me - Identity fields merged with the stored record
pub async fn me(ctx: AuthContext) -> ApiResult<Profile> {
    Ok(ApiResponse::success(Profile::from(&ctx)))
}

/// PUT /api/auth/me - Self-service profile fields only
pub async fn update_me(
    State(state): State<AppState>,
    ctx: AuthContext,
    ApiJson(update): ApiJson<UserUpdate>,
) -> ApiResult<Profile> {
    let record = residents::update_self(state.users.as_ref(), &ctx, update).await?;
    Ok(ApiResponse::success(Profile::merge(&ctx.identity, record)).with_message("Profile updated"))
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    ctx: AuthContext,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Value> {
    let mut v = Validator::new();
    let current = v.required("currentPassword", body.current_password);
    let new = v.required("newPassword", body.new_password);
    v.finish()?;

    state
        .identity
        .change_password(ctx.email(), &current, &new)
        .await
        .map_err(|e| match e {
            IdentityError::InvalidCredentials => {
                let mut fields = HashMap::new();
                fields.insert("currentPassword".to_string(), "Current password is incorrect".to_string());
                ApiError::validation_fields("Current password is incorrect", fields)
            }
            IdentityError::WeakPassword(msg) => {
                let mut fields = HashMap::new();
                fields.insert("newPassword".to_string(), msg.clone());
                ApiError::validation_fields(msg, fields)
            }
            other => other.into(),
        })?;

    info!(identity = %ctx.identity_id(), "Password changed");
    Ok(ApiResponse::success(json!({ "id": ctx.identity_id() }))
        .with_message("Password updated. Sign in again with the new password."))
}
