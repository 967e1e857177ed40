use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::AppState;
use crate::auth::{IdentityError, NewAccount};
use crate::database::models::validate::{optional_text, Validator};
use crate::database::models::NewUser;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::{resolve_role, Profile};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: Profile,
    pub token: String,
    pub expires_in: u64,
}

/// POST /api/auth/register - Create an identity and its resident record
///
/// Any `role` in the body is ignored; new accounts are always residents.
///
/// Expected Output (201):
/// ```json
/// { "success": true, "data": { "user": { "id": "...", "role": "resident" }, "token": "...", "expiresIn": 3600 } }
/// ```
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> ApiResult<SessionResponse> {
    let mut v = Validator::new();
    let email = v.required("email", body.email);
    let password = v.required("password", body.password);
    v.finish()?;

    let display_name = optional_text(body.display_name);
    let phone = optional_text(body.phone);
    let session = state
        .identity
        .create_account(NewAccount {
            email,
            password,
            display_name: display_name.clone(),
            phone: phone.clone(),
        })
        .await?;

    let record = state
        .users
        .get_or_create(NewUser {
            display_name,
            phone,
            ..NewUser::resident(session.identity.id.clone(), session.identity.email.clone())
        })
        .await?;
    info!(identity = %record.id, "Registered new resident");

    Ok(ApiResponse::created(SessionResponse {
        user: Profile::merge(&session.identity, record),
        token: session.token,
        expires_in: session.expires_in,
    })
    .with_message("Registration successful"))
}

/// POST /api/auth/login - Exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> ApiResult<SessionResponse> {
    let mut v = Validator::new();
    let email = v.required("email", body.email);
    let password = v.required("password", body.password);
    v.finish()?;

    let session = state.identity.sign_in(&email, &password).await.inspect_err(|e| {
        if matches!(e, IdentityError::InvalidCredentials) {
            warn!("Login failed: invalid credentials");
        }
    })?;
    let record = resolve_role(state.users.as_ref(), &session.identity).await?;

    Ok(ApiResponse::success(SessionResponse {
        user: Profile::merge(&session.identity, record),
        token: session.token,
        expires_in: session.expires_in,
    })
    .with_message("Login successful"))
}
