use axum::extract::State;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::app::AppState;
use crate::database::models::{DirectoryEntry, UserRecord, UserUpdate};
use crate::filter::Page;
use crate::middleware::{AdminContext, ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::services::residents::{self, NewResident};
use crate::services::AuthContext;

/// GET /api/residents - Admin only (gated by `require_admin` on the route)
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HashMap<String, String>>,
) -> ApiResult<Page<UserRecord>> {
    let page = residents::list(state.users.as_ref(), &params, &state.config.api).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/residents/:id - Admin or self
pub async fn show(
    State(state): State<AppState>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<UserRecord> {
    let record = residents::get(state.users.as_ref(), &ctx, &id).await?;
    Ok(ApiResponse::success(record))
}

/// PUT /api/residents/:id - Admin or self; privileged fields are admin only
pub async fn update(
    State(state): State<AppState>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<String>,
    ApiJson(update): ApiJson<UserUpdate>,
) -> ApiResult<UserRecord> {
    let record = residents::update(state.users.as_ref(), &ctx, &id, update).await?;
    Ok(ApiResponse::success(record).with_message("Resident updated"))
}

/// POST /api/residents/:id - Admin only
pub async fn create(
    State(state): State<AppState>,
    AdminContext(ctx): AdminContext,
    ApiPath(id): ApiPath<String>,
    ApiJson(input): ApiJson<NewResident>,
) -> ApiResult<UserRecord> {
    let record = residents::create(state.users.as_ref(), &ctx, &id, input).await?;
    Ok(ApiResponse::created(record).with_message("Resident created"))
}

/// DELETE /api/residents/:id - Admin only
pub async fn remove(
    State(state): State<AppState>,
    AdminContext(ctx): AdminContext,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Value> {
    residents::delete(state.users.as_ref(), &ctx, &id).await?;
    Ok(ApiResponse::success(json!({ "id": id })).with_message("Resident deleted"))
}

/// GET /api/directory - Residents who opted in, contact details per their privacy flags
pub async fn directory(
    State(state): State<AppState>,
    _ctx: AuthContext,
    ApiQuery(params): ApiQuery<HashMap<String, String>>,
) -> ApiResult<Vec<DirectoryEntry>> {
    let entries = residents::directory(state.users.as_ref(), &params, &state.config.api).await?;
    Ok(ApiResponse::success(entries))
}
