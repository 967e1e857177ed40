use axum::extract::State;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::app::AppState;
use crate::filter::Page;
use crate::middleware::{AdminContext, ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::services::{resources, AuthContext, Resource};

// Routed once per resource type, e.g. `get(list::<Event>)`.

/// GET /api/{collection} - Filtered, sorted page
pub async fn list<R: Resource>(
    State(state): State<AppState>,
    _ctx: AuthContext,
    ApiQuery(params): ApiQuery<HashMap<String, String>>,
) -> ApiResult<Page<R>> {
    let page = resources::list::<R>(state.documents.as_ref(), &params, &state.config.api).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/{collection}/:id
pub async fn show<R: Resource>(
    State(state): State<AppState>,
    _ctx: AuthContext,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<R> {
    let item = resources::get::<R>(state.documents.as_ref(), &id).await?;
    Ok(ApiResponse::success(item))
}

/// POST /api/{collection} - Admin only
pub async fn create<R: Resource>(
    State(state): State<AppState>,
    AdminContext(ctx): AdminContext,
    ApiJson(input): ApiJson<R::Create>,
) -> ApiResult<R> {
    let item = resources::create::<R>(state.documents.as_ref(), &ctx, input).await?;
    Ok(ApiResponse::created(item).with_message(format!("{} created", R::LABEL)))
}

/// PUT /api/{collection}/:id - Admin only, top-level field merge
pub async fn update<R: Resource>(
    State(state): State<AppState>,
    AdminContext(_ctx): AdminContext,
    ApiPath(id): ApiPath<String>,
    ApiJson(input): ApiJson<R::Update>,
) -> ApiResult<R> {
    let item = resources::update::<R>(state.documents.as_ref(), &id, input).await?;
    Ok(ApiResponse::success(item).with_message(format!("{} updated", R::LABEL)))
}

/// DELETE /api/{collection}/:id - Admin only
pub async fn remove<R: Resource>(
    State(state): State<AppState>,
    AdminContext(ctx): AdminContext,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Value> {
    resources::delete::<R>(state.documents.as_ref(), &ctx, &id).await?;
    Ok(ApiResponse::success(json!({ "id": id })).with_message(format!("{} deleted", R::LABEL)))
}
