use axum::extract::State;

use crate::app::AppState;
use crate::database::models::Event;
use crate::middleware::{ApiPath, ApiResponse, ApiResult};
use crate::services::{rsvp as attendance, AuthContext};

/// POST /api/events/:id/rsvp - The caller joins the attendee set
pub async fn rsvp(
    State(state): State<AppState>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Event> {
    let event = attendance::rsvp(state.documents.as_ref(), &id, ctx.identity_id()).await?;
    Ok(ApiResponse::success(event).with_message("RSVP confirmed"))
}

/// DELETE /api/events/:id/rsvp - The caller leaves the attendee set
pub async fn cancel_rsvp(
    State(state): State<AppState>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Event> {
    let event = attendance::cancel(state.documents.as_ref(), &id, ctx.identity_id()).await?;
    Ok(ApiResponse::success(event).with_message("RSVP cancelled"))
}
