//! Job API Handlers
//!
//! Endpoints that queue content jobs on eurocore and list the jobs the bot
//! is currently tracking.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use r4n_core::domain::view::JobView;
use r4n_core::dto::content::{EditDispatch, NewDispatch, NewRmbPost, RemoveDispatch};
use serde::Deserialize;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// A submission plus whether to ping the user when it finishes
#[derive(Debug, Deserialize)]
pub struct SubmitRequest<T> {
    #[serde(flatten)]
    pub content: T,
    #[serde(default)]
    pub ping: bool,
}

// =============================================================================
// Dispatch Endpoints
// =============================================================================

/// POST /users/{id}/dispatches
/// Queue a new dispatch
pub async fn add_dispatch(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
    Json(req): Json<SubmitRequest<NewDispatch>>,
) -> ApiResult<(StatusCode, Json<JobView>)> {
    tracing::info!("User {} adding dispatch \"{}\"", user_id, req.content.title);

    let job = state
        .submissions
        .add_dispatch(user_id, req.content, req.ping)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(job.render())))
}

/// PUT /users/{id}/dispatches/{dispatch_id}
/// Queue an edit of an existing dispatch
pub async fn edit_dispatch(
    State(state): State<AppState>,
    Path((user_id, dispatch_id)): Path<(u64, u64)>,
    Json(req): Json<SubmitRequest<EditDispatch>>,
) -> ApiResult<(StatusCode, Json<JobView>)> {
    tracing::info!("User {} editing dispatch {}", user_id, dispatch_id);

    let job = state
        .submissions
        .edit_dispatch(user_id, dispatch_id, req.content, req.ping)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(job.render())))
}

/// DELETE /users/{id}/dispatches/{dispatch_id}
/// Queue removal of an existing dispatch
pub async fn remove_dispatch(
    State(state): State<AppState>,
    Path((user_id, dispatch_id)): Path<(u64, u64)>,
    Json(req): Json<SubmitRequest<RemoveDispatch>>,
) -> ApiResult<(StatusCode, Json<JobView>)> {
    tracing::info!("User {} removing dispatch {}", user_id, dispatch_id);

    let job = state
        .submissions
        .remove_dispatch(user_id, dispatch_id, req.content, req.ping)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(job.render())))
}

// =============================================================================
// RMB Endpoints
// =============================================================================

/// POST /users/{id}/rmbposts
/// Queue a regional message board post
pub async fn post_rmb(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
    Json(req): Json<SubmitRequest<NewRmbPost>>,
) -> ApiResult<(StatusCode, Json<JobView>)> {
    tracing::info!("User {} posting to {}", user_id, req.content.region);

    let job = state.submissions.post_rmb(user_id, req.content, req.ping).await?;

    Ok((StatusCode::ACCEPTED, Json(job.render())))
}

// =============================================================================
// Tracked Jobs
// =============================================================================

/// GET /jobs
/// Current view of every tracked job
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobView>> {
    tracing::debug!("Listing tracked jobs");

    Json(state.registry.snapshot().iter().map(|job| job.render()).collect())
}
