//! HTTP handlers for bug operations.
//! Bugs are addressed through their project (`/projects/{project_id}/bugs/{bug_id}`)
//! so a bug can never be changed through the wrong project.

use crate::{
    errors::AppError,
    handlers::{ApiJson, MessageResponse},
    models::bug::{Bug, BugStatusUpdate, NewBug},
    services::bug_service::BugService,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// POST `/api/bugs` — file a bug; `projectId` travels in the body.
pub async fn create_bug(
    State(service): State<BugService>,
    ApiJson(payload): ApiJson<NewBug>,
) -> Result<(StatusCode, Json<Bug>), AppError> {
    let bug = service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(bug)))
}

/// GET `/api/projects/{project_id}/bugs`
pub async fn list_bugs(
    State(service): State<BugService>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<Bug>>, AppError> {
    Ok(Json(service.list_for_project(&project_id).await?))
}

/// PATCH `/api/projects/{project_id}/bugs/{bug_id}` — set `status`.
pub async fn update_bug_status(
    State(service): State<BugService>,
    Path((project_id, bug_id)): Path<(String, String)>,
    ApiJson(payload): ApiJson<BugStatusUpdate>,
) -> Result<Json<Bug>, AppError> {
    let bug = service
        .update_status(&project_id, &bug_id, payload.status)
        .await?;
    Ok(Json(bug))
}

/// DELETE `/api/projects/{project_id}/bugs/{bug_id}`
pub async fn delete_bug(
    State(service): State<BugService>,
    Path((project_id, bug_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, AppError> {
    service.delete(&project_id, &bug_id).await?;
    Ok(Json(MessageResponse::new("Bug deleted")))
}
