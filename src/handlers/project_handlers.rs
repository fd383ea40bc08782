//! HTTP handlers for project operations.
//! Request bodies and responses are camelCase JSON; all persistence concerns
//! are delegated to `ProjectService`.

use crate::{
    errors::AppError,
    handlers::{ApiJson, MessageResponse},
    models::project::{NewProject, Project, ProjectWithBugs},
    services::project_service::ProjectService,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// GET `/api/projects` — every project with its bugs.
pub async fn list_projects(
    State(service): State<ProjectService>,
) -> Result<Json<Vec<ProjectWithBugs>>, AppError> {
    Ok(Json(service.list().await?))
}

/// POST `/api/projects` — create a project.
pub async fn create_project(
    State(service): State<ProjectService>,
    ApiJson(payload): ApiJson<NewProject>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let project = service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET `/api/projects/{project_id}` — one project with its bugs.
pub async fn get_project(
    State(service): State<ProjectService>,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectWithBugs>, AppError> {
    Ok(Json(service.get(&project_id).await?))
}

/// DELETE `/api/projects/{project_id}` — delete a project and all of its bugs.
pub async fn delete_project(
    State(service): State<ProjectService>,
    Path(project_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    service.delete(&project_id).await?;
    Ok(Json(MessageResponse::new(
        "Project and its bugs deleted successfully",
    )))
}
