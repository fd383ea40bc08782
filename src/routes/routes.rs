//! Defines routes for the bug tracker API.
//!
//! ## Structure
//! - **Probes** (mounted at root)
//!   - `GET    /healthz`, `GET /readyz`
//!
//! - **Session endpoints** (`/api`)
//!   - `POST   /login`   — exchange credentials for a token
//!   - `GET    /session` — decode the caller's bearer token
//!
//! - **Project endpoints** (`/api`)
//!   - `GET    /projects` — list projects with their bugs
//!   - `POST   /projects` — create project
//!   - `GET    /projects/{project_id}` — one project with its bugs
//!   - `DELETE /projects/{project_id}` — delete project and its bugs
//!
//! - **Bug endpoints** (`/api`)
//!   - `POST   /bugs` — file a bug (`projectId` in the body)
//!   - `GET    /projects/{project_id}/bugs` — bugs of one project
//!   - `PATCH  /projects/{project_id}/bugs/{bug_id}` — set status
//!   - `DELETE /projects/{project_id}/bugs/{bug_id}` — delete bug

use crate::{
    handlers::{
        auth_handlers::{login, require_session, session},
        bug_handlers::{create_bug, delete_bug, list_bugs, update_bug_status},
        health_handlers::{healthz, readyz},
        project_handlers::{create_project, delete_project, get_project, list_projects},
    },
    state::AppState,
};
use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

/// Build the full router with `state` attached.
///
/// With `require_auth`, every `/api` route except `/login` needs a valid
/// bearer token.
pub fn routes(state: AppState, require_auth: bool) -> Router {
    let mut api = Router::new()
        .route("/session", get(session))
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{project_id}",
            get(get_project).delete(delete_project),
        )
        .route("/projects/{project_id}/bugs", get(list_bugs))
        .route(
            "/projects/{project_id}/bugs/{bug_id}",
            patch(update_bug_status).delete(delete_bug),
        )
        .route("/bugs", post(create_bug));

    if require_auth {
        api = api.route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));
    }

    let api = api.route("/login", post(login));

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest("/api", api)
        .with_state(state)
}
