//! Shared state handed to every axum handler.

use crate::services::{
    auth_service::AuthService, bug_service::BugService, project_service::ProjectService,
    store::EntityStore,
};
use axum::extract::FromRef;
use chrono::TimeDelta;

/// Handlers extract the piece they need (`State<ProjectService>` etc.) via
/// `FromRef`. Every service shares the same store handle.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: EntityStore,
    pub projects: ProjectService,
    pub bugs: BugService,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(store: EntityStore, token_secret: &[u8], token_ttl: TimeDelta) -> Self {
        Self {
            projects: ProjectService::new(store.clone()),
            bugs: BugService::new(store.clone()),
            auth: AuthService::new(store.clone(), token_secret, token_ttl),
            store,
        }
    }
}
