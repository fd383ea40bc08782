//! Core services: the entity store and the managers built on top of it.

pub mod auth_service;
pub mod bug_service;
pub mod project_service;
pub mod store;

use store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the project and bug lifecycle managers.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} `{id}` already exists")]
    Conflict { kind: &'static str, id: String },
    #[error("project `{project_id}` does not exist")]
    ReferentialViolation { project_id: String },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { kind, id } => Self::Conflict { kind, id },
            other => Self::Store(other),
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Trim a required text field, rejecting absent or blank values.
pub(crate) fn required(value: Option<String>, field: &str) -> LifecycleResult<String> {
    match value.as_deref().map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => Ok(trimmed.to_string()),
        _ => Err(LifecycleError::Validation(format!("`{field}` is required"))),
    }
}

/// Use the caller's identifier if one was supplied, otherwise assign a UUID.
pub(crate) fn assign_id(value: Option<String>) -> LifecycleResult<String> {
    match value {
        Some(id) => {
            let trimmed = id.trim();
            if trimmed.is_empty() {
                Err(LifecycleError::Validation("`id` must not be blank".into()))
            } else {
                Ok(trimmed.to_string())
            }
        }
        None => Ok(Uuid::new_v4().to_string()),
    }
}
