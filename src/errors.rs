use crate::services::{LifecycleError, auth_service::AuthError, store::StoreError};
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use tracing::{error, warn};

/// Message returned for every failed login, whatever the cause.
pub const INVALID_CREDENTIALS: &str = "invalid credentials";

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 401 Unauthorized
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Malformed or mistyped request bodies are validation failures.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => Self::new(StatusCode::CONFLICT, err.to_string()),
            StoreError::ReferentialViolation { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            other => {
                error!("store failure: {}", other);
                Self::internal("database error")
            }
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Validation(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            LifecycleError::NotFound { .. } => Self::not_found(err.to_string()),
            LifecycleError::Conflict { .. } => Self::new(StatusCode::CONFLICT, err.to_string()),
            LifecycleError::ReferentialViolation { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            LifecycleError::Store(inner) => inner.into(),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotFound | AuthError::InvalidCredential => {
                warn!("rejected login: {}", err);
                Self::unauthorized(INVALID_CREDENTIALS)
            }
            AuthError::InvalidToken(_) | AuthError::MissingToken => {
                Self::unauthorized("invalid or expired session")
            }
            AuthError::Validation(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            AuthError::Store(inner) => inner.into(),
            AuthError::Signing(_) | AuthError::Hashing(_) => {
                error!("authentication failure: {}", err);
                Self::internal("authentication unavailable")
            }
        }
    }
}
