//! axum handlers, grouped by resource.

pub mod auth_handlers;
pub mod bug_handlers;
pub mod health_handlers;
pub mod project_handlers;

use crate::errors::AppError;
use axum::extract::FromRequest;
use serde::Serialize;

/// `Json` extractor whose rejections use the `AppError` body and status.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `{"message": ...}` body returned by delete endpoints.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
