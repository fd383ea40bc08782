//! Login, session introspection and the bearer-token gate.

use crate::{
    errors::AppError,
    handlers::ApiJson,
    services::auth_service::{AuthError, AuthService, SessionClaims, SessionToken},
};
use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub email: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<SessionClaims> for SessionInfo {
    fn from(claims: SessionClaims) -> Self {
        Self {
            expires_at: claims.expires_at(),
            email: claims.email,
        }
    }
}

/// POST `/api/login` — exchange credentials for a session token.
pub async fn login(
    State(auth): State<AuthService>,
    ApiJson(payload): ApiJson<LoginReq>,
) -> Result<Json<SessionToken>, AppError> {
    let session = auth.authenticate(&payload.email, &payload.password).await?;
    Ok(Json(session))
}

/// GET `/api/session` — decode the caller's bearer token.
pub async fn session(
    State(auth): State<AuthService>,
    headers: HeaderMap,
) -> Result<Json<SessionInfo>, AppError> {
    let token = bearer_token(&headers).ok_or(AuthError::MissingToken)?;
    let claims = auth.verify(token)?;
    Ok(Json(claims.into()))
}

/// Middleware rejecting requests without a valid `Authorization: Bearer` token.
pub async fn require_session(
    State(auth): State<AuthService>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or(AuthError::MissingToken)?;
    auth.verify(token)?;
    Ok(next.run(request).await)
}

/// Extract the token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
