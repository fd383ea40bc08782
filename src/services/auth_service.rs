//! src/services/auth_service.rs
//!
//! AuthService — verifies the administrator's credentials and issues signed,
//! self-contained session tokens (HS256 JWTs). Verifying a token needs no
//! store round-trip.

use crate::{
    models::user::User,
    services::store::{EntityStore, StoreError},
};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::{sync::OnceCell, task};
use tracing::{debug, info};
use uuid::Uuid;

/// Lifetime of a session token, in hours, unless configured otherwise.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no identity registered for this email")]
    NotFound,
    #[error("password does not match")]
    InvalidCredential,
    #[error("session token rejected: {0}")]
    InvalidToken(jsonwebtoken::errors::Error),
    #[error("missing bearer token")]
    MissingToken,
    #[error("{0}")]
    Validation(String),
    #[error("could not sign session token: {0}")]
    Signing(jsonwebtoken::errors::Error),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub email: String,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

impl SessionClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// A freshly issued token as returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

#[derive(Clone)]
pub struct AuthService {
    store: EntityStore,
    keys: Arc<TokenKeys>,
    ttl: TimeDelta,
}

impl AuthService {
    pub fn new(store: EntityStore, secret: &[u8], ttl: TimeDelta) -> Self {
        Self {
            store,
            keys: Arc::new(TokenKeys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            }),
            ttl,
        }
    }

    /// Check `email`/`password` against the stored identity and issue a token.
    ///
    /// Callers must not reveal to clients which of `NotFound` and
    /// `InvalidCredential` occurred.
    pub async fn authenticate(&self, email: &str, password: &str) -> AuthResult<SessionToken> {
        let found: Option<User> = self.store.find_by_id(email.trim()).await?;
        let Some(user) = found else {
            // Pay the same argon2 cost as a password mismatch.
            let dummy = dummy_hash().await?;
            let _ = verify_password(dummy.to_string(), password.to_string()).await;
            return Err(AuthError::NotFound);
        };

        verify_password(user.password_hash, password.to_string()).await?;

        let session = self.issue(&user.email)?;
        info!(email = %user.email, "issued session token");
        Ok(session)
    }

    /// Sign a token for `email` expiring `ttl` from now.
    pub fn issue(&self, email: &str) -> AuthResult<SessionToken> {
        let issued_at = Utc::now();
        let expires_at = issued_at + self.ttl;
        let claims = SessionClaims {
            email: email.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)
            .map_err(AuthError::Signing)?;
        Ok(SessionToken { token, expires_at })
    }

    /// Validate signature and expiry of `token` and return its claims.
    pub fn verify(&self, token: &str) -> AuthResult<SessionClaims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<SessionClaims>(token, &self.keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                debug!("rejected session token: {}", err);
                AuthError::InvalidToken(err)
            })
    }
}

/// Create the administrative identity with a freshly salted argon2 hash.
///
/// This is the out-of-band bootstrap step; a second identity with the same
/// email fails with a store `Conflict`.
pub async fn seed_identity(store: &EntityStore, email: &str, password: &str) -> AuthResult<User> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::Validation(
            "email and password must not be empty".into(),
        ));
    }

    let password_hash = hash_password(password.to_string()).await?;
    let user = store
        .create(User {
            email: email.to_string(),
            password_hash,
            created_at: Utc::now(),
        })
        .await?;

    info!(email = %user.email, "seeded administrative identity");
    Ok(user)
}

async fn hash_password(password: String) -> AuthResult<String> {
    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| AuthError::Hashing(err.to_string()))
    })
    .await
    .map_err(|err| AuthError::Hashing(err.to_string()))?
}

/// Hash checked against when the email is unknown. Computed once per process.
static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

async fn dummy_hash() -> AuthResult<&'static str> {
    let hash = DUMMY_HASH
        .get_or_try_init(|| hash_password(Uuid::new_v4().to_string()))
        .await?;
    Ok(hash.as_str())
}

/// Argon2 verification compares digests in constant time.
async fn verify_password(stored_hash: String, password: String) -> AuthResult<()> {
    task::spawn_blocking(move || {
        let parsed =
            PasswordHash::new(&stored_hash).map_err(|err| AuthError::Hashing(err.to_string()))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|err| match err {
                password_hash::Error::Password => AuthError::InvalidCredential,
                other => AuthError::Hashing(other.to_string()),
            })
    })
    .await
    .map_err(|err| AuthError::Hashing(err.to_string()))?
}
