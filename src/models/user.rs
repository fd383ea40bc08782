//! The single administrative identity allowed to sign in.

use crate::services::store::Entity;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Sqlite, query_builder::Separated};

/// Stored credentials, keyed by email.
///
/// Has no `Serialize` impl; the hash never leaves the service.
#[derive(Clone, FromRow, Debug)]
pub struct User {
    pub email: String,

    /// Argon2 PHC string (algorithm, params, salt and hash).
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
}

impl Entity for User {
    const KIND: &'static str = "user";
    const TABLE: &'static str = "users";
    const KEY_COLUMN: &'static str = "email";
    const COLUMNS: &'static str = "email, password_hash, created_at";

    fn key(&self) -> &str {
        &self.email
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
    }

    fn bind_row(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
        row.push_bind(self.email.clone())
            .push_bind(self.password_hash.clone())
            .push_bind(self.created_at);
    }
}
