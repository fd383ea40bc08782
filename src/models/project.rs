//! Represents a project — the top-level container for bugs.

use crate::{models::bug::Bug, services::store::Entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite, query_builder::Separated};

/// A project tracked by the service.
///
/// Projects never embed their bugs in storage; bugs point back at their
/// project through `project_id`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Caller- or store-assigned identifier. Immutable once created.
    pub id: String,

    /// Set by the store on insert.
    pub created_at: DateTime<Utc>,

    /// Set by the store on insert.
    pub updated_at: DateTime<Utc>,

    pub name: String,

    /// Color tag shown next to the project (e.g. `blue.400` or `#fff`).
    pub color: String,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            name: name.into(),
            color: color.into(),
        }
    }
}

impl Entity for Project {
    const KIND: &'static str = "project";
    const TABLE: &'static str = "projects";
    const COLUMNS: &'static str = "id, created_at, updated_at, name, color";

    fn key(&self) -> &str {
        &self.id
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
        self.updated_at = now;
    }

    fn bind_row(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
        row.push_bind(self.id.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at)
            .push_bind(self.name.clone())
            .push_bind(self.color.clone());
    }
}

/// A project together with its bugs, as returned by listing endpoints.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ProjectWithBugs {
    #[serde(flatten)]
    pub project: Project,
    pub bugs: Vec<Bug>,
}

/// Request body for creating a project.
///
/// Every field is optional at the wire level so that a missing `name` is
/// reported as a validation error instead of a JSON rejection.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct NewProject {
    pub id: Option<String>,
    pub name: Option<String>,
    pub color: Option<String>,
}
