//! Represents a bug report filed against a project.

use crate::services::store::Entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite, query_builder::Separated};

/// Bug priority as stored in the `bugs.priority` column.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default, sqlx::Type)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Bug lifecycle state. New bugs start `Open`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default, sqlx::Type)]
pub enum BugStatus {
    #[default]
    Open,
    Resolved,
}

/// A single bug report.
///
/// `project_id` is a back-reference used for scoping queries and for the
/// foreign key; the owning project does not hold a copy of its bugs.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bug {
    pub id: String,

    /// Set by the store on insert.
    pub created_at: DateTime<Utc>,

    /// Owning project. Immutable.
    pub project_id: String,

    pub title: String,
    pub steps_to_reproduce: String,
    pub actual_result: String,
    pub expected_result: String,
    pub priority: Priority,

    /// Link to a screenshot hosted elsewhere.
    pub screenshot_url: Option<String>,

    /// Free-form device descriptor (e.g. "Pixel 8, Android 15").
    pub device: Option<String>,

    pub status: BugStatus,
}

impl Entity for Bug {
    const KIND: &'static str = "bug";
    const TABLE: &'static str = "bugs";
    const COLUMNS: &'static str = "id, created_at, project_id, title, steps_to_reproduce, \
         actual_result, expected_result, priority, screenshot_url, device, status";

    fn key(&self) -> &str {
        &self.id
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
    }

    fn bind_row(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
        row.push_bind(self.id.clone())
            .push_bind(self.created_at)
            .push_bind(self.project_id.clone())
            .push_bind(self.title.clone())
            .push_bind(self.steps_to_reproduce.clone())
            .push_bind(self.actual_result.clone())
            .push_bind(self.expected_result.clone())
            .push_bind(self.priority)
            .push_bind(self.screenshot_url.clone())
            .push_bind(self.device.clone())
            .push_bind(self.status);
    }
}

/// Request body for filing a bug.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewBug {
    pub id: Option<String>,
    pub project_id: Option<String>,
    pub title: Option<String>,
    pub steps_to_reproduce: Option<String>,
    pub actual_result: Option<String>,
    pub expected_result: Option<String>,
    pub priority: Option<Priority>,
    pub screenshot_url: Option<String>,
    pub device: Option<String>,
    pub status: Option<BugStatus>,
}

/// Request body for `PATCH /api/projects/{projectId}/bugs/{bugId}`.
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct BugStatusUpdate {
    pub status: BugStatus,
}
