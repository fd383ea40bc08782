//! src/services/bug_service.rs
//!
//! BugService — files, lists, resolves and deletes bugs. Every operation on an
//! existing bug is scoped by both the project id and the bug id.

use crate::{
    models::{
        bug::{Bug, BugStatus, NewBug},
        project::Project,
    },
    services::{
        LifecycleError, LifecycleResult, assign_id, required,
        store::{self, EntityStore, Filter, StoreError},
    },
};
use chrono::Utc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct BugService {
    store: EntityStore,
}

/// Filter that matches a bug only inside the project the caller names.
fn scoped(project_id: &str, bug_id: &str) -> Filter {
    Filter::all()
        .eq("id", bug_id)
        .eq("project_id", project_id)
}

impl BugService {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// File a bug against an existing project.
    ///
    /// `projectId` and `title` are required. Status defaults to `Open` and
    /// priority to `Medium`. A missing project surfaces as
    /// `ReferentialViolation` and nothing is written.
    pub async fn create(&self, input: NewBug) -> LifecycleResult<Bug> {
        let project_id = required(input.project_id, "projectId")?;
        let title = required(input.title, "title")?;
        let id = assign_id(input.id)?;

        let bug = Bug {
            id,
            created_at: Utc::now(),
            project_id: project_id.clone(),
            title,
            steps_to_reproduce: input.steps_to_reproduce.unwrap_or_default(),
            actual_result: input.actual_result.unwrap_or_default(),
            expected_result: input.expected_result.unwrap_or_default(),
            priority: input.priority.unwrap_or_default(),
            screenshot_url: input.screenshot_url.filter(|url| !url.trim().is_empty()),
            device: input.device.filter(|device| !device.trim().is_empty()),
            status: input.status.unwrap_or_default(),
        };

        match self.store.create(bug).await {
            Ok(bug) => {
                info!(bug_id = %bug.id, project_id = %bug.project_id, "filed bug");
                Ok(bug)
            }
            Err(StoreError::ReferentialViolation { .. }) => {
                Err(LifecycleError::ReferentialViolation { project_id })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Bugs belonging to `project_id`, oldest first.
    pub async fn list_for_project(&self, project_id: &str) -> LifecycleResult<Vec<Bug>> {
        let id = project_id.to_string();
        self.store
            .run_in_transaction::<_, LifecycleError, _>(move |conn| {
                Box::pin(async move {
                    let project = store::find_by_id::<Project, _>(&mut *conn, &id).await?;
                    if project.is_none() {
                        return Err(LifecycleError::NotFound { kind: "project", id });
                    }
                    let bugs = store::find_where::<Bug, _>(
                        &mut *conn,
                        &Filter::all().eq("project_id", id.as_str()),
                    )
                    .await?;
                    Ok(bugs)
                })
            })
            .await
    }

    /// Delete a bug only if it belongs to `project_id`.
    ///
    /// A bug id that exists under another project is reported as `NotFound`
    /// and left untouched.
    pub async fn delete(&self, project_id: &str, bug_id: &str) -> LifecycleResult<()> {
        let removed = self
            .store
            .delete_where::<Bug>(&scoped(project_id, bug_id))
            .await?;

        if removed == 0 {
            debug!(project_id, bug_id, "no bug matched scoped delete");
            return Err(LifecycleError::NotFound {
                kind: "bug",
                id: bug_id.to_string(),
            });
        }

        info!(project_id, bug_id, "deleted bug");
        Ok(())
    }

    /// Set a bug's status, scoped by project like [`BugService::delete`].
    pub async fn update_status(
        &self,
        project_id: &str,
        bug_id: &str,
        status: BugStatus,
    ) -> LifecycleResult<Bug> {
        let filter = scoped(project_id, bug_id);
        let id = bug_id.to_string();

        let bug = self
            .store
            .run_in_transaction::<_, LifecycleError, _>(move |conn| {
                Box::pin(async move {
                    let changed =
                        store::update_where::<Bug, _, _>(&mut *conn, &filter, "status", status)
                            .await?;
                    if changed == 0 {
                        return Err(LifecycleError::NotFound { kind: "bug", id });
                    }
                    let bug = store::find_by_id::<Bug, _>(&mut *conn, &id).await?;
                    bug.ok_or(LifecycleError::NotFound { kind: "bug", id })
                })
            })
            .await?;

        info!(project_id, bug_id, status = ?bug.status, "updated bug status");
        Ok(bug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{bug::Priority, project::NewProject},
        services::project_service::ProjectService,
    };
    use rstest::rstest;

    async fn setup() -> (EntityStore, BugService) {
        let store = EntityStore::connect("sqlite::memory:", 1).await.unwrap();
        store.migrate().await.unwrap();

        let projects = ProjectService::new(store.clone());
        for id in ["p1", "p2"] {
            projects
                .create(NewProject {
                    id: Some(id.to_string()),
                    name: Some(format!("Project {id}")),
                    color: None,
                })
                .await
                .unwrap();
        }

        (store.clone(), BugService::new(store))
    }

    fn new_bug(id: &str, project_id: &str) -> NewBug {
        NewBug {
            id: Some(id.to_string()),
            project_id: Some(project_id.to_string()),
            title: Some("App crashes on login".to_string()),
            steps_to_reproduce: Some("1. Open app\n2. Tap login".to_string()),
            actual_result: Some("Crash".to_string()),
            expected_result: Some("Dashboard".to_string()),
            priority: Some(Priority::High),
            device: Some("iPhone 15".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_defaults_status_to_open() {
        let (_, bugs) = setup().await;
        let bug = bugs.create(new_bug("BUG-1", "p1")).await.unwrap();

        assert_eq!(bug.id, "BUG-1");
        assert_eq!(bug.project_id, "p1");
        assert_eq!(bug.status, BugStatus::Open);
        assert_eq!(bug.priority, Priority::High);
        assert_eq!(bug.device.as_deref(), Some("iPhone 15"));
        assert!(bug.screenshot_url.is_none());
    }

    #[tokio::test]
    async fn test_create_defaults_priority_to_medium() {
        let (_, bugs) = setup().await;
        let bug = bugs
            .create(NewBug {
                project_id: Some("p1".into()),
                title: Some("Minimal".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(bug.priority, Priority::Medium);
        assert_eq!(bug.steps_to_reproduce, "");
    }

    #[rstest]
    #[case::missing_project(None, Some("title"), "projectId")]
    #[case::blank_project(Some("  "), Some("title"), "projectId")]
    #[case::missing_title(Some("p1"), None, "title")]
    #[case::blank_title(Some("p1"), Some(""), "title")]
    #[tokio::test]
    async fn test_create_rejects_missing_fields(
        #[case] project_id: Option<&str>,
        #[case] title: Option<&str>,
        #[case] field: &str,
    ) {
        let (_, bugs) = setup().await;
        let err = bugs
            .create(NewBug {
                project_id: project_id.map(str::to_string),
                title: title.map(str::to_string),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(ref msg) if msg.contains(field)));
    }

    #[tokio::test]
    async fn test_create_against_missing_project_writes_nothing() {
        let (store, bugs) = setup().await;
        let err = bugs.create(new_bug("BUG-1", "ghost")).await.unwrap_err();
        assert!(
            matches!(err, LifecycleError::ReferentialViolation { ref project_id } if project_id == "ghost")
        );

        let row: Option<Bug> = store.find_by_id("BUG-1").await.unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_bug_id_is_conflict() {
        let (_, bugs) = setup().await;
        bugs.create(new_bug("BUG-1", "p1")).await.unwrap();
        let err = bugs.create(new_bug("BUG-1", "p2")).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Conflict { kind: "bug", .. }));
    }

    #[tokio::test]
    async fn test_delete_requires_matching_project() {
        let (store, bugs) = setup().await;
        bugs.create(new_bug("BUG-1", "p1")).await.unwrap();

        let err = bugs.delete("p2", "BUG-1").await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { kind: "bug", .. }));
        let still_there: Option<Bug> = store.find_by_id("BUG-1").await.unwrap();
        assert!(still_there.is_some());

        bugs.delete("p1", "BUG-1").await.unwrap();
        let gone: Option<Bug> = store.find_by_id("BUG-1").await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_bug_is_not_found() {
        let (_, bugs) = setup().await;
        let err = bugs.delete("p1", "BUG-404").await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { kind: "bug", ref id } if id == "BUG-404"));
    }

    #[tokio::test]
    async fn test_update_status_resolves_and_reopens() {
        let (_, bugs) = setup().await;
        bugs.create(new_bug("BUG-1", "p1")).await.unwrap();

        let resolved = bugs
            .update_status("p1", "BUG-1", BugStatus::Resolved)
            .await
            .unwrap();
        assert_eq!(resolved.status, BugStatus::Resolved);
        assert_eq!(resolved.title, "App crashes on login");

        let reopened = bugs
            .update_status("p1", "BUG-1", BugStatus::Open)
            .await
            .unwrap();
        assert_eq!(reopened.status, BugStatus::Open);
    }

    #[tokio::test]
    async fn test_update_status_is_scoped_by_project() {
        let (store, bugs) = setup().await;
        bugs.create(new_bug("BUG-1", "p1")).await.unwrap();

        let err = bugs
            .update_status("p2", "BUG-1", BugStatus::Resolved)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { kind: "bug", .. }));

        let bug: Bug = store.find_by_id("BUG-1").await.unwrap().unwrap();
        assert_eq!(bug.status, BugStatus::Open);
    }

    #[tokio::test]
    async fn test_list_for_project() {
        let (_, bugs) = setup().await;
        bugs.create(new_bug("BUG-1", "p1")).await.unwrap();
        bugs.create(new_bug("BUG-2", "p2")).await.unwrap();

        let listed = bugs.list_for_project("p1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "BUG-1");

        let err = bugs.list_for_project("ghost").await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { kind: "project", .. }));
    }
}
