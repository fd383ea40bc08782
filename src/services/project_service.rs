//! src/services/project_service.rs
//!
//! ProjectService — creates, lists and deletes projects. Deleting a project
//! is a manual cascade: its bugs go first, then the project row, all inside a
//! single transaction.

use crate::{
    models::{
        bug::Bug,
        project::{NewProject, Project, ProjectWithBugs},
    },
    services::{
        LifecycleError, LifecycleResult, assign_id, required,
        store::{self, EntityStore, Filter},
    },
};
use std::collections::HashMap;
use tracing::info;

/// Color tag used when a project is created without one.
pub const DEFAULT_COLOR: &str = "blue.400";

#[derive(Clone)]
pub struct ProjectService {
    store: EntityStore,
}

impl ProjectService {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Every project with its bugs attached.
    ///
    /// Reads all projects and all bugs once each, inside one transaction so
    /// the two reads see the same snapshot, then groups bugs in memory.
    pub async fn list(&self) -> LifecycleResult<Vec<ProjectWithBugs>> {
        let (projects, bugs) = self
            .store
            .run_in_transaction::<_, LifecycleError, _>(|conn| {
                Box::pin(async move {
                    let projects = store::find_where::<Project, _>(&mut *conn, &Filter::all())
                        .await?;
                    let bugs = store::find_where::<Bug, _>(&mut *conn, &Filter::all()).await?;
                    Ok((projects, bugs))
                })
            })
            .await?;

        Ok(attach_bugs(projects, bugs))
    }

    pub async fn get(&self, project_id: &str) -> LifecycleResult<ProjectWithBugs> {
        let id = project_id.to_string();
        self.store
            .run_in_transaction::<_, LifecycleError, _>(move |conn| {
                Box::pin(async move {
                    let found = store::find_by_id::<Project, _>(&mut *conn, &id).await?;
                    let Some(project) = found else {
                        return Err(LifecycleError::NotFound { kind: "project", id });
                    };
                    let bugs = store::find_where::<Bug, _>(
                        &mut *conn,
                        &Filter::all().eq("project_id", id.as_str()),
                    )
                    .await?;
                    Ok(ProjectWithBugs { project, bugs })
                })
            })
            .await
    }

    /// Persist a new project. `name` is required; `id` and `color` are optional.
    pub async fn create(&self, input: NewProject) -> LifecycleResult<Project> {
        let name = required(input.name, "name")?;
        let id = assign_id(input.id)?;
        let color = input
            .color
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_COLOR.to_string());

        let project = self.store.create(Project::new(id, name, color)).await?;
        info!(project_id = %project.id, "created project");
        Ok(project)
    }

    /// Delete a project and all of its bugs atomically.
    ///
    /// Bugs are removed before the project row is checked, so when no project
    /// row matches, the bug removals are rolled back with the rest of the
    /// transaction and `NotFound` is returned.
    pub async fn delete(&self, project_id: &str) -> LifecycleResult<()> {
        let id = project_id.to_string();
        let removed_bugs = self
            .store
            .run_in_transaction::<_, LifecycleError, _>(move |conn| {
                Box::pin(async move {
                    let removed_bugs = store::delete_where::<Bug, _>(
                        &mut *conn,
                        &Filter::all().eq("project_id", id.as_str()),
                    )
                    .await?;

                    let removed_projects = store::delete_where::<Project, _>(
                        &mut *conn,
                        &Filter::all().eq("id", id.as_str()),
                    )
                    .await?;

                    if removed_projects == 0 {
                        return Err(LifecycleError::NotFound { kind: "project", id });
                    }
                    Ok(removed_bugs)
                })
            })
            .await?;

        info!(project_id, removed_bugs, "deleted project and its bugs");
        Ok(())
    }
}

/// Group bugs under their owning projects, keeping project order.
fn attach_bugs(projects: Vec<Project>, bugs: Vec<Bug>) -> Vec<ProjectWithBugs> {
    let mut by_project: HashMap<String, Vec<Bug>> = HashMap::new();
    for bug in bugs {
        by_project
            .entry(bug.project_id.clone())
            .or_default()
            .push(bug);
    }

    projects
        .into_iter()
        .map(|project| {
            let bugs = by_project.remove(&project.id).unwrap_or_default();
            ProjectWithBugs { project, bugs }
        })
        .collect()
}
