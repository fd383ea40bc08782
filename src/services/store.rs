//! src/services/store.rs
//!
//! EntityStore — the persistence substrate for identities, projects and bugs.
//! Every row lives in SQLite; the lifecycle services hold no copies of their
//! own and round-trip through here for every operation.
//!
//! The row operations exist twice: as free functions generic over any SQLite
//! executor (so they can run against a transaction's connection inside
//! [`EntityStore::run_in_transaction`]) and as `EntityStore` methods that run
//! them directly against the pool.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use sqlx::{
    Encode, FromRow, QueryBuilder, SqliteConnection, SqliteExecutor, SqlitePool, Type,
    query_builder::Separated,
    sqlite::{Sqlite, SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
};
use std::{io, path::Path, str::FromStr, sync::Arc};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Schema applied by [`EntityStore::migrate`].
const INIT_MIGRATION: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} `{id}` already exists")]
    Conflict { kind: &'static str, id: String },
    #[error("{kind} `{id}` references a missing parent row")]
    ReferentialViolation { kind: &'static str, id: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A row type persisted by the store.
///
/// Every table carries a `created_at` column, which the store sets on insert
/// and uses as the primary listing order.
pub trait Entity: for<'r> FromRow<'r, SqliteRow> + Send + Unpin + 'static {
    /// Human-readable kind used in errors and logs.
    const KIND: &'static str;
    const TABLE: &'static str;
    const KEY_COLUMN: &'static str = "id";
    /// Comma-separated column list, in the order `bind_row` binds them.
    const COLUMNS: &'static str;

    fn key(&self) -> &str;

    /// Apply store-owned timestamps before insert.
    fn stamp(&mut self, now: DateTime<Utc>);

    fn bind_row(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>);
}

/// A conjunction of `column = value` clauses. An empty filter matches every row.
///
/// Column names come from code, never from callers; only values are bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(&'static str, String)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<String>) -> Self {
        self.clauses.push((column, value.into()));
        self
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        for (index, (column, value)) in self.clauses.iter().enumerate() {
            builder.push(if index == 0 { " WHERE " } else { " AND " });
            builder.push(*column);
            builder.push(" = ");
            builder.push_bind(value.clone());
        }
    }
}

/// Insert `entity` with store-assigned timestamps and return the stored row.
///
/// Duplicate keys map to `Conflict`, missing foreign-key targets to
/// `ReferentialViolation`. A failed insert writes nothing.
pub async fn create<'e, T, E>(executor: E, mut entity: T) -> StoreResult<T>
where
    T: Entity,
    E: SqliteExecutor<'e>,
{
    entity.stamp(Utc::now());

    let mut builder =
        QueryBuilder::<Sqlite>::new(format!("INSERT INTO {} ({}) ", T::TABLE, T::COLUMNS));
    builder.push_values(std::iter::once(&entity), |mut row, e| e.bind_row(&mut row));
    builder.push(format!(" RETURNING {}", T::COLUMNS));

    debug!(kind = T::KIND, key = entity.key(), "inserting row");
    builder
        .build_query_as::<T>()
        .fetch_one(executor)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                StoreError::Conflict {
                    kind: T::KIND,
                    id: entity.key().to_string(),
                }
            } else if is_foreign_key_violation(&err) {
                StoreError::ReferentialViolation {
                    kind: T::KIND,
                    id: entity.key().to_string(),
                }
            } else {
                StoreError::Sqlx(err)
            }
        })
}

pub async fn find_by_id<'e, T, E>(executor: E, id: &str) -> StoreResult<Option<T>>
where
    T: Entity,
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?",
        T::COLUMNS,
        T::TABLE,
        T::KEY_COLUMN
    );
    let row = sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

/// Rows matching `filter`, oldest first.
pub async fn find_where<'e, T, E>(executor: E, filter: &Filter) -> StoreResult<Vec<T>>
where
    T: Entity,
    E: SqliteExecutor<'e>,
{
    let mut builder =
        QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM {}", T::COLUMNS, T::TABLE));
    filter.push_where(&mut builder);
    builder.push(format!(" ORDER BY created_at ASC, {} ASC", T::KEY_COLUMN));

    let rows = builder.build_query_as::<T>().fetch_all(executor).await?;
    Ok(rows)
}

/// Delete rows matching `filter` and return how many were removed.
///
/// Zero rows is not an error here; callers decide what an empty delete means.
pub async fn delete_where<'e, T, E>(executor: E, filter: &Filter) -> StoreResult<u64>
where
    T: Entity,
    E: SqliteExecutor<'e>,
{
    let mut builder = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {}", T::TABLE));
    filter.push_where(&mut builder);

    let result = builder.build().execute(executor).await?;
    debug!(
        kind = T::KIND,
        rows = result.rows_affected(),
        "deleted rows"
    );
    Ok(result.rows_affected())
}

/// Set `column = value` on rows matching `filter` and return how many changed.
pub async fn update_where<'e, T, E, V>(
    executor: E,
    filter: &Filter,
    column: &'static str,
    value: V,
) -> StoreResult<u64>
where
    T: Entity,
    E: SqliteExecutor<'e>,
    V: for<'q> Encode<'q, Sqlite> + Type<Sqlite> + Send + 'static,
{
    let mut builder =
        QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET {} = ", T::TABLE, column));
    builder.push_bind(value);
    filter.push_where(&mut builder);

    let result = builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}

/// Handle to the shared SQLite pool. Cheap to clone.
#[derive(Clone)]
pub struct EntityStore {
    db: Arc<SqlitePool>,
}

impl EntityStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Open a pool for `database_url`, creating the database file (and its
    /// parent directory) if missing. Foreign keys are enforced on every
    /// connection.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        if !database_url.contains(":memory:") {
            let db_path = options.get_filename();
            debug!("Interpreted SQLite path => {}", db_path.display());
            if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                ensure_dir(parent)?;
            }
        }

        // In-memory databases vanish with their last connection, so pooled
        // connections are never retired.
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self::new(Arc::new(pool)))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Apply the embedded schema, one statement at a time.
    pub async fn migrate(&self) -> StoreResult<()> {
        let statements = INIT_MIGRATION
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        info!("Running {} migration statements...", statements.len());

        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }

        Ok(())
    }

    /// Lightweight connectivity check.
    pub async fn ping(&self) -> StoreResult<i64> {
        let value = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(value)
    }

    pub async fn create<T: Entity>(&self, entity: T) -> StoreResult<T> {
        create(&*self.db, entity).await
    }

    pub async fn find_by_id<T: Entity>(&self, id: &str) -> StoreResult<Option<T>> {
        find_by_id(&*self.db, id).await
    }

    pub async fn find_where<T: Entity>(&self, filter: &Filter) -> StoreResult<Vec<T>> {
        find_where(&*self.db, filter).await
    }

    pub async fn delete_where<T: Entity>(&self, filter: &Filter) -> StoreResult<u64> {
        delete_where::<T, _>(&*self.db, filter).await
    }

    pub async fn update_where<T, V>(
        &self,
        filter: &Filter,
        column: &'static str,
        value: V,
    ) -> StoreResult<u64>
    where
        T: Entity,
        V: for<'q> Encode<'q, Sqlite> + Type<Sqlite> + Send + 'static,
    {
        update_where::<T, _, V>(&*self.db, filter, column, value).await
    }

    /// Run `work` inside one transaction.
    ///
    /// `work` receives the transaction's connection. If it returns `Err`, every
    /// write it made is rolled back and the error is returned unchanged;
    /// otherwise the transaction is committed.
    pub async fn run_in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, E>>,
        E: From<StoreError>,
    {
        let mut tx = self.db.begin().await.map_err(StoreError::from)?;

        let outcome = work(&mut *tx).await;
        match outcome {
            Ok(value) => {
                tx.commit().await.map_err(StoreError::from)?;
                Ok(value)
            }
            Err(err) => {
                match tx.rollback().await {
                    Ok(()) => debug!("transaction rolled back"),
                    Err(rollback_err) => warn!("transaction rollback failed: {}", rollback_err),
                }
                Err(err)
            }
        }
    }
}

fn ensure_dir(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        info!("Created missing directory {:?}", dir);
    }
    Ok(())
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err.is_unique_violation()
                || db_err.message().to_ascii_lowercase().contains("unique")
    )
}

/// Return true if SQLx error indicates a foreign key constraint violation.
fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err.is_foreign_key_violation()
                || db_err.message().to_ascii_lowercase().contains("foreign key")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        bug::{Bug, BugStatus, Priority},
        project::Project,
    };

    async fn test_store() -> EntityStore {
        let store = EntityStore::connect("sqlite::memory:", 1).await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn test_bug(id: &str, project_id: &str) -> Bug {
        Bug {
            id: id.to_string(),
            created_at: Utc::now(),
            project_id: project_id.to_string(),
            title: format!("bug {id}"),
            steps_to_reproduce: "open the app".to_string(),
            actual_result: "crash".to_string(),
            expected_result: "no crash".to_string(),
            priority: Priority::High,
            screenshot_url: None,
            device: Some("Pixel 8".to_string()),
            status: BugStatus::Open,
        }
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let store = test_store().await;
        store.migrate().await.unwrap();
        assert_eq!(store.ping().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_and_find_by_id() {
        let store = test_store().await;
        let created = store
            .create(Project::new("p1", "Demo", "#fff"))
            .await
            .unwrap();

        let found: Project = store.find_by_id("p1").await.unwrap().unwrap();
        assert_eq!(found, created);
        assert_eq!(found.created_at, found.updated_at);

        let missing: Option<Project> = store.find_by_id("nope").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_key_is_conflict_and_keeps_first_row() {
        let store = test_store().await;
        store
            .create(Project::new("p1", "Demo", "#fff"))
            .await
            .unwrap();

        let err = store
            .create(Project::new("p1", "Other", "#000"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { kind: "project", ref id } if id == "p1"));

        let kept: Project = store.find_by_id("p1").await.unwrap().unwrap();
        assert_eq!(kept.name, "Demo");
        assert_eq!(kept.color, "#fff");
    }

    #[tokio::test]
    async fn test_bug_without_project_is_referential_violation() {
        let store = test_store().await;
        let err = store.create(test_bug("b1", "ghost")).await.unwrap_err();
        assert!(matches!(err, StoreError::ReferentialViolation { kind: "bug", .. }));

        let bugs: Vec<Bug> = store.find_where(&Filter::all()).await.unwrap();
        assert!(bugs.is_empty());
    }

    #[tokio::test]
    async fn test_find_where_and_delete_where_respect_every_clause() {
        let store = test_store().await;
        store.create(Project::new("p1", "One", "#111")).await.unwrap();
        store.create(Project::new("p2", "Two", "#222")).await.unwrap();
        store.create(test_bug("b1", "p1")).await.unwrap();
        store.create(test_bug("b2", "p1")).await.unwrap();
        store.create(test_bug("b3", "p2")).await.unwrap();

        let p1_bugs: Vec<Bug> = store
            .find_where(&Filter::all().eq("project_id", "p1"))
            .await
            .unwrap();
        assert_eq!(
            p1_bugs.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(),
            vec!["b1", "b2"]
        );

        let removed = store
            .delete_where::<Bug>(&Filter::all().eq("id", "b3").eq("project_id", "p1"))
            .await
            .unwrap();
        assert_eq!(removed, 0);

        let removed = store
            .delete_where::<Bug>(&Filter::all().eq("id", "b3").eq("project_id", "p2"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_update_where_sets_column() {
        let store = test_store().await;
        store.create(Project::new("p1", "One", "#111")).await.unwrap();
        store.create(test_bug("b1", "p1")).await.unwrap();

        let changed = store
            .update_where::<Bug, _>(&Filter::all().eq("id", "b1"), "status", BugStatus::Resolved)
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let untouched = update_where::<Bug, _, _>(
            store.pool(),
            &Filter::all().eq("id", "missing"),
            "status",
            BugStatus::Open,
        )
        .await
        .unwrap();
        assert_eq!(untouched, 0);

        let bug: Bug = store.find_by_id("b1").await.unwrap().unwrap();
        assert_eq!(bug.status, BugStatus::Resolved);
    }

    #[tokio::test]
    async fn test_transaction_commits_on_ok() {
        let store = test_store().await;
        store.create(Project::new("p1", "One", "#111")).await.unwrap();
        store.create(test_bug("b1", "p1")).await.unwrap();

        let removed = store
            .run_in_transaction::<_, StoreError, _>(|conn| {
                Box::pin(async move {
                    let bugs = delete_where::<Bug, _>(
                        &mut *conn,
                        &Filter::all().eq("project_id", "p1"),
                    )
                    .await?;
                    let projects =
                        delete_where::<Project, _>(&mut *conn, &Filter::all().eq("id", "p1"))
                            .await?;
                    Ok(bugs + projects)
                })
            })
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let project: Option<Project> = store.find_by_id("p1").await.unwrap();
        assert!(project.is_none());
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_injected_failure() {
        let store = test_store().await;
        store.create(Project::new("p1", "One", "#111")).await.unwrap();
        store.create(test_bug("b1", "p1")).await.unwrap();
        store.create(test_bug("b2", "p1")).await.unwrap();

        let result = store
            .run_in_transaction::<(), StoreError, _>(|conn| {
                Box::pin(async move {
                    delete_where::<Bug, _>(&mut *conn, &Filter::all().eq("project_id", "p1"))
                        .await?;
                    delete_where::<Project, _>(&mut *conn, &Filter::all().eq("id", "p1"))
                        .await?;
                    Err(StoreError::Sqlx(sqlx::Error::Protocol(
                        "injected failure".into(),
                    )))
                })
            })
            .await;
        assert!(result.is_err());

        let project: Option<Project> = store.find_by_id("p1").await.unwrap();
        assert!(project.is_some());
        let bugs: Vec<Bug> = store
            .find_where(&Filter::all().eq("project_id", "p1"))
            .await
            .unwrap();
        assert_eq!(bugs.len(), 2);
    }

    #[tokio::test]
    async fn test_connect_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested/meta/bugly.db");
        let url = format!("sqlite://{}", db_path.display());

        let store = EntityStore::connect(&url, 1).await.unwrap();
        store.migrate().await.unwrap();

        assert!(db_path.exists());
    }
}
