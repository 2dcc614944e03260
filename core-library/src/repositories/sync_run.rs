//! # Sync Run Repository
//!
//! Persists the history of folder sync runs.
//!
//! A run is written once as `running` when it starts and finalized once when
//! it ends. A row that already carries a terminal status is never rewritten.

use crate::error::{LibraryError, Result};
use crate::models::{SyncRun, SyncRunId, SyncRunRow};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    /// Insert a new run or update a still-running one
    ///
    /// # Errors
    ///
    /// Returns `SyncRunFinalized` if the stored run is already terminal
    async fn record(&self, run: &SyncRun) -> Result<()>;

    async fn find_by_id(&self, id: &SyncRunId) -> Result<Option<SyncRun>>;

    /// Most recent runs first
    async fn recent(&self, limit: u32) -> Result<Vec<SyncRun>>;
}

pub struct SqliteSyncRunRepository {
    pool: SqlitePool,
}

impl SqliteSyncRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncRunRepository for SqliteSyncRunRepository {
    async fn record(&self, run: &SyncRun) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_runs (
                id, folder, started_at, finished_at, status,
                added, updated, removed, error_count, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                finished_at = excluded.finished_at,
                status = excluded.status,
                added = excluded.added,
                updated = excluded.updated,
                removed = excluded.removed,
                error_count = excluded.error_count,
                error_message = excluded.error_message
            WHERE sync_runs.status = 'running'
            "#,
        )
        .bind(run.id.to_string())
        .bind(run.folder.to_string_lossy().as_ref())
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.status.as_str())
        .bind(run.added as i64)
        .bind(run.updated as i64)
        .bind(run.removed as i64)
        .bind(run.error_count as i64)
        .bind(&run.error_message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::SyncRunFinalized {
                id: run.id.to_string(),
            });
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &SyncRunId) -> Result<Option<SyncRun>> {
        let row = query_as::<_, SyncRunRow>(
            r#"
            SELECT id, folder, started_at, finished_at, status,
                   added, updated, removed, error_count, error_message
            FROM sync_runs
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(SyncRun::try_from).transpose()
    }

    async fn recent(&self, limit: u32) -> Result<Vec<SyncRun>> {
        let rows = query_as::<_, SyncRunRow>(
            r#"
            SELECT id, folder, started_at, finished_at, status,
                   added, updated, removed, error_count, error_message
            FROM sync_runs
            ORDER BY started_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SyncRun::try_from).collect()
    }
}
