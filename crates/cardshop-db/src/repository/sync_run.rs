//! # Sync Run Repository
//!
//! One row per sync attempt: `running` on start, then `completed` with the
//! reconcile counters or `failed` with the error text.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use cardshop_core::{ReconcileReport, SyncRun, SyncRunStatus, SyncTrigger};

const RUN_COLUMNS: &str = r#"id, "trigger", status, source, fetched, inserted, updated,
    unchanged, preserved, removed, kept, error, started_at, finished_at"#;

#[derive(Debug, Clone)]
pub struct SyncRunRepository {
    pool: SqlitePool,
}

impl SyncRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SyncRunRepository { pool }
    }

    /// Opens a run in `running` state.
    pub async fn start(&self, trigger: SyncTrigger) -> DbResult<SyncRun> {
        let id = Uuid::new_v4().to_string();
        debug!(run_id = %id, %trigger, "Recording sync run start");

        let run = sqlx::query_as(&format!(
            r#"
            INSERT INTO sync_runs (id, "trigger", status, started_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(trigger)
        .bind(SyncRunStatus::Running)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(run)
    }

    /// Closes a run as `completed` with its counters.
    pub async fn complete(&self, id: &str, report: &ReconcileReport) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_runs SET
                status = ?2, source = ?3, fetched = ?4, inserted = ?5, updated = ?6,
                unchanged = ?7, preserved = ?8, removed = ?9, kept = ?10,
                finished_at = ?11
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(SyncRunStatus::Completed)
        .bind(report.source.map(|s| s.as_str()))
        .bind(report.fetched as i64)
        .bind(report.inserted as i64)
        .bind(report.updated as i64)
        .bind(report.unchanged as i64)
        .bind(report.preserved as i64)
        .bind(report.removed as i64)
        .bind(report.kept as i64)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("SyncRun", id));
        }
        Ok(())
    }

    /// Closes a run as `failed`.
    pub async fn fail(&self, id: &str, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE sync_runs SET status = ?2, error = ?3, finished_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(SyncRunStatus::Failed)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("SyncRun", id));
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<SyncRun>> {
        let run = sqlx::query_as(&format!("SELECT {RUN_COLUMNS} FROM sync_runs WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(run)
    }

    /// Most recent runs, newest first.
    pub async fn latest(&self, limit: u32) -> DbResult<Vec<SyncRun>> {
        let runs = sqlx::query_as(&format!(
            "SELECT {RUN_COLUMNS} FROM sync_runs ORDER BY started_at DESC LIMIT ?1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(runs)
    }
}
