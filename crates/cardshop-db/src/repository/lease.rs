//! # Lease Repository
//!
//! Cross-process mutual exclusion for sync runs.
//!
//! ```text
//!   try_acquire("ebay_sync", holder, ttl)
//!        │
//!        ▼
//!   INSERT ... ON CONFLICT(name) DO UPDATE ... WHERE expires_at <= now
//!        │
//!        ▼
//!   SELECT holder ── == holder ──► acquired
//!                 └─ != holder ──► someone else is syncing
//! ```
//!
//! An expired lease is taken over, so a crashed run blocks the next one for
//! at most `ttl_secs`.

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct LeaseRepository {
    pool: SqlitePool,
}

impl LeaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LeaseRepository { pool }
    }

    /// Tries to take the named lease. Returns `true` when `holder` owns it.
    pub async fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        ttl_secs: i64,
        now_unix: i64,
    ) -> DbResult<bool> {
        sqlx::query(
            r#"
            INSERT INTO sync_leases (name, holder, acquired_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(name) DO UPDATE SET
                holder = excluded.holder,
                acquired_at = excluded.acquired_at,
                expires_at = excluded.expires_at
            WHERE sync_leases.expires_at <= excluded.acquired_at
            "#,
        )
        .bind(name)
        .bind(holder)
        .bind(now_unix)
        .bind(now_unix + ttl_secs)
        .execute(&self.pool)
        .await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT holder FROM sync_leases WHERE name = ?1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        let acquired = current.as_deref() == Some(holder);
        if acquired {
            debug!(name, holder, "Lease acquired");
        } else {
            warn!(name, current = ?current, "Lease held by another run");
        }
        Ok(acquired)
    }

    /// Releases the lease if `holder` still owns it.
    pub async fn release(&self, name: &str, holder: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM sync_leases WHERE name = ?1 AND holder = ?2")
            .bind(name)
            .bind(holder)
            .execute(&self.pool)
            .await?;
        debug!(name, holder, released = result.rows_affected() > 0, "Lease release");
        Ok(result.rows_affected() > 0)
    }

    /// Current holder, if the lease is live at `now_unix`.
    pub async fn holder(&self, name: &str, now_unix: i64) -> DbResult<Option<String>> {
        let holder = sqlx::query_scalar(
            "SELECT holder FROM sync_leases WHERE name = ?1 AND expires_at > ?2",
        )
        .bind(name)
        .bind(now_unix)
        .fetch_optional(&self.pool)
        .await?;
        Ok(holder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    const LEASE: &str = "ebay_sync";

    #[tokio::test]
    async fn test_second_holder_is_refused() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let leases = db.leases();

        assert!(leases.try_acquire(LEASE, "a", 60, 1_000).await.unwrap());
        assert!(!leases.try_acquire(LEASE, "b", 60, 1_010).await.unwrap());
        assert_eq!(leases.holder(LEASE, 1_010).await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_expired_lease_is_taken_over() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let leases = db.leases();

        assert!(leases.try_acquire(LEASE, "a", 60, 1_000).await.unwrap());
        assert!(leases.try_acquire(LEASE, "b", 60, 1_060).await.unwrap());
        assert!(!leases.release(LEASE, "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_release_allows_reacquire() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let leases = db.leases();

        assert!(leases.try_acquire(LEASE, "a", 60, 1_000).await.unwrap());
        assert!(leases.release(LEASE, "a").await.unwrap());
        assert!(leases.try_acquire(LEASE, "b", 60, 1_001).await.unwrap());
        assert_eq!(leases.holder(LEASE, 5_000).await.unwrap(), None);
    }
}
