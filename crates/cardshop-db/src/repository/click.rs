//! # Click Repository
//!
//! Append-only click log for storefront "view on eBay" clicks.
//!
//! ```text
//!   record_click(listing_id)
//!        │
//!        ▼  BEGIN
//!   listing exists? ── no ──► NotFound (nothing written)
//!        │ yes
//!        ├──► INSERT INTO ebay_clicks
//!        └──► UPDATE ebay_listings SET click_count = click_count + 1
//!           COMMIT
//! ```
//!
//! The counter is incremented in SQL so concurrent clicks never lose updates.
//! Logged clicks are kept when their listing row is deleted.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use cardshop_core::{ClickEvent, NewClick};

#[derive(Debug, Clone)]
pub struct ClickRepository {
    pool: SqlitePool,
}

impl ClickRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ClickRepository { pool }
    }

    /// Records one click and bumps the listing's counter atomically.
    ///
    /// Returns the listing's new click count.
    pub async fn record_click(&self, click: &NewClick, now: DateTime<Utc>) -> DbResult<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM ebay_listings WHERE id = ?1")
            .bind(click.listing_id)
            .fetch_optional(&mut *tx)
            .await?;

        if exists.is_none() {
            return Err(DbError::not_found("Listing", click.listing_id));
        }

        sqlx::query(
            r#"
            INSERT INTO ebay_clicks (listing_id, visitor_ip, user_agent, referrer, click_date)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(click.listing_id)
        .bind(&click.visitor_ip)
        .bind(&click.user_agent)
        .bind(&click.referrer)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let count: i64 = sqlx::query_scalar(
            "UPDATE ebay_listings SET click_count = click_count + 1 WHERE id = ?1 \
             RETURNING click_count",
        )
        .bind(click.listing_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(listing_id = click.listing_id, count, "Click recorded");
        Ok(count)
    }

    /// Number of logged clicks for a listing.
    pub async fn count_for_listing(&self, listing_id: i64) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ebay_clicks WHERE listing_id = ?1")
            .bind(listing_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Most recent clicks for a listing, newest first.
    pub async fn recent_for_listing(&self, listing_id: i64, limit: u32) -> DbResult<Vec<ClickEvent>> {
        let clicks = sqlx::query_as(
            r#"
            SELECT id, listing_id, visitor_ip, user_agent, referrer, click_date
            FROM ebay_clicks
            WHERE listing_id = ?1
            ORDER BY click_date DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(listing_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(clicks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use cardshop_core::{diff, FetchedListing, UpstreamStatus};

    async fn seeded() -> (Database, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = db
            .listings()
            .insert(
                &FetchedListing {
                    item_id: "555".to_string(),
                    title: "Black Lotus".to_string(),
                    description: String::new(),
                    price_cents: 100_000,
                    currency: "USD".to_string(),
                    quantity: 1,
                    image_url: String::new(),
                    listing_url: String::new(),
                    seller_id: "cardseller".to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        (db, id)
    }

    #[tokio::test]
    async fn test_record_click_increments_counter() {
        let (db, id) = seeded().await;
        let clicks = db.clicks();

        let click = NewClick {
            listing_id: id,
            visitor_ip: Some("203.0.113.9".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
            referrer: None,
        };
        assert_eq!(clicks.record_click(&click, Utc::now()).await.unwrap(), 1);
        assert_eq!(clicks.record_click(&click, Utc::now()).await.unwrap(), 2);

        assert_eq!(clicks.count_for_listing(id).await.unwrap(), 2);
        let row = db.listings().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.click_count, 2);

        let recent = clicks.recent_for_listing(id, 10).await.unwrap();
        assert_eq!(recent[0].visitor_ip.as_deref(), Some("203.0.113.9"));
    }

    #[tokio::test]
    async fn test_click_on_unknown_listing_writes_nothing() {
        let (db, _) = seeded().await;
        let clicks = db.clicks();

        let err = clicks
            .record_click(
                &NewClick {
                    listing_id: 9999,
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(clicks.count_for_listing(9999).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_click_log_survives_listing_delete() {
        let (db, id) = seeded().await;
        let clicks = db.clicks();
        let click = NewClick {
            listing_id: id,
            ..Default::default()
        };
        for _ in 0..3 {
            clicks.record_click(&click, Utc::now()).await.unwrap();
        }

        let listings = db.listings();
        let snapshot = listings.load_snapshot().await.unwrap();
        let mut changes = diff(&snapshot, &[]);
        let gone = changes.missing[0].clone();
        changes.record_missing(&gone, UpstreamStatus::Sold);
        let outcome = listings.apply_change_set(&changes, Utc::now()).await.unwrap();
        assert_eq!(outcome.removed, 1);
        assert!(listings.get_by_id(id).await.unwrap().is_none());

        assert_eq!(clicks.count_for_listing(id).await.unwrap(), 3);
        assert_eq!(clicks.recent_for_listing(id, 10).await.unwrap().len(), 3);
    }
}
