//! # Listing Repository
//!
//! Database operations for mirrored eBay listings.
//!
//! ## Change Set Application
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 apply_change_set (SINGLE TRANSACTION)                   │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   ├── INSERT  new SKUs                                                  │
//! │   ├── UPDATE  only the changed columns + last_updated, per listing      │
//! │   ├── UPDATE  quantity = 0 for preserved rows                           │
//! │   └── DELETE  rows gone upstream with no user metadata                  │
//! │  COMMIT ← all or nothing; a crash leaves the previous mirror intact     │
//! │                                                                         │
//! │  Never written here: category, is_favorite, click_count                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use cardshop_core::{ChangeSet, FetchedListing, Listing, ListingFilter, ListingPatch};

const LISTING_COLUMNS: &str = "id, sku, ebay_item_id, title, description, price_cents, currency, \
     quantity, seller_id, image_url, listing_url, category, is_favorite, click_count, \
     is_active, is_featured, created_at, last_updated";

/// Rows written by [`ListingRepository::apply_change_set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub inserted: u64,
    pub updated: u64,
    pub preserved: u64,
    pub removed: u64,
}

/// Repository for listing database operations.
#[derive(Debug, Clone)]
pub struct ListingRepository {
    pool: SqlitePool,
}

impl ListingRepository {
    /// Creates a new ListingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ListingRepository { pool }
    }

    /// Loads every listing keyed by SKU.
    ///
    /// The sync diff runs against this snapshot, so it covers the whole
    /// table regardless of `is_active` or quantity.
    pub async fn load_snapshot(&self) -> DbResult<HashMap<String, Listing>> {
        let rows: Vec<Listing> =
            sqlx::query_as(&format!("SELECT {LISTING_COLUMNS} FROM ebay_listings"))
                .fetch_all(&self.pool)
                .await?;

        debug!(count = rows.len(), "Loaded listing snapshot");
        Ok(rows.into_iter().map(|row| (row.sku.clone(), row)).collect())
    }

    /// Applies a change set atomically.
    ///
    /// ## Returns
    /// * `Ok(ApplyOutcome)` - rows actually written
    /// * `Err(DbError)` - nothing was written (transaction rolled back)
    pub async fn apply_change_set(
        &self,
        changes: &ChangeSet,
        now: DateTime<Utc>,
    ) -> DbResult<ApplyOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let mut outcome = ApplyOutcome::default();

        for listing in &changes.inserts {
            insert_listing(&mut tx, listing, now).await?;
            outcome.inserted += 1;
        }

        for patch in &changes.updates {
            outcome.updated += update_listing(&mut tx, patch, now).await?;
        }

        for id in &changes.preserve {
            let result = sqlx::query(
                "UPDATE ebay_listings SET quantity = 0, last_updated = ?2 WHERE id = ?1",
            )
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            outcome.preserved += result.rows_affected();
        }

        for id in &changes.delete {
            let result = sqlx::query("DELETE FROM ebay_listings WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            outcome.removed += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            inserted = outcome.inserted,
            updated = outcome.updated,
            preserved = outcome.preserved,
            removed = outcome.removed,
            "Change set applied"
        );
        Ok(outcome)
    }

    /// Inserts a single fetched listing and returns its row id.
    pub async fn insert(&self, listing: &FetchedListing, now: DateTime<Utc>) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        insert_listing(&mut conn, listing, now).await
    }

    /// Gets a listing by row id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Listing>> {
        let listing = sqlx::query_as(&format!(
            "SELECT {LISTING_COLUMNS} FROM ebay_listings WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(listing)
    }

    /// Gets a listing by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Listing>> {
        let listing = sqlx::query_as(&format!(
            "SELECT {LISTING_COLUMNS} FROM ebay_listings WHERE sku = ?1"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;
        Ok(listing)
    }

    /// Lists purchasable listings (active with stock) for the storefront.
    ///
    /// Featured listings come first, then most recently updated.
    pub async fn list_active(&self, filter: &ListingFilter) -> DbResult<Vec<Listing>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {LISTING_COLUMNS} FROM ebay_listings WHERE is_active = 1 AND quantity > 0"
        ));

        if let Some(category) = filter.category.as_deref().filter(|c| !c.trim().is_empty()) {
            qb.push(" AND category = ").push_bind(category.trim().to_string());
        }
        if filter.featured_only {
            qb.push(" AND is_featured = 1");
        }
        if filter.favorites_only {
            qb.push(" AND is_favorite = 1");
        }

        qb.push(" ORDER BY is_featured DESC, last_updated DESC, id DESC LIMIT ")
            .push_bind(i64::from(filter.limit));

        let listings = qb.build_query_as::<Listing>().fetch_all(&self.pool).await?;
        Ok(listings)
    }

    /// Assigns (or clears, with `None` or a blank name) the admin category.
    pub async fn set_category(&self, id: i64, category: Option<&str>) -> DbResult<()> {
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        debug!(id, category = ?category, "Setting listing category");

        let result = sqlx::query("UPDATE ebay_listings SET category = ?2 WHERE id = ?1")
            .bind(id)
            .bind(category)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Listing", id));
        }
        Ok(())
    }

    /// Flips the favorite flag and returns the new value.
    pub async fn toggle_favorite(&self, id: i64) -> DbResult<bool> {
        let value: Option<bool> = sqlx::query_scalar(
            "UPDATE ebay_listings \
             SET is_favorite = CASE WHEN is_favorite = 1 THEN 0 ELSE 1 END \
             WHERE id = ?1 RETURNING is_favorite",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        value.ok_or_else(|| DbError::not_found("Listing", id))
    }

    /// Sets the featured flag.
    pub async fn set_featured(&self, id: i64, featured: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE ebay_listings SET is_featured = ?2 WHERE id = ?1")
            .bind(id)
            .bind(featured)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Listing", id));
        }
        Ok(())
    }

    /// Counts all mirrored listings.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ebay_listings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Statement helpers (shared by pool and transaction callers)
// =============================================================================

async fn insert_listing(
    conn: &mut SqliteConnection,
    listing: &FetchedListing,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    let sku = listing.sku();
    debug!(sku = %sku, "Inserting listing");

    let result = sqlx::query(
        r#"
        INSERT INTO ebay_listings (
            sku, ebay_item_id, title, description, price_cents, currency,
            quantity, seller_id, image_url, listing_url,
            is_active, created_at, last_updated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11, ?11)
        "#,
    )
    .bind(&sku)
    .bind(&listing.item_id)
    .bind(&listing.title)
    .bind(&listing.description)
    .bind(listing.price_cents)
    .bind(&listing.currency)
    .bind(listing.quantity)
    .bind(&listing.seller_id)
    .bind(&listing.image_url)
    .bind(&listing.listing_url)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => DbError::duplicate(field, sku.clone()),
        other => other,
    })?;

    Ok(result.last_insert_rowid())
}

/// Writes only the columns present in the patch, plus `last_updated`.
async fn update_listing(
    conn: &mut SqliteConnection,
    patch: &ListingPatch,
    now: DateTime<Utc>,
) -> DbResult<u64> {
    if patch.is_empty() {
        return Ok(0);
    }

    debug!(
        sku = %patch.sku,
        columns = ?patch.changed_columns(),
        "Updating listing"
    );

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE ebay_listings SET ");
    {
        let mut set = qb.separated(", ");
        if let Some(title) = &patch.title {
            set.push("title = ").push_bind_unseparated(title.clone());
        }
        if let Some(description) = &patch.description {
            set.push("description = ")
                .push_bind_unseparated(description.clone());
        }
        if let Some(price_cents) = patch.price_cents {
            set.push("price_cents = ").push_bind_unseparated(price_cents);
        }
        if let Some(quantity) = patch.quantity {
            set.push("quantity = ").push_bind_unseparated(quantity);
        }
        if let Some(image_url) = &patch.image_url {
            set.push("image_url = ").push_bind_unseparated(image_url.clone());
        }
        set.push("last_updated = ").push_bind_unseparated(now);
    }
    qb.push(" WHERE id = ").push_bind(patch.id);

    let result = qb.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use cardshop_core::{diff, UpstreamStatus};

    fn fetched(item_id: &str, title: &str, price_cents: i64) -> FetchedListing {
        FetchedListing {
            item_id: item_id.to_string(),
            title: title.to_string(),
            description: String::new(),
            price_cents,
            currency: "USD".to_string(),
            quantity: 1,
            image_url: String::new(),
            listing_url: format!("https://www.ebay.com/itm/{item_id}"),
            seller_id: "cardseller".to_string(),
        }
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_snapshot() {
        let db = db().await;
        let repo = db.listings();
        repo.insert(&fetched("111", "Pikachu", 500), Utc::now())
            .await
            .unwrap();

        let snapshot = repo.load_snapshot().await.unwrap();
        let row = snapshot.get("EBAY-111").unwrap();
        assert_eq!(row.title, "Pikachu");
        assert_eq!(row.click_count, 0);
        assert!(row.is_active);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = db().await;
        let repo = db.listings();
        let now = Utc::now();
        repo.insert(&fetched("111", "A", 1), now).await.unwrap();

        let err = repo.insert(&fetched("111", "B", 2), now).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_apply_change_set_protects_user_metadata() {
        let db = db().await;
        let repo = db.listings();
        let now = Utc::now();

        let kept_id = repo.insert(&fetched("111", "Old", 1000), now).await.unwrap();
        repo.insert(&fetched("222", "Gone", 500), now).await.unwrap();
        repo.set_category(kept_id, Some("Pokemon")).await.unwrap();
        repo.toggle_favorite(kept_id).await.unwrap();

        let snapshot = repo.load_snapshot().await.unwrap();
        let mut changes = diff(&snapshot, &[fetched("111", "New", 1200)]);
        let gone = changes.missing[0].clone();
        changes.record_missing(&gone, UpstreamStatus::Sold);

        let outcome = repo.apply_change_set(&changes, Utc::now()).await.unwrap();
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.removed, 1);

        let row = repo.get_by_sku("EBAY-111").await.unwrap().unwrap();
        assert_eq!(row.title, "New");
        assert_eq!(row.price_cents, 1200);
        assert_eq!(row.category.as_deref(), Some("Pokemon"));
        assert!(row.is_favorite);
        assert!(repo.get_by_sku("EBAY-222").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_preserve_zeroes_quantity_only() {
        let db = db().await;
        let repo = db.listings();
        let id = repo.insert(&fetched("333", "Favorite", 900), Utc::now()).await.unwrap();
        repo.toggle_favorite(id).await.unwrap();

        let snapshot = repo.load_snapshot().await.unwrap();
        let mut changes = diff(&snapshot, &[]);
        let row = changes.missing[0].clone();
        changes.record_missing(&row, UpstreamStatus::Ended);

        let outcome = repo.apply_change_set(&changes, Utc::now()).await.unwrap();
        assert_eq!(outcome.preserved, 1);

        let row = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.quantity, 0);
        assert_eq!(row.title, "Favorite");
        assert!(row.is_active);
        assert!(!row.in_stock());
    }

    #[tokio::test]
    async fn test_list_active_filters() {
        let db = db().await;
        let repo = db.listings();
        let now = Utc::now();
        let a = repo.insert(&fetched("1", "A", 100), now).await.unwrap();
        let b = repo.insert(&fetched("2", "B", 100), now).await.unwrap();
        repo.set_category(a, Some("Pokemon")).await.unwrap();
        repo.set_featured(b, true).await.unwrap();

        let all = repo.list_active(&ListingFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, b);
        assert!(all.iter().all(Listing::in_stock));

        let pokemon = repo
            .list_active(&ListingFilter {
                category: Some("Pokemon".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pokemon.len(), 1);
        assert_eq!(pokemon[0].id, a);
    }

    #[tokio::test]
    async fn test_admin_flags_on_missing_listing() {
        let db = db().await;
        let repo = db.listings();
        assert!(matches!(
            repo.toggle_favorite(42).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            repo.set_category(42, Some("x")).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
