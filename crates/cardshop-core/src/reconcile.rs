//! # Listing Reconciliation
//!
//! Pure diff between the local listing table and what eBay currently shows.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Reconciliation Pipeline                             │
//! │                                                                         │
//! │  existing: HashMap<sku, Listing>      fetched: Vec<FetchedListing>      │
//! │                 │                               │                       │
//! │                 └──────────────┬────────────────┘                       │
//! │                                ▼                                        │
//! │                          diff(existing, fetched)                        │
//! │                                │                                        │
//! │        ┌───────────────┬───────┴───────┬────────────────┐               │
//! │        ▼               ▼               ▼                ▼               │
//! │     inserts         updates        unchanged         missing            │
//! │   (new SKUs)   (changed fields)    (counter)    (not fetched)           │
//! │                                                         │               │
//! │                                 status check (I/O, in cardshop-ebay)   │
//! │                                                         │               │
//! │                                                         ▼               │
//! │                                   resolve_missing(row, status)          │
//! │                                   ├── gone + metadata ──► Preserve      │
//! │                                   ├── gone, no metadata ► Delete        │
//! │                                   └── active / unknown ─► Keep          │
//! │                                                                         │
//! │  The resulting ChangeSet is applied by cardshop-db in one transaction. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only `title`, `price_cents`, `quantity`, `image_url` and `description`
//! are compared. `category`, `is_favorite` and `click_count` are never part
//! of a patch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{FetchedListing, Listing, SourceTier, UpstreamStatus};

// =============================================================================
// Patch
// =============================================================================

/// Changed columns for one existing listing. `None` means unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPatch {
    pub id: i64,
    pub sku: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub quantity: Option<i64>,
    pub image_url: Option<String>,
}

impl ListingPatch {
    /// Compares a stored row with its fetched counterpart.
    ///
    /// Returns `None` when every compared field is equal.
    pub fn between(existing: &Listing, fetched: &FetchedListing) -> Option<Self> {
        let mut patch = ListingPatch {
            id: existing.id,
            sku: existing.sku.clone(),
            ..Default::default()
        };

        if existing.title != fetched.title {
            patch.title = Some(fetched.title.clone());
        }
        if existing.description != fetched.description {
            patch.description = Some(fetched.description.clone());
        }
        if existing.price_cents != fetched.price_cents {
            patch.price_cents = Some(fetched.price_cents);
        }
        if existing.quantity != fetched.quantity {
            patch.quantity = Some(fetched.quantity);
        }
        if existing.image_url != fetched.image_url {
            patch.image_url = Some(fetched.image_url.clone());
        }

        if patch.is_empty() {
            None
        } else {
            Some(patch)
        }
    }

    /// True when no column changed.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price_cents.is_none()
            && self.quantity.is_none()
            && self.image_url.is_none()
    }

    /// Column names touched by this patch, for logging.
    pub fn changed_columns(&self) -> Vec<&'static str> {
        let mut columns = Vec::new();
        if self.title.is_some() {
            columns.push("title");
        }
        if self.description.is_some() {
            columns.push("description");
        }
        if self.price_cents.is_some() {
            columns.push("price_cents");
        }
        if self.quantity.is_some() {
            columns.push("quantity");
        }
        if self.image_url.is_some() {
            columns.push("image_url");
        }
        columns
    }
}

// =============================================================================
// Missing Rows
// =============================================================================

/// What happens to a local row that eBay no longer returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingAction {
    /// Listing is gone but the row carries user metadata: zero the quantity.
    Preserve,
    /// Listing is gone and nothing local is attached: delete the row.
    Delete,
    /// Still active, or the status check failed: leave the row alone.
    Keep,
}

/// Decides the fate of a row that was not in the fetch result.
pub fn resolve_missing(row: &Listing, status: UpstreamStatus) -> MissingAction {
    if !status.is_gone() {
        return MissingAction::Keep;
    }
    if row.has_user_metadata() {
        MissingAction::Preserve
    } else {
        MissingAction::Delete
    }
}

// =============================================================================
// Change Set
// =============================================================================

/// Every write a sync run will perform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Fetched listings with no local row.
    pub inserts: Vec<FetchedListing>,
    /// Column-level changes for existing rows.
    pub updates: Vec<ListingPatch>,
    /// Existing rows whose compared fields all matched.
    pub unchanged: usize,
    /// Local rows that were not fetched and still need a status check.
    pub missing: Vec<Listing>,
    /// Row ids whose quantity is set to 0.
    pub preserve: Vec<i64>,
    /// Row ids to delete.
    pub delete: Vec<i64>,
    /// Missing rows left untouched.
    pub kept: usize,
}

impl ChangeSet {
    /// Records the status-check outcome for one missing row.
    pub fn record_missing(&mut self, row: &Listing, status: UpstreamStatus) -> MissingAction {
        let action = resolve_missing(row, status);
        match action {
            MissingAction::Preserve => self.preserve.push(row.id),
            MissingAction::Delete => self.delete.push(row.id),
            MissingAction::Keep => self.kept += 1,
        }
        action
    }

    /// True when applying this set writes anything.
    pub fn has_writes(&self) -> bool {
        !self.inserts.is_empty()
            || !self.updates.is_empty()
            || !self.preserve.is_empty()
            || !self.delete.is_empty()
    }

    /// Summarizes the set as counters.
    pub fn report(&self, fetched: usize, source: Option<SourceTier>) -> ReconcileReport {
        ReconcileReport {
            source,
            fetched,
            inserted: self.inserts.len(),
            updated: self.updates.len(),
            unchanged: self.unchanged,
            preserved: self.preserve.len(),
            removed: self.delete.len(),
            kept: self.kept,
        }
    }
}

/// Counters reported back to the admin and stored with the sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub source: Option<SourceTier>,
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub preserved: usize,
    pub removed: usize,
    pub kept: usize,
}

impl ReconcileReport {
    /// One-line summary for flash messages and logs.
    pub fn summary(&self) -> String {
        format!(
            "Fetched {} listings: {} new, {} updated, {} unchanged, {} preserved, {} removed",
            self.fetched, self.inserted, self.updated, self.unchanged, self.preserved, self.removed
        )
    }
}

// =============================================================================
// Diff
// =============================================================================

/// Diffs fetched listings against the existing rows keyed by SKU.
///
/// When the same SKU is fetched twice the last occurrence wins. Missing rows
/// are returned sorted by SKU so status checks run in a stable order.
pub fn diff(existing: &HashMap<String, Listing>, fetched: &[FetchedListing]) -> ChangeSet {
    let mut last_index: HashMap<String, usize> = HashMap::with_capacity(fetched.len());
    for (idx, listing) in fetched.iter().enumerate() {
        last_index.insert(listing.sku(), idx);
    }

    let mut changes = ChangeSet::default();

    for (idx, listing) in fetched.iter().enumerate() {
        let sku = listing.sku();
        if last_index.get(&sku) != Some(&idx) {
            continue;
        }

        match existing.get(&sku) {
            None => changes.inserts.push(listing.clone()),
            Some(row) => match ListingPatch::between(row, listing) {
                Some(patch) => changes.updates.push(patch),
                None => changes.unchanged += 1,
            },
        }
    }

    let mut missing: Vec<Listing> = existing
        .iter()
        .filter(|(sku, _)| !last_index.contains_key(*sku))
        .map(|(_, row)| row.clone())
        .collect();
    missing.sort_by(|a, b| a.sku.cmp(&b.sku));
    changes.missing = missing;

    changes
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(id: i64, item_id: &str, title: &str, price_cents: i64) -> Listing {
        let now = Utc::now();
        Listing {
            id,
            sku: format!("EBAY-{item_id}"),
            ebay_item_id: item_id.to_string(),
            title: title.to_string(),
            description: "desc".to_string(),
            price_cents,
            currency: "USD".to_string(),
            quantity: 1,
            seller_id: "cardseller".to_string(),
            image_url: "https://i.ebayimg.com/a.jpg".to_string(),
            listing_url: format!("https://www.ebay.com/itm/{item_id}"),
            category: None,
            is_favorite: false,
            click_count: 0,
            is_active: true,
            is_featured: false,
            created_at: now,
            last_updated: now,
        }
    }

    fn fetched_from(row: &Listing) -> FetchedListing {
        FetchedListing {
            item_id: row.ebay_item_id.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            price_cents: row.price_cents,
            currency: row.currency.clone(),
            quantity: row.quantity,
            image_url: row.image_url.clone(),
            listing_url: row.listing_url.clone(),
            seller_id: row.seller_id.clone(),
        }
    }

    fn index(rows: Vec<Listing>) -> HashMap<String, Listing> {
        rows.into_iter().map(|r| (r.sku.clone(), r)).collect()
    }

    #[test]
    fn test_identical_fields_are_unchanged() {
        let existing = row(1, "111", "Pikachu", 500);
        let fetched = vec![fetched_from(&existing)];
        let changes = diff(&index(vec![existing]), &fetched);

        assert!(changes.updates.is_empty());
        assert!(changes.inserts.is_empty());
        assert!(changes.missing.is_empty());
        assert_eq!(changes.unchanged, 1);
        assert!(!changes.has_writes());
    }

    #[test]
    fn test_price_change_touches_only_price() {
        let existing = row(1, "111", "Pikachu", 500);
        let mut fetched = fetched_from(&existing);
        fetched.price_cents = 650;

        let changes = diff(&index(vec![existing]), &[fetched]);
        assert_eq!(changes.updates.len(), 1);

        let patch = &changes.updates[0];
        assert_eq!(patch.price_cents, Some(650));
        assert_eq!(patch.changed_columns(), vec!["price_cents"]);
    }

    #[test]
    fn test_new_sku_is_inserted() {
        let fetched = fetched_from(&row(0, "999", "Mew", 2500));
        let changes = diff(&HashMap::new(), &[fetched]);
        assert_eq!(changes.inserts.len(), 1);
        assert_eq!(changes.inserts[0].sku(), "EBAY-999");
    }

    #[test]
    fn test_duplicate_fetch_last_wins() {
        let existing = row(1, "111", "Pikachu", 500);
        let mut first = fetched_from(&existing);
        first.price_cents = 600;
        let mut second = fetched_from(&existing);
        second.price_cents = 700;

        let changes = diff(&index(vec![existing]), &[first, second]);
        assert_eq!(changes.updates.len(), 1);
        assert_eq!(changes.updates[0].price_cents, Some(700));
    }

    #[test]
    fn test_missing_rows_sorted() {
        let rows = vec![row(2, "300", "C", 1), row(1, "100", "A", 1), row(3, "200", "B", 1)];
        let changes = diff(&index(rows), &[]);
        let skus: Vec<_> = changes.missing.iter().map(|r| r.sku.as_str()).collect();
        assert_eq!(skus, vec!["EBAY-100", "EBAY-200", "EBAY-300"]);
    }

    #[test]
    fn test_resolve_missing_matrix() {
        let plain = row(1, "1", "A", 1);
        let mut categorized = row(2, "2", "B", 1);
        categorized.category = Some("Pokemon".to_string());
        let mut favorite = row(3, "3", "C", 1);
        favorite.is_favorite = true;

        assert_eq!(resolve_missing(&plain, UpstreamStatus::Sold), MissingAction::Delete);
        assert_eq!(resolve_missing(&plain, UpstreamStatus::NotFound), MissingAction::Delete);
        assert_eq!(resolve_missing(&categorized, UpstreamStatus::Ended), MissingAction::Preserve);
        assert_eq!(resolve_missing(&favorite, UpstreamStatus::Sold), MissingAction::Preserve);
        assert_eq!(resolve_missing(&plain, UpstreamStatus::Active), MissingAction::Keep);
        assert_eq!(resolve_missing(&plain, UpstreamStatus::Unknown), MissingAction::Keep);
    }

    #[test]
    fn test_end_to_end_example() {
        // EBAY-111 changes title and price; EBAY-222 sold with no metadata.
        let mut kept = row(1, "111", "Old", 1000);
        kept.category = Some("Pokemon".to_string());
        kept.is_favorite = true;
        let gone = row(2, "222", "Gone", 500);

        let mut fetched = fetched_from(&kept);
        fetched.title = "New".to_string();
        fetched.price_cents = 1200;

        let mut changes = diff(&index(vec![kept, gone.clone()]), &[fetched]);
        assert_eq!(changes.missing.len(), 1);

        let action = changes.record_missing(&gone, UpstreamStatus::Sold);
        assert_eq!(action, MissingAction::Delete);

        let report = changes.report(1, Some(SourceTier::Trading));
        assert_eq!(report.updated, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(report.inserted, 0);
        assert_eq!(changes.updates[0].changed_columns(), vec!["title", "price_cents"]);
    }
}
