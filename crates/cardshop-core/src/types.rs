//! # Domain Types
//!
//! Types shared by the database layer, the eBay integration and the server.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐    │
//! │  │    Listing       │   │ FetchedListing   │   │  UpstreamStatus  │    │
//! │  │  (local row)     │   │ (from eBay)      │   │  ─────────────   │    │
//! │  │  sku  ◄──────────┼───┼─ sku()           │   │  Active / Sold   │    │
//! │  │  category   ★    │   │  title, price    │   │  Ended / NotFound│    │
//! │  │  is_favorite ★   │   │  quantity, image │   │  Unknown         │    │
//! │  │  click_count ★   │   └──────────────────┘   └──────────────────┘    │
//! │  └──────────────────┘                                                   │
//! │   ★ = locally owned, never written by a sync                           │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐    │
//! │  │    Category      │   │   ClickEvent     │   │    SyncRun       │    │
//! │  └──────────────────┘   └──────────────────┘   └──────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::money::Money;
use crate::sku::sku_for_item;

// =============================================================================
// Listing
// =============================================================================

/// A locally mirrored eBay listing.
///
/// `category`, `is_favorite` and `click_count` belong to the shop owner and
/// to visitors; reconciliation reads them but never writes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Listing {
    /// Row id.
    pub id: i64,

    /// `EBAY-<item id>`, unique.
    pub sku: String,

    /// eBay's legacy numeric item id.
    pub ebay_item_id: String,

    pub title: String,
    pub description: String,

    /// Price in cents.
    pub price_cents: i64,
    pub currency: String,

    /// Quantity still available on eBay.
    pub quantity: i64,

    pub seller_id: String,
    pub image_url: String,
    pub listing_url: String,

    /// Admin-assigned category name.
    pub category: Option<String>,

    /// Admin favorite flag.
    pub is_favorite: bool,

    /// Storefront click counter.
    pub click_count: i64,

    pub is_active: bool,
    pub is_featured: bool,

    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Listing {
    /// Returns the price as [`Money`].
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// True when the shop owner has attached metadata worth keeping.
    ///
    /// A row with user metadata survives its eBay listing ending, with its
    /// quantity zeroed instead of being deleted.
    pub fn has_user_metadata(&self) -> bool {
        let has_category = self
            .category
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false);
        has_category || self.is_favorite
    }

    /// True when the listing can be shown as purchasable.
    pub fn in_stock(&self) -> bool {
        self.is_active && self.quantity > 0
    }
}

// =============================================================================
// Fetched Listing
// =============================================================================

/// One active listing as returned by any of the eBay fetch tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedListing {
    /// Legacy numeric item id (already normalized).
    pub item_id: String,
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    pub currency: String,
    pub quantity: i64,
    pub image_url: String,
    pub listing_url: String,
    pub seller_id: String,
}

impl FetchedListing {
    /// The SKU this listing maps to.
    pub fn sku(&self) -> String {
        sku_for_item(&self.item_id)
    }
}

// =============================================================================
// Upstream Status
// =============================================================================

/// Status of a single listing on eBay, as seen by the status checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamStatus {
    /// Still listed with stock.
    Active,
    /// All units sold.
    Sold,
    /// Ended by the seller or by eBay.
    Ended,
    /// eBay no longer knows the item.
    NotFound,
    /// The check itself failed.
    Unknown,
}

impl UpstreamStatus {
    /// True for statuses that mean the listing is no longer for sale.
    ///
    /// `Unknown` is deliberately not gone: a failed check never removes data.
    pub fn is_gone(&self) -> bool {
        matches!(
            self,
            UpstreamStatus::Sold | UpstreamStatus::Ended | UpstreamStatus::NotFound
        )
    }
}

impl fmt::Display for UpstreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpstreamStatus::Active => "active",
            UpstreamStatus::Sold => "sold",
            UpstreamStatus::Ended => "ended",
            UpstreamStatus::NotFound => "not_found",
            UpstreamStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Fetch Tier
// =============================================================================

/// Which eBay API produced a fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTier {
    /// Trading API `GetSellerList` (XML, authoritative).
    Trading,
    /// Browse API `item_summary/search` (REST).
    Browse,
    /// Finding API `findItemsAdvanced` (legacy JSON).
    Finding,
}

impl SourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTier::Trading => "trading",
            SourceTier::Browse => "browse",
            SourceTier::Finding => "finding",
        }
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Category
// =============================================================================

/// Admin-defined listing category.
///
/// `parent_id` allows a hierarchy but nothing enforces or walks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Click Events
// =============================================================================

/// One recorded storefront click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ClickEvent {
    pub id: i64,
    pub listing_id: i64,
    pub visitor_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub click_date: DateTime<Utc>,
}

/// Request data captured for a click.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClick {
    pub listing_id: i64,
    pub visitor_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

// =============================================================================
// Sync Runs
// =============================================================================

/// What started a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum SyncTrigger {
    /// Admin pressed "sync now".
    Manual,
    /// Background scheduler.
    Scheduled,
    /// `cardshop sync` from cron or a shell.
    Cli,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::Manual => "manual",
            SyncTrigger::Scheduled => "scheduled",
            SyncTrigger::Cli => "cli",
        }
    }
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncTrigger {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(SyncTrigger::Manual),
            "scheduled" => Ok(SyncTrigger::Scheduled),
            "cli" => Ok(SyncTrigger::Cli),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// Lifecycle of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum SyncRunStatus {
    Running,
    Completed,
    Failed,
}

/// A recorded sync run with its counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SyncRun {
    /// UUID v4.
    pub id: String,
    pub trigger: SyncTrigger,
    pub status: SyncRunStatus,
    /// Tier that produced the listings (`trading`, `browse`, `finding`).
    pub source: Option<String>,
    pub fetched: i64,
    pub inserted: i64,
    pub updated: i64,
    pub unchanged: i64,
    pub preserved: i64,
    pub removed: i64,
    pub kept: i64,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Listing Queries
// =============================================================================

/// Filter for storefront listing queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilter {
    /// Only listings in this category.
    pub category: Option<String>,
    /// Only featured listings.
    #[serde(default)]
    pub featured_only: bool,
    /// Only favorites.
    #[serde(default)]
    pub favorites_only: bool,
    /// Maximum rows.
    pub limit: u32,
}

impl Default for ListingFilter {
    fn default() -> Self {
        ListingFilter {
            category: None,
            featured_only: false,
            favorites_only: false,
            limit: 100,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Listing {
        let now = Utc::now();
        Listing {
            id: 1,
            sku: "EBAY-1".to_string(),
            ebay_item_id: "1".to_string(),
            title: "Charizard".to_string(),
            description: String::new(),
            price_cents: 1000,
            currency: "USD".to_string(),
            quantity: 1,
            seller_id: "seller".to_string(),
            image_url: String::new(),
            listing_url: String::new(),
            category: None,
            is_favorite: false,
            click_count: 0,
            is_active: true,
            is_featured: false,
            created_at: now,
            last_updated: now,
        }
    }

    #[test]
    fn test_user_metadata_detection() {
        let mut row = listing();
        assert!(!row.has_user_metadata());

        row.category = Some("   ".to_string());
        assert!(!row.has_user_metadata());

        row.category = Some("Pokemon".to_string());
        assert!(row.has_user_metadata());

        row.category = None;
        row.is_favorite = true;
        assert!(row.has_user_metadata());
    }

    #[test]
    fn test_gone_statuses() {
        assert!(UpstreamStatus::Sold.is_gone());
        assert!(UpstreamStatus::Ended.is_gone());
        assert!(UpstreamStatus::NotFound.is_gone());
        assert!(!UpstreamStatus::Active.is_gone());
        assert!(!UpstreamStatus::Unknown.is_gone());
    }

    #[test]
    fn test_fetched_sku() {
        let fetched = FetchedListing {
            item_id: "222".to_string(),
            title: String::new(),
            description: String::new(),
            price_cents: 0,
            currency: "USD".to_string(),
            quantity: 1,
            image_url: String::new(),
            listing_url: String::new(),
            seller_id: String::new(),
        };
        assert_eq!(fetched.sku(), "EBAY-222");
    }

    #[test]
    fn test_trigger_parsing() {
        assert_eq!("manual".parse::<SyncTrigger>().unwrap(), SyncTrigger::Manual);
        assert_eq!("CLI".parse::<SyncTrigger>().unwrap(), SyncTrigger::Cli);
        assert!("cron".parse::<SyncTrigger>().is_err());
    }
}
