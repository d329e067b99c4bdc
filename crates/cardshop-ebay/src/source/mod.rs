//! # Listing Sources
//!
//! Three eBay APIs can list a seller's active items. They are tried in
//! order and the first one that returns anything wins.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          TieredFetcher                               │
//! │                                                                      │
//! │   TradingSource ──empty/err──► BrowseSource ──empty/err──► Finding   │
//! │   GetSellerList                item_summary/search   findItemsAdv.   │
//! │        │                             │                      │        │
//! │        └──────── non-empty ──────────┴──────────────────────┘        │
//! │                        ▼                                             │
//! │                 FetchResult { tier, listings, failures }             │
//! │                                                                      │
//! │   all empty, none failed  ──► Ok(empty)  (seller has nothing listed) │
//! │   all empty, some failed  ──► Err        (never reconcile on this)   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod browse;
pub mod finding;
pub mod trading;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::client::EbayClient;
use crate::config::SyncSettings;
use crate::error::{EbayError, EbayResult};
use cardshop_core::{FetchedListing, SourceTier};

pub use browse::BrowseSource;
pub use finding::FindingSource;
pub use trading::TradingSource;

/// What a source needs to list a seller's items.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub seller_id: String,
    /// User access token (Trading, Browse).
    pub access_token: String,
    /// Application id (Finding).
    pub client_id: String,
}

/// Paging bounds shared by all sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub page_size: u32,
    pub max_pages: u32,
}

impl PageLimits {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        PageLimits {
            page_size: settings.page_size,
            max_pages: settings.max_pages,
        }
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self::from_settings(&SyncSettings::default())
    }
}

/// One API that can list a seller's active items.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Which tier this source is.
    fn tier(&self) -> SourceTier;

    fn name(&self) -> &'static str {
        self.tier().as_str()
    }

    /// Fetches every active listing of the seller, all pages.
    async fn fetch_seller_listings(&self, request: &FetchRequest)
        -> EbayResult<Vec<FetchedListing>>;
}

/// Outcome of a tiered fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    /// Tier that produced the listings; `None` when all were empty.
    pub tier: Option<SourceTier>,
    pub listings: Vec<FetchedListing>,
    /// Tiers that errored, with the error text.
    pub failures: Vec<(SourceTier, String)>,
}

/// Tries each source in order until one returns listings.
pub struct TieredFetcher {
    sources: Vec<Box<dyn ListingSource>>,
}

impl TieredFetcher {
    pub fn new(sources: Vec<Box<dyn ListingSource>>) -> Self {
        TieredFetcher { sources }
    }

    /// Trading, then Browse, then Finding.
    pub fn standard(client: EbayClient, limits: PageLimits) -> Self {
        Self::new(vec![
            Box::new(TradingSource::new(client.clone(), limits)),
            Box::new(BrowseSource::new(client.clone(), limits)),
            Box::new(FindingSource::new(client, limits)),
        ])
    }

    pub async fn fetch(&self, request: &FetchRequest) -> EbayResult<FetchResult> {
        let mut result = FetchResult::default();

        for source in &self.sources {
            let tier = source.tier();
            debug!(source = source.name(), seller = %request.seller_id, "Fetching listings");

            match source.fetch_seller_listings(request).await {
                Ok(listings) if !listings.is_empty() => {
                    info!(%tier, count = listings.len(), "Fetched seller listings");
                    result.tier = Some(tier);
                    result.listings = listings;
                    return Ok(result);
                }
                Ok(_) => {
                    debug!(%tier, "Source returned no listings");
                }
                Err(e) => {
                    warn!(%tier, error = %e, "Listing source failed");
                    result.failures.push((tier, e.to_string()));
                }
            }
        }

        if result.failures.is_empty() {
            info!(seller = %request.seller_id, "Seller has no active listings");
            return Ok(result);
        }

        let detail = result
            .failures
            .iter()
            .map(|(tier, err)| format!("{tier}: {err}"))
            .collect::<Vec<_>>()
            .join("; ");
        Err(EbayError::Api {
            call: "fetch seller listings".to_string(),
            message: format!("no source returned listings ({detail})"),
        })
    }
}
