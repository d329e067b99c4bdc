//! Storefront listing feed.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;
use cardshop_core::{Listing, ListingFilter};

const MAX_LIMIT: u32 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ListingsQuery {
    pub category: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub favorites: bool,
    pub limit: Option<u32>,
}

impl ListingsQuery {
    fn to_filter(&self) -> ListingFilter {
        let defaults = ListingFilter::default();
        ListingFilter {
            category: self
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from),
            featured_only: self.featured,
            favorites_only: self.favorites,
            limit: self.limit.unwrap_or(defaults.limit).clamp(1, MAX_LIMIT),
        }
    }
}

/// A listing plus its display price.
#[derive(Debug, Serialize)]
pub struct ListingView {
    #[serde(flatten)]
    pub listing: Listing,
    pub price: String,
}

impl From<Listing> for ListingView {
    fn from(listing: Listing) -> Self {
        ListingView {
            price: listing.price().to_string(),
            listing,
        }
    }
}

/// GET /api/listings
pub async fn list_listings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListingsQuery>,
) -> ApiResult<Json<Vec<ListingView>>> {
    let listings = state.db.listings().list_active(&query.to_filter()).await?;
    Ok(Json(listings.into_iter().map(ListingView::from).collect()))
}
