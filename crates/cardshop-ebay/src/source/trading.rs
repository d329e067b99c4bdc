//! Trading API `GetSellerList`, the authoritative tier.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, warn};

use super::{FetchRequest, ListingSource, PageLimits};
use crate::client::EbayClient;
use crate::error::{EbayError, EbayResult};
use crate::xml;
use cardshop_core::{FetchedListing, Money, SourceTier, DEFAULT_CURRENCY};

const CALL: &str = "GetSellerList";

/// eBay rejects end-time windows longer than this.
const END_TIME_WINDOW_DAYS: i64 = 120;

pub struct TradingSource {
    client: EbayClient,
    limits: PageLimits,
}

impl TradingSource {
    pub fn new(client: EbayClient, limits: PageLimits) -> Self {
        TradingSource { client, limits }
    }

    fn request_body(&self, seller_id: &str, page: u32) -> String {
        let now = Utc::now();
        let from = now.format("%Y-%m-%dT%H:%M:%S%.3fZ");
        let to = (now + Duration::days(END_TIME_WINDOW_DAYS)).format("%Y-%m-%dT%H:%M:%S%.3fZ");
        format!(
            "<UserID>{seller}</UserID>\
             <EndTimeFrom>{from}</EndTimeFrom>\
             <EndTimeTo>{to}</EndTimeTo>\
             <DetailLevel>ReturnAll</DetailLevel>\
             <Pagination>\
             <EntriesPerPage>{size}</EntriesPerPage>\
             <PageNumber>{page}</PageNumber>\
             </Pagination>",
            seller = xml::escape(seller_id),
            size = self.limits.page_size,
        )
    }
}

#[async_trait]
impl ListingSource for TradingSource {
    fn tier(&self) -> SourceTier {
        SourceTier::Trading
    }

    async fn fetch_seller_listings(
        &self,
        request: &FetchRequest,
    ) -> EbayResult<Vec<FetchedListing>> {
        let mut listings = Vec::new();
        let mut page = 1;

        loop {
            let body = self.request_body(&request.seller_id, page);
            let response = self
                .client
                .trading(CALL, &request.access_token, &body)
                .await?;

            if xml::is_failure(&response) {
                return Err(EbayError::Api {
                    call: CALL.to_string(),
                    message: xml::error_message(&response)
                        .unwrap_or_else(|| "Ack Failure".to_string()),
                });
            }

            let items = xml::elements(&response, "Item");
            let before = listings.len();
            listings.extend(
                items
                    .iter()
                    .filter_map(|item| parse_item(item, &request.seller_id)),
            );
            debug!(
                page,
                items = items.len(),
                kept = listings.len() - before,
                "GetSellerList page"
            );

            let total_pages = xml::element(&response, "TotalNumberOfPages")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(1);
            let has_more = xml::element(&response, "HasMoreItems")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false);

            if !(page < total_pages || has_more) || items.is_empty() {
                break;
            }
            if page >= self.limits.max_pages {
                warn!(page, total_pages, "GetSellerList page limit reached");
                break;
            }
            page += 1;
        }

        Ok(listings)
    }
}

/// Maps one `<Item>` to a listing; `None` for ended or sold-out items.
fn parse_item(item: &str, default_seller: &str) -> Option<FetchedListing> {
    let item_id = xml::element(item, "ItemID").filter(|id| !id.is_empty())?;

    if let Some(status) = xml::element(item, "ListingStatus") {
        if status != "Active" {
            debug!(item_id, status, "Skipping inactive item");
            return None;
        }
    }

    let quantity: i64 = xml::element(item, "Quantity")
        .and_then(|q| q.parse().ok())
        .unwrap_or(1);
    let sold: i64 = xml::element(item, "QuantitySold")
        .and_then(|q| q.parse().ok())
        .unwrap_or(0);
    let remaining = quantity - sold;
    if remaining <= 0 {
        debug!(item_id, "Skipping sold-out item");
        return None;
    }

    let (price_tag, raw_price) = match xml::element(item, "CurrentPrice") {
        Some(p) => ("CurrentPrice", p),
        None => ("StartPrice", xml::element(item, "StartPrice")?),
    };
    let price = match Money::parse_decimal(&raw_price) {
        Ok(money) => money,
        Err(e) => {
            warn!(item_id, raw_price, error = %e, "Skipping item with bad price");
            return None;
        }
    };
    let currency = xml::attribute(item, price_tag, "currencyID")
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let image_url = xml::element(item, "GalleryURL")
        .filter(|u| !u.is_empty())
        .or_else(|| xml::element(item, "PictureURL"))
        .unwrap_or_default();
    let listing_url = xml::element(item, "ViewItemURL")
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| format!("https://www.ebay.com/itm/{item_id}"));
    let seller_id = xml::elements(item, "Seller")
        .first()
        .and_then(|seller| xml::element(seller, "UserID"))
        .unwrap_or_else(|| default_seller.to_string());

    Some(FetchedListing {
        title: xml::element(item, "Title").unwrap_or_default(),
        description: xml::element(item, "Description").unwrap_or_default(),
        price_cents: price.cents(),
        currency,
        quantity: remaining,
        image_url,
        listing_url,
        seller_id,
        item_id,
    })
}
