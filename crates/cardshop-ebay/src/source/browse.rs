//! Browse API `item_summary/search` filtered to one seller.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{FetchRequest, ListingSource, PageLimits};
use crate::client::EbayClient;
use crate::error::EbayResult;
use cardshop_core::sku::normalize_item_id;
use cardshop_core::{FetchedListing, Money, SourceTier, DEFAULT_CURRENCY};

const SEARCH_PATH: &str = "item_summary/search";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    item_summaries: Vec<ItemSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemSummary {
    item_id: String,
    #[serde(default)]
    legacy_item_id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    short_description: Option<String>,
    #[serde(default)]
    price: Option<Amount>,
    #[serde(default)]
    image: Option<Image>,
    #[serde(default)]
    item_web_url: Option<String>,
    #[serde(default)]
    seller: Option<Seller>,
    #[serde(default)]
    buying_options: Vec<String>,
    #[serde(default)]
    estimated_availabilities: Vec<Availability>,
}

#[derive(Debug, Deserialize)]
struct Amount {
    value: String,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Image {
    image_url: String,
}

#[derive(Debug, Deserialize)]
struct Seller {
    username: String,
}

/// `estimatedAvailabilities[]` entry, shared with the status checker.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Availability {
    #[serde(default)]
    pub estimated_available_quantity: Option<i64>,
    #[serde(default)]
    pub estimated_availability_status: Option<String>,
}

impl Availability {
    pub(crate) fn is_out_of_stock(&self) -> bool {
        self.estimated_available_quantity == Some(0)
            || self.estimated_availability_status.as_deref() == Some("OUT_OF_STOCK")
    }
}

pub struct BrowseSource {
    client: EbayClient,
    limits: PageLimits,
}

impl BrowseSource {
    pub fn new(client: EbayClient, limits: PageLimits) -> Self {
        BrowseSource { client, limits }
    }
}

#[async_trait]
impl ListingSource for BrowseSource {
    fn tier(&self) -> SourceTier {
        SourceTier::Browse
    }

    async fn fetch_seller_listings(
        &self,
        request: &FetchRequest,
    ) -> EbayResult<Vec<FetchedListing>> {
        let mut listings = Vec::new();
        let limit = u64::from(self.limits.page_size);
        let mut offset: u64 = 0;

        for page in 1..=self.limits.max_pages {
            let query = [
                ("q", format!("seller:{}", request.seller_id)),
                ("filter", format!("sellers:{{{}}}", request.seller_id)),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ];
            let Some(response) = self
                .client
                .browse_get::<SearchResponse>(SEARCH_PATH, &request.access_token, &query)
                .await?
            else {
                break;
            };

            let count = response.item_summaries.len();
            listings.extend(
                response
                    .item_summaries
                    .into_iter()
                    .filter_map(|item| to_listing(item, &request.seller_id)),
            );
            debug!(page, offset, items = count, total = response.total, "Browse search page");

            offset += limit;
            if count == 0 || response.next.is_none() || offset >= response.total {
                return Ok(listings);
            }
        }

        warn!(max_pages = self.limits.max_pages, "Browse search page limit reached");
        Ok(listings)
    }
}

fn to_listing(item: ItemSummary, default_seller: &str) -> Option<FetchedListing> {
    let item_id = item
        .legacy_item_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| normalize_item_id(&item.item_id).to_string());

    if item.buying_options.is_empty() {
        debug!(item_id, "Skipping item without buying options");
        return None;
    }
    let availability = item.estimated_availabilities.first().cloned().unwrap_or_default();
    if availability.is_out_of_stock() {
        debug!(item_id, "Skipping out-of-stock item");
        return None;
    }

    let price = item.price?;
    let cents = match Money::parse_decimal(&price.value) {
        Ok(money) => money.cents(),
        Err(e) => {
            warn!(item_id, value = price.value, error = %e, "Skipping item with bad price");
            return None;
        }
    };

    Some(FetchedListing {
        listing_url: item
            .item_web_url
            .unwrap_or_else(|| format!("https://www.ebay.com/itm/{item_id}")),
        title: item.title,
        description: item.short_description.unwrap_or_default(),
        price_cents: cents,
        currency: price
            .currency
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        quantity: availability.estimated_available_quantity.unwrap_or(1),
        image_url: item.image.map(|i| i.image_url).unwrap_or_default(),
        seller_id: item
            .seller
            .map(|s| s.username)
            .unwrap_or_else(|| default_seller.to_string()),
        item_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Endpoints;
    use crate::config::SyncSettings;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn summary(id: &str, qty: i64, buying: &[&str]) -> serde_json::Value {
        json!({
            "itemId": format!("v1|{id}|0"),
            "title": format!("Card {id}"),
            "price": {"value": "7.99", "currency": "USD"},
            "image": {"imageUrl": format!("https://i.ebayimg.com/{id}.jpg")},
            "itemWebUrl": format!("https://www.ebay.com/itm/{id}"),
            "seller": {"username": "cardseller"},
            "buyingOptions": buying,
            "estimatedAvailabilities": [{"estimatedAvailableQuantity": qty}]
        })
    }

    #[tokio::test]
    async fn test_search_filters_and_pages() {
        let server = MockServer::start().await;
        let endpoints = Endpoints {
            api: server.uri(),
            auth_web: server.uri(),
            finding: server.uri(),
        };
        let client = EbayClient::new(reqwest::Client::new(), endpoints, &SyncSettings::default());
        let source = BrowseSource::new(
            client,
            PageLimits {
                page_size: 2,
                max_pages: 10,
            },
        );

        Mock::given(method("GET"))
            .and(path("/buy/browse/v1/item_summary/search"))
            .and(query_param("filter", "sellers:{cardseller}"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 3,
                "next": "https://api.ebay.com/next",
                "itemSummaries": [summary("111", 2, &["FIXED_PRICE"]), summary("112", 0, &["FIXED_PRICE"])]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/buy/browse/v1/item_summary/search"))
            .and(query_param("offset", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 3,
                "itemSummaries": [summary("113", 1, &[])]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = FetchRequest {
            seller_id: "cardseller".into(),
            access_token: "tok".into(),
            client_id: "app".into(),
        };
        let listings = source.fetch_seller_listings(&request).await.unwrap();

        assert_eq!(listings.len(), 1);
        let card = &listings[0];
        assert_eq!(card.item_id, "111");
        assert_eq!(card.price_cents, 799);
        assert_eq!(card.quantity, 2);
        assert_eq!(card.sku(), "EBAY-111");
    }

    #[test]
    fn test_availability_out_of_stock() {
        let by_qty = Availability {
            estimated_available_quantity: Some(0),
            estimated_availability_status: None,
        };
        let by_status = Availability {
            estimated_available_quantity: None,
            estimated_availability_status: Some("OUT_OF_STOCK".into()),
        };
        assert!(by_qty.is_out_of_stock());
        assert!(by_status.is_out_of_stock());
        assert!(!Availability::default().is_out_of_stock());
    }
}
