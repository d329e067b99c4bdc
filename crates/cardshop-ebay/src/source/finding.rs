//! Finding API `findItemsAdvanced`, the legacy last-resort tier.
//!
//! Finding JSON wraps every value in a one-element array
//! (`"itemId": ["123"]`), so responses are walked as `serde_json::Value`.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::{FetchRequest, ListingSource, PageLimits};
use crate::client::EbayClient;
use crate::error::{EbayError, EbayResult};
use cardshop_core::{FetchedListing, Money, SourceTier, DEFAULT_CURRENCY};

const OPERATION: &str = "findItemsAdvanced";
const SERVICE_VERSION: &str = "1.13.0";
/// Finding caps `entriesPerPage` at 100.
const MAX_ENTRIES_PER_PAGE: u32 = 100;

pub struct FindingSource {
    client: EbayClient,
    limits: PageLimits,
}

impl FindingSource {
    pub fn new(client: EbayClient, limits: PageLimits) -> Self {
        FindingSource { client, limits }
    }
}

#[async_trait]
impl ListingSource for FindingSource {
    fn tier(&self) -> SourceTier {
        SourceTier::Finding
    }

    async fn fetch_seller_listings(
        &self,
        request: &FetchRequest,
    ) -> EbayResult<Vec<FetchedListing>> {
        let per_page = self.limits.page_size.min(MAX_ENTRIES_PER_PAGE);
        let mut listings = Vec::new();

        for page in 1..=self.limits.max_pages {
            let query = [
                ("OPERATION-NAME", OPERATION.to_string()),
                ("SERVICE-VERSION", SERVICE_VERSION.to_string()),
                ("SECURITY-APPNAME", request.client_id.clone()),
                ("RESPONSE-DATA-FORMAT", "JSON".to_string()),
                ("REST-PAYLOAD", String::new()),
                ("itemFilter(0).name", "Seller".to_string()),
                ("itemFilter(0).value", request.seller_id.clone()),
                ("paginationInput.entriesPerPage", per_page.to_string()),
                ("paginationInput.pageNumber", page.to_string()),
            ];
            let json = self.client.finding_get(&query).await?;
            let response = first(&json, "findItemsAdvancedResponse").ok_or_else(|| {
                EbayError::Parse("finding: missing findItemsAdvancedResponse".to_string())
            })?;

            if first_str(response, "ack") == Some("Failure") {
                let message = first(response, "errorMessage")
                    .and_then(|m| first(m, "error"))
                    .and_then(|e| first_str(e, "message"))
                    .unwrap_or("Ack Failure");
                return Err(EbayError::Api {
                    call: OPERATION.to_string(),
                    message: message.to_string(),
                });
            }

            let items = first(response, "searchResult")
                .and_then(|r| r.get("item"))
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            listings.extend(
                items
                    .iter()
                    .filter_map(|item| to_listing(item, &request.seller_id)),
            );

            let total_pages: u32 = first(response, "paginationOutput")
                .and_then(|p| first_str(p, "totalPages"))
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            debug!(page, total_pages, items = items.len(), "findItemsAdvanced page");

            if items.is_empty() || page >= total_pages {
                return Ok(listings);
            }
        }

        warn!(max_pages = self.limits.max_pages, "findItemsAdvanced page limit reached");
        Ok(listings)
    }
}

fn to_listing(item: &Value, default_seller: &str) -> Option<FetchedListing> {
    let item_id = first_str(item, "itemId")?.trim().to_string();
    let status = first(item, "sellingStatus");

    let state = status.and_then(|s| first_str(s, "sellingState"));
    if state != Some("Active") {
        debug!(item_id, state, "Skipping inactive item");
        return None;
    }

    let quantity = first_str(item, "quantity")
        .and_then(|q| q.parse::<i64>().ok())
        .unwrap_or(1);
    if quantity <= 0 {
        return None;
    }

    let price = status.and_then(|s| first(s, "currentPrice"))?;
    let raw_price = price.get("__value__").and_then(Value::as_str)?;
    let cents = match Money::parse_decimal(raw_price) {
        Ok(money) => money.cents(),
        Err(e) => {
            warn!(item_id, raw_price, error = %e, "Skipping item with bad price");
            return None;
        }
    };
    let currency = price
        .get("@currencyId")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_CURRENCY);

    Some(FetchedListing {
        title: first_str(item, "title").unwrap_or_default().to_string(),
        description: first_str(item, "subtitle").unwrap_or_default().to_string(),
        price_cents: cents,
        currency: currency.to_string(),
        quantity,
        image_url: first_str(item, "pictureURLLarge")
            .or_else(|| first_str(item, "galleryURL"))
            .unwrap_or_default()
            .to_string(),
        listing_url: first_str(item, "viewItemURL")
            .map(String::from)
            .unwrap_or_else(|| format!("https://www.ebay.com/itm/{item_id}")),
        seller_id: first(item, "sellerInfo")
            .and_then(|s| first_str(s, "sellerUserName"))
            .unwrap_or(default_seller)
            .to_string(),
        item_id,
    })
}

/// `value[key][0]`
fn first<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key)?.as_array()?.first()
}

/// `value[key][0]` as a string.
fn first_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    first(value, key)?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Endpoints;
    use crate::config::SyncSettings;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(id: &str, state: &str) -> Value {
        json!({
            "itemId": [id],
            "title": [format!("Card {id}")],
            "galleryURL": [format!("https://thumbs.ebaystatic.com/{id}.jpg")],
            "viewItemURL": [format!("https://www.ebay.com/itm/{id}")],
            "sellerInfo": [{"sellerUserName": ["cardseller"]}],
            "sellingStatus": [{
                "currentPrice": [{"@currencyId": "USD", "__value__": "3.0"}],
                "sellingState": [state]
            }]
        })
    }

    #[tokio::test]
    async fn test_find_items_by_seller() {
        let server = MockServer::start().await;
        let endpoints = Endpoints {
            api: server.uri(),
            auth_web: server.uri(),
            finding: server.uri(),
        };
        let client = EbayClient::new(reqwest::Client::new(), endpoints, &SyncSettings::default());
        let source = FindingSource::new(client, PageLimits::default());

        Mock::given(method("GET"))
            .and(path("/services/search/FindingService/v1"))
            .and(query_param("OPERATION-NAME", "findItemsAdvanced"))
            .and(query_param("SECURITY-APPNAME", "app"))
            .and(query_param("itemFilter(0).value", "cardseller"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "findItemsAdvancedResponse": [{
                    "ack": ["Success"],
                    "searchResult": [{
                        "@count": "2",
                        "item": [item("111", "Active"), item("112", "EndedWithSales")]
                    }],
                    "paginationOutput": [{"pageNumber": ["1"], "totalPages": ["1"]}]
                }]
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
        assert_eq!(listings[0].item_id, "111");
        assert_eq!(listings[0].price_cents, 300);
        assert_eq!(listings[0].quantity, 1);
    }

    #[test]
    fn test_first_helpers() {
        let value = json!({"ack": ["Success"], "empty": []});
        assert_eq!(first_str(&value, "ack"), Some("Success"));
        assert!(first(&value, "empty").is_none());
        assert!(first(&value, "missing").is_none());
    }
}
