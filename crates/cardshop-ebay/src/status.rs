//! # Listing Status Checker
//!
//! Asks eBay about a single listing that dropped out of the fetch result.
//!
//! ```text
//!   Trading GetItem ──ok──► Active / Sold / Ended / NotFound (error 17)
//!        │ err
//!        ▼
//!   Browse get_item_by_legacy_id ──ok──► 404 NotFound / out of stock Sold / Active
//!        │ err
//!        ▼
//!     Unknown   (row is kept)
//! ```

use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::EbayClient;
use crate::error::{EbayError, EbayResult};
use crate::source::browse::Availability;
use crate::xml;
use cardshop_core::UpstreamStatus;

/// Trading API error code for an unknown or inaccessible item.
const ITEM_NOT_FOUND_CODE: &str = "17";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyItem {
    #[serde(default)]
    estimated_availabilities: Vec<Availability>,
}

/// Checks listings one at a time.
#[derive(Debug, Clone)]
pub struct ListingStatusChecker {
    client: EbayClient,
}

impl ListingStatusChecker {
    pub fn new(client: EbayClient) -> Self {
        ListingStatusChecker { client }
    }

    /// Never fails; a check that cannot be completed is `Unknown`.
    pub async fn check(&self, item_id: &str, token: &str) -> UpstreamStatus {
        match self.check_trading(item_id, token).await {
            Ok(status) => {
                debug!(item_id, %status, "GetItem status");
                return status;
            }
            Err(e) => warn!(item_id, error = %e, "GetItem failed, trying Browse"),
        }

        match self.check_browse(item_id, token).await {
            Ok(status) => {
                debug!(item_id, %status, "Browse status");
                status
            }
            Err(e) => {
                warn!(item_id, error = %e, "Status check failed, keeping listing");
                UpstreamStatus::Unknown
            }
        }
    }

    async fn check_trading(&self, item_id: &str, token: &str) -> EbayResult<UpstreamStatus> {
        let body = format!("<ItemID>{}</ItemID>", xml::escape(item_id));
        let response = self.client.trading("GetItem", token, &body).await?;

        if xml::is_failure(&response) {
            if xml::error_codes(&response)
                .iter()
                .any(|code| code == ITEM_NOT_FOUND_CODE)
            {
                return Ok(UpstreamStatus::NotFound);
            }
            return Err(EbayError::Api {
                call: "GetItem".to_string(),
                message: xml::error_message(&response)
                    .unwrap_or_else(|| "Ack Failure".to_string()),
            });
        }

        let listing_status = xml::element(&response, "ListingStatus");
        let quantity = xml::element(&response, "Quantity").and_then(|q| q.parse().ok());
        let sold = xml::element(&response, "QuantitySold").and_then(|q| q.parse().ok());

        interpret_item_status(listing_status.as_deref(), quantity, sold).ok_or_else(|| {
            EbayError::Parse(format!(
                "GetItem {item_id}: unexpected ListingStatus {listing_status:?}"
            ))
        })
    }

    async fn check_browse(&self, item_id: &str, token: &str) -> EbayResult<UpstreamStatus> {
        let item = self
            .client
            .browse_get::<LegacyItem>(
                "item/get_item_by_legacy_id",
                token,
                &[("legacy_item_id", item_id.to_string())],
            )
            .await?;

        Ok(match item {
            None => UpstreamStatus::NotFound,
            Some(item) if item.estimated_availabilities.iter().any(Availability::is_out_of_stock) => {
                UpstreamStatus::Sold
            }
            Some(_) => UpstreamStatus::Active,
        })
    }
}

/// Maps `GetItem` fields to a status; `None` for an unrecognized status.
fn interpret_item_status(
    listing_status: Option<&str>,
    quantity: Option<i64>,
    sold: Option<i64>,
) -> Option<UpstreamStatus> {
    let quantity = quantity.unwrap_or(0);
    let sold = sold.unwrap_or(0);

    match listing_status? {
        "Active" if quantity - sold > 0 => Some(UpstreamStatus::Active),
        "Active" => Some(UpstreamStatus::Sold),
        "Completed" | "Ended" if quantity > 0 && sold >= quantity => Some(UpstreamStatus::Sold),
        "Completed" | "Ended" => Some(UpstreamStatus::Ended),
        _ => None,
    }
}
