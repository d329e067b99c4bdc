//! # SKU Derivation
//!
//! Every mirrored listing is keyed by `EBAY-<item id>`. The SKU is the
//! identity used to match fetched listings against local rows.

use crate::SKU_PREFIX;

/// Builds the SKU for an eBay item id.
///
/// ```rust
/// use cardshop_core::sku::sku_for_item;
///
/// assert_eq!(sku_for_item("123456789012"), "EBAY-123456789012");
/// assert_eq!(sku_for_item(" 42 "), "EBAY-42");
/// ```
pub fn sku_for_item(item_id: &str) -> String {
    format!("{}{}", SKU_PREFIX, item_id.trim())
}

/// Returns the item id embedded in a SKU, if it has the `EBAY-` prefix.
pub fn item_id_from_sku(sku: &str) -> Option<&str> {
    sku.strip_prefix(SKU_PREFIX).filter(|id| !id.is_empty())
}

/// Normalizes a Browse API item id to the legacy numeric id.
///
/// Browse returns ids like `v1|123456789012|0`; the Trading and Finding APIs
/// use the bare `123456789012`. Ids without the pipe form pass through.
pub fn normalize_item_id(raw: &str) -> &str {
    let raw = raw.trim();
    let mut parts = raw.split('|');
    match (parts.next(), parts.next()) {
        (Some(_), Some(legacy)) if !legacy.is_empty() => legacy,
        _ => raw,
    }
}
