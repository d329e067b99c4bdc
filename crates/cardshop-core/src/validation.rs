//! # Validation Module
//!
//! Checks for admin input before it reaches the database.
//!
//! ```text
//!   POST /admin/ebay (action=set_category)
//!        │
//!        ▼
//!   validate_listing_id / validate_category_name   ← THIS MODULE
//!        │
//!        ▼
//!   SQLite constraints (UNIQUE name, FK listing_id)
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum category name length.
pub const MAX_CATEGORY_NAME_LEN: usize = 100;

/// Sync interval bounds, in hours.
pub const MIN_SYNC_INTERVAL_HOURS: i64 = 1;
pub const MAX_SYNC_INTERVAL_HOURS: i64 = 168;

/// Validates a category name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 100 characters
///
/// ```rust
/// use cardshop_core::validation::validate_category_name;
///
/// assert!(validate_category_name("Pokemon").is_ok());
/// assert!(validate_category_name("  ").is_err());
/// ```
pub fn validate_category_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "category".to_string(),
        });
    }

    if name.chars().count() > MAX_CATEGORY_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "category".to_string(),
            max: MAX_CATEGORY_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a listing id from a form or JSON body.
pub fn validate_listing_id(id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "listing_id".to_string(),
        });
    }
    Ok(())
}

/// Validates an eBay seller user id.
pub fn validate_seller_id(seller_id: &str) -> ValidationResult<()> {
    let seller_id = seller_id.trim();
    if seller_id.is_empty() {
        return Err(ValidationError::Required {
            field: "seller_id".to_string(),
        });
    }
    if seller_id.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "seller_id".to_string(),
            reason: "must not contain spaces".to_string(),
        });
    }
    Ok(())
}

/// Validates the automatic sync interval.
pub fn validate_sync_interval_hours(hours: i64) -> ValidationResult<()> {
    if !(MIN_SYNC_INTERVAL_HOURS..=MAX_SYNC_INTERVAL_HOURS).contains(&hours) {
        return Err(ValidationError::OutOfRange {
            field: "sync_interval_hours".to_string(),
            min: MIN_SYNC_INTERVAL_HOURS,
            max: MAX_SYNC_INTERVAL_HOURS,
        });
    }
    Ok(())
}

/// Validates a legacy eBay item id (digits only).
pub fn validate_item_id(item_id: &str) -> ValidationResult<()> {
    let item_id = item_id.trim();
    if item_id.is_empty() {
        return Err(ValidationError::Required {
            field: "item_id".to_string(),
        });
    }
    if !item_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "item_id".to_string(),
            reason: "must contain only digits".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_name() {
        assert!(validate_category_name("Sports Cards").is_ok());
        assert!(validate_category_name("").is_err());
        assert!(validate_category_name(&"x".repeat(101)).is_err());
        assert!(validate_category_name(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn test_listing_id() {
        assert!(validate_listing_id(1).is_ok());
        assert!(validate_listing_id(0).is_err());
        assert!(validate_listing_id(-3).is_err());
    }

    #[test]
    fn test_seller_id() {
        assert!(validate_seller_id("card_shop_99").is_ok());
        assert!(validate_seller_id("").is_err());
        assert!(validate_seller_id("two words").is_err());
    }

    #[test]
    fn test_sync_interval() {
        assert!(validate_sync_interval_hours(24).is_ok());
        assert!(validate_sync_interval_hours(0).is_err());
        assert!(validate_sync_interval_hours(169).is_err());
    }

    #[test]
    fn test_item_id() {
        assert!(validate_item_id("123456789012").is_ok());
        assert!(validate_item_id("v1|1|0").is_err());
        assert!(validate_item_id("").is_err());
    }
}
