//! # Error Types
//!
//! Domain-specific error types for cardshop-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cardshop-core errors (this file)                                      │
//! │  ├── CoreError        - Domain failures (bad price, unknown status)    │
//! │  └── ValidationError  - Admin input validation failures                │
//! │                                                                         │
//! │  cardshop-db errors   └── DbError                                      │
//! │  cardshop-ebay errors └── EbayError                                    │
//! │  apps/server          └── ApiError (JSON body + status code)           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EbayError/DbError → ApiError      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A price string from eBay could not be turned into cents.
    ///
    /// ## When This Occurs
    /// - `"12.345"` (more than two fractional digits)
    /// - `"abc"`, `""`
    #[error("Invalid price '{value}': {reason}")]
    InvalidPrice { value: String, reason: String },

    /// A listing status string was not recognised.
    #[error("Unknown listing status: {0}")]
    UnknownStatus(String),

    /// A fetched listing is missing a field every row needs.
    #[error("Fetched listing {item_id} is missing {field}")]
    IncompleteListing { item_id: String, field: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by the admin surface before anything reaches the database.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. non-numeric item id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
