//! # cardshop-core: Pure Listing Logic
//!
//! Everything the eBay mirror decides without touching the network, the
//! database or the clock lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Card Shop Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              apps/server (axum + clap)                          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   cardshop-ebay: OAuth, Trading/Browse/Finding, sync engine     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cardshop-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │  types   │ │reconcile │ │  token   │ │  money   │          │   │
//! │  │   │ Listing  │ │ diff()   │ │ assess() │ │  Money   │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • NO CLOCK                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                cardshop-db (SQLite repositories)                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Listing, category, click and sync run types
//! - [`money`] - Integer-cent money parsed from eBay decimal strings
//! - [`sku`] - `EBAY-<item id>` derivation
//! - [`token`] - Access token validity gate
//! - [`reconcile`] - Diff fetched listings against the local table
//! - [`validation`] - Admin input checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use cardshop_core::sku::sku_for_item;
//! use cardshop_core::money::Money;
//!
//! assert_eq!(sku_for_item("111"), "EBAY-111");
//! assert_eq!(Money::parse_decimal("12.50").unwrap().cents(), 1250);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod reconcile;
pub mod sku;
pub mod token;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use reconcile::{diff, resolve_missing, ChangeSet, ListingPatch, MissingAction, ReconcileReport};
pub use sku::sku_for_item;
pub use token::{assess_token, TokenState};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Seconds of remaining validity below which an access token is refreshed.
///
/// A token expiring within this window is treated as unusable so a sync
/// that starts now does not lose its token halfway through.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 600;

/// Prefix applied to every eBay item id to form a listing SKU.
pub const SKU_PREFIX: &str = "EBAY-";

/// Default currency when eBay omits one.
pub const DEFAULT_CURRENCY: &str = "USD";
