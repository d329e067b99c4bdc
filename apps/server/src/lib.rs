//! # Card Shop Server
//!
//! HTTP surface for the storefront and the eBay admin page, shared by the
//! `cardshop` binary and the integration tests.

pub mod api;
pub mod auth;
pub mod error;
pub mod state;

pub use api::app_router;
pub use error::{ApiError, ApiResult};
pub use state::{build_state, from_parts, open_database, AppState};
