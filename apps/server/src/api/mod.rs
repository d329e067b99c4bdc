//! # HTTP Routes
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  public                                                              │
//! │    GET  /health                                                      │
//! │    GET  /api/listings            storefront feed                     │
//! │    POST /track_click             click counter                       │
//! │    GET  /admin/ebay/callback     OAuth redirect (checked by state)   │
//! │                                                                      │
//! │  admin (Bearer token)                                                │
//! │    POST /admin/ebay              action form                         │
//! │    GET  /admin/ebay/status                                           │
//! │    GET  /admin/categories                                            │
//! │    POST /admin/categories                                            │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod admin;
pub mod listings;
pub mod tracking;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::auth::require_admin;
use crate::state::AppState;

/// `{success, message, data?}` body shared by the action endpoints.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        ActionResponse {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

async fn health() -> &'static str {
    "ok"
}

pub fn app_router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/admin/ebay", post(admin::ebay_action))
        .route("/admin/ebay/status", get(admin::ebay_status))
        .route(
            "/admin/categories",
            get(admin::list_categories).post(admin::create_category),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health))
        .route("/api/listings", get(listings::list_listings))
        .route("/track_click", post(tracking::track_click))
        .route("/admin/ebay/callback", get(admin::ebay_callback))
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
