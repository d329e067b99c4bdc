//! # Admin Endpoints
//!
//! The eBay admin page posts one form with an `action` field:
//!
//! | action              | effect                                           |
//! |---------------------|--------------------------------------------------|
//! | `sync_listings`     | run a manual sync                                |
//! | `save_api_settings` | store credentials, seller id, interval           |
//! | `refresh_token`     | force an OAuth refresh                           |
//! | `connect_ebay`      | return the consent URL                           |
//! | `disconnect_ebay`   | forget tokens                                    |
//! | `set_category`      | assign (or clear) a listing's category           |
//! | `toggle_favorite`   | flip a listing's favorite flag                   |

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::ActionResponse;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use cardshop_core::validation::{validate_category_name, validate_listing_id};
use cardshop_core::{Category, SyncRun, SyncTrigger};
use cardshop_ebay::settings::parse_bool;
use cardshop_ebay::{ApiSettingsUpdate, ConnectionStatus};

/// Raw admin form. Every field arrives as text and is parsed per action.
#[derive(Debug, Default, Deserialize)]
pub struct AdminForm {
    pub action: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub dev_id: Option<String>,
    pub ru_name: Option<String>,
    pub seller_id: Option<String>,
    pub sandbox: Option<String>,
    pub sync_interval_hours: Option<String>,
    pub listing_id: Option<String>,
    pub category: Option<String>,
}

/// A parsed admin action.
#[derive(Debug)]
pub enum AdminAction {
    SyncListings,
    SaveApiSettings(ApiSettingsUpdate),
    RefreshToken,
    ConnectEbay,
    DisconnectEbay,
    SetCategory {
        listing_id: i64,
        category: Option<String>,
    },
    ToggleFavorite {
        listing_id: i64,
    },
}

impl TryFrom<AdminForm> for AdminAction {
    type Error = ApiError;

    fn try_from(form: AdminForm) -> Result<Self, Self::Error> {
        let action = match form.action.trim() {
            "sync_listings" => AdminAction::SyncListings,
            "save_api_settings" => AdminAction::SaveApiSettings(ApiSettingsUpdate {
                sync_interval_hours: parse_optional_i64(
                    "sync_interval_hours",
                    form.sync_interval_hours.as_deref(),
                )?,
                sandbox: form.sandbox.as_deref().map(parse_bool).unwrap_or(false),
                client_id: form.client_id.unwrap_or_default(),
                client_secret: form.client_secret.unwrap_or_default(),
                dev_id: form.dev_id.unwrap_or_default(),
                ru_name: form.ru_name.unwrap_or_default(),
                seller_id: form.seller_id.unwrap_or_default(),
            }),
            "refresh_token" => AdminAction::RefreshToken,
            "connect_ebay" => AdminAction::ConnectEbay,
            "disconnect_ebay" => AdminAction::DisconnectEbay,
            "set_category" => AdminAction::SetCategory {
                listing_id: require_listing_id(form.listing_id.as_deref())?,
                category: form
                    .category
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty()),
            },
            "toggle_favorite" => AdminAction::ToggleFavorite {
                listing_id: require_listing_id(form.listing_id.as_deref())?,
            },
            other => {
                return Err(ApiError::BadRequest(format!("Unknown action '{other}'")));
            }
        };
        Ok(action)
    }
}

fn parse_optional_i64(field: &str, value: Option<&str>) -> ApiResult<Option<i64>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{field} must be a whole number"))),
    }
}

fn require_listing_id(value: Option<&str>) -> ApiResult<i64> {
    let id = parse_optional_i64("listing_id", value)?
        .ok_or_else(|| ApiError::BadRequest("listing_id is required".to_string()))?;
    validate_listing_id(id)?;
    Ok(id)
}

// =============================================================================
// POST /admin/ebay
// =============================================================================

pub async fn ebay_action(
    State(state): State<Arc<AppState>>,
    Form(form): Form<AdminForm>,
) -> ApiResult<Json<ActionResponse>> {
    let action = AdminAction::try_from(form)?;
    info!(?action, "Admin action");

    let response = match action {
        AdminAction::SyncListings => {
            let outcome = state.engine.run(SyncTrigger::Manual).await;
            ActionResponse {
                success: outcome.success,
                message: outcome.message.clone(),
                data: Some(serde_json::to_value(&outcome).unwrap_or_default()),
            }
        }
        AdminAction::SaveApiSettings(update) => {
            update.save(&state.db.settings()).await?;
            ActionResponse::ok("API settings saved")
        }
        AdminAction::RefreshToken => {
            let grant = state.engine.refresh_token_now().await?;
            ActionResponse::ok(format!(
                "Access token refreshed, valid until {}",
                grant.expires_at.to_rfc3339()
            ))
            .with_data(json!({ "expires_at": grant.expires_at }))
        }
        AdminAction::ConnectEbay => {
            let url = state.engine.begin_connect().await?;
            ActionResponse::ok("Redirect to eBay to grant access")
                .with_data(json!({ "authorization_url": url }))
        }
        AdminAction::DisconnectEbay => {
            state.engine.disconnect().await?;
            ActionResponse::ok("eBay account disconnected")
        }
        AdminAction::SetCategory {
            listing_id,
            category,
        } => {
            if let Some(name) = category.as_deref() {
                validate_category_name(name)?;
                if state.db.categories().get_by_name(name).await?.is_none() {
                    return Err(ApiError::BadRequest(format!("Unknown category '{name}'")));
                }
            }
            state
                .db
                .listings()
                .set_category(listing_id, category.as_deref())
                .await?;
            match category {
                Some(name) => ActionResponse::ok(format!("Category set to {name}")),
                None => ActionResponse::ok("Category cleared"),
            }
        }
        AdminAction::ToggleFavorite { listing_id } => {
            let favorite = state.db.listings().toggle_favorite(listing_id).await?;
            let message = if favorite {
                "Added to favorites"
            } else {
                "Removed from favorites"
            };
            ActionResponse::ok(message).with_data(json!({ "is_favorite": favorite }))
        }
    };

    Ok(Json(response))
}

// =============================================================================
// GET /admin/ebay/status
// =============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connection: ConnectionStatus,
    pub listing_count: i64,
    pub recent_runs: Vec<SyncRun>,
}

pub async fn ebay_status(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatusResponse>> {
    Ok(Json(StatusResponse {
        connection: state.engine.connection_status().await?,
        listing_count: state.db.listings().count().await?,
        recent_runs: state.db.sync_runs().latest(10).await?,
    }))
}

// =============================================================================
// GET /admin/ebay/callback
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// eBay redirects here after consent.
pub async fn ebay_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<Response> {
    if let Some(error) = query.error {
        warn!(%error, "eBay consent declined");
        return Err(ApiError::BadRequest(format!(
            "eBay authorization failed: {}",
            query.error_description.unwrap_or(error)
        )));
    }

    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Err(ApiError::BadRequest(
            "Missing code or state parameter".to_string(),
        ));
    };

    let grant = state.engine.complete_connect(&code, &oauth_state).await?;

    if let Some(public_url) = state.config.server.public_url.as_deref() {
        let target = format!("{}/admin?ebay=connected", public_url.trim_end_matches('/'));
        return Ok(Redirect::to(&target).into_response());
    }

    Ok(Json(
        ActionResponse::ok("eBay account connected")
            .with_data(json!({ "expires_at": grant.expires_at })),
    )
    .into_response())
}

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<String>,
}

pub async fn list_categories(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.db.categories().list().await?))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CategoryForm>,
) -> ApiResult<Json<Category>> {
    let name = form.name.trim();
    validate_category_name(name)?;
    let parent_id = parse_optional_i64("parent_id", form.parent_id.as_deref())?;
    let description = form
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    let category = state
        .db
        .categories()
        .create(name, description, parent_id)
        .await?;
    Ok(Json(category))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(action: &str) -> AdminForm {
        AdminForm {
            action: action.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_simple_actions() {
        assert!(matches!(
            AdminAction::try_from(form("sync_listings")),
            Ok(AdminAction::SyncListings)
        ));
        assert!(matches!(
            AdminAction::try_from(form("disconnect_ebay")),
            Ok(AdminAction::DisconnectEbay)
        ));
        assert!(AdminAction::try_from(form("drop_tables")).is_err());
    }

    #[test]
    fn test_parse_settings_form() {
        let mut f = form("save_api_settings");
        f.client_id = Some("app".into());
        f.sandbox = Some("on".into());
        f.sync_interval_hours = Some("12".into());

        match AdminAction::try_from(f).unwrap() {
            AdminAction::SaveApiSettings(update) => {
                assert_eq!(update.client_id, "app");
                assert!(update.sandbox);
                assert_eq!(update.sync_interval_hours, Some(12));
                assert!(update.client_secret.is_empty());
            }
            other => panic!("unexpected action {other:?}"),
        }

        let mut bad = form("save_api_settings");
        bad.sync_interval_hours = Some("six".into());
        assert!(AdminAction::try_from(bad).is_err());
    }

    #[test]
    fn test_parse_listing_actions() {
        let mut f = form("set_category");
        f.listing_id = Some("42".into());
        f.category = Some("   ".into());
        assert!(matches!(
            AdminAction::try_from(f),
            Ok(AdminAction::SetCategory {
                listing_id: 42,
                category: None
            })
        ));

        assert!(AdminAction::try_from(form("toggle_favorite")).is_err());

        let mut negative = form("toggle_favorite");
        negative.listing_id = Some("-1".into());
        assert!(AdminAction::try_from(negative).is_err());
    }
}
