//! Click tracking for storefront "view on eBay" links.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Request, State},
    http::header,
    Form, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::ActionResponse;
use crate::auth::ClientInfo;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use cardshop_core::validation::validate_listing_id;
use cardshop_core::NewClick;

#[derive(Debug, Deserialize)]
pub struct ClickRequest {
    pub listing_id: i64,
}

/// POST /track_click
///
/// Accepts `listing_id` as a form field or a JSON body.
pub async fn track_click(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    req: Request,
) -> ApiResult<Json<ActionResponse>> {
    let is_json = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);

    let ClickRequest { listing_id } = if is_json {
        let Json(body) = Json::<ClickRequest>::from_request(req, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        body
    } else {
        let Form(body) = Form::<ClickRequest>::from_request(req, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        body
    };
    validate_listing_id(listing_id)?;

    let click = NewClick {
        listing_id,
        visitor_ip: client.ip,
        user_agent: client.user_agent,
        referrer: client.referrer,
    };
    let count = state.db.clicks().record_click(&click, Utc::now()).await?;
    debug!(listing_id, count, "Click recorded");

    Ok(Json(
        ActionResponse::ok("Click tracked").with_data(json!({ "click_count": count })),
    ))
}
