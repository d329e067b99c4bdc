//! # eBay HTTP Client
//!
//! Thin typed wrapper over `reqwest` for the three eBay API families.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  Trading   POST {api}/ws/api.dll               XML, X-EBAY-API-* hdrs │
//! │  Browse    GET  {api}/buy/browse/v1/...        JSON, Bearer token     │
//! │  OAuth     POST {api}/identity/v1/oauth2/token form, Basic auth       │
//! │  Finding   GET  {finding}/services/search/FindingService/v1   JSON    │
//! │  Consent        {auth_web}/oauth2/authorize    (browser redirect)     │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every request carries the client-wide timeout.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::SyncSettings;
use crate::error::{EbayError, EbayResult};
use crate::xml;

const PRODUCTION_API: &str = "https://api.ebay.com";
const PRODUCTION_AUTH_WEB: &str = "https://auth.ebay.com";
const PRODUCTION_FINDING: &str = "https://svcs.ebay.com";

const SANDBOX_API: &str = "https://api.sandbox.ebay.com";
const SANDBOX_AUTH_WEB: &str = "https://auth.sandbox.ebay.com";
const SANDBOX_FINDING: &str = "https://svcs.sandbox.ebay.com";

// =============================================================================
// Endpoints
// =============================================================================

/// Base URLs for one eBay environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api: String,
    pub auth_web: String,
    pub finding: String,
}

impl Endpoints {
    pub fn production() -> Self {
        Endpoints {
            api: PRODUCTION_API.to_string(),
            auth_web: PRODUCTION_AUTH_WEB.to_string(),
            finding: PRODUCTION_FINDING.to_string(),
        }
    }

    pub fn sandbox() -> Self {
        Endpoints {
            api: SANDBOX_API.to_string(),
            auth_web: SANDBOX_AUTH_WEB.to_string(),
            finding: SANDBOX_FINDING.to_string(),
        }
    }

    pub fn for_environment(sandbox: bool) -> Self {
        if sandbox {
            Self::sandbox()
        } else {
            Self::production()
        }
    }

    pub fn trading_url(&self) -> String {
        format!("{}/ws/api.dll", self.api)
    }

    pub fn token_url(&self) -> String {
        format!("{}/identity/v1/oauth2/token", self.api)
    }

    pub fn browse_url(&self, path: &str) -> String {
        format!("{}/buy/browse/v1/{}", self.api, path.trim_start_matches('/'))
    }

    pub fn finding_url(&self) -> String {
        format!("{}/services/search/FindingService/v1", self.finding)
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/oauth2/authorize", self.auth_web)
    }
}

/// Builds the shared HTTP client.
pub fn build_http_client(timeout: Duration) -> EbayResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(concat!("cardshop/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| EbayError::Config(format!("HTTP client: {e}")))
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for eBay API calls.
#[derive(Debug, Clone)]
pub struct EbayClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    site_id: u32,
    compatibility_level: u32,
    marketplace_id: String,
}

impl EbayClient {
    pub fn new(http: reqwest::Client, endpoints: Endpoints, settings: &SyncSettings) -> Self {
        EbayClient {
            http,
            endpoints,
            site_id: settings.site_id,
            compatibility_level: settings.compatibility_level,
            marketplace_id: settings.marketplace_id.clone(),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Calls a Trading API verb and returns the raw XML body.
    ///
    /// Only HTTP-level failures are errors here; `Ack` handling is left to
    /// the caller since some failures (item not found) are answers.
    pub async fn trading(&self, call_name: &str, token: &str, inner_xml: &str) -> EbayResult<String> {
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
             <{call_name}Request xmlns=\"urn:ebay:apis:eBLBaseComponents\">\
             {inner_xml}\
             </{call_name}Request>"
        );

        debug!(call = call_name, "Trading API request");

        let resp = self
            .http
            .post(self.endpoints.trading_url())
            .header("X-EBAY-API-CALL-NAME", call_name)
            .header("X-EBAY-API-SITEID", self.site_id.to_string())
            .header(
                "X-EBAY-API-COMPATIBILITY-LEVEL",
                self.compatibility_level.to_string(),
            )
            .header("X-EBAY-API-IAF-TOKEN", token)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| EbayError::Transport(format!("{call_name} request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| EbayError::Transport(format!("{call_name} read failed: {e}")))?;
        trace!(call = call_name, %status, body = %text, "Trading API response");

        if !status.is_success() {
            return Err(EbayError::Api {
                call: call_name.to_string(),
                message: format!("HTTP {status}: {}", xml::error_message(&text).unwrap_or(text)),
            });
        }

        Ok(text)
    }

    /// GETs a Browse API resource. Returns `None` on 404.
    pub async fn browse_get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        query: &[(&str, String)],
    ) -> EbayResult<Option<T>> {
        let resp = self
            .http
            .get(self.endpoints.browse_url(path))
            .bearer_auth(token)
            .header("X-EBAY-C-MARKETPLACE-ID", &self.marketplace_id)
            .query(query)
            .send()
            .await
            .map_err(|e| EbayError::Transport(format!("browse {path} request failed: {e}")))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EbayError::Api {
                call: format!("browse {path}"),
                message: format!("({status}): {body}"),
            });
        }

        let text = resp
            .text()
            .await
            .map_err(|e| EbayError::Transport(format!("browse {path} read failed: {e}")))?;
        trace!(path, body = %text, "Browse API response");

        let parsed = serde_json::from_str::<T>(&text)
            .map_err(|e| EbayError::Parse(format!("browse {path}: {e}")))?;
        Ok(Some(parsed))
    }

    /// GETs the Finding API with the given query.
    pub async fn finding_get(&self, query: &[(&str, String)]) -> EbayResult<serde_json::Value> {
        let resp = self
            .http
            .get(self.endpoints.finding_url())
            .query(query)
            .send()
            .await
            .map_err(|e| EbayError::Transport(format!("finding request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EbayError::Api {
                call: "findItemsAdvanced".to_string(),
                message: format!("({status}): {body}"),
            });
        }

        let text = resp
            .text()
            .await
            .map_err(|e| EbayError::Transport(format!("finding read failed: {e}")))?;
        trace!(body = %text, "Finding API response");

        serde_json::from_str(&text).map_err(|e| EbayError::Parse(format!("finding: {e}")))
    }
}
