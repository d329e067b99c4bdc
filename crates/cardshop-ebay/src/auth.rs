//! # OAuth Token Manager
//!
//! Keeps a usable user access token in the settings store.
//!
//! ## Token Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        eBay OAuth Token Flow                            │
//! │                                                                         │
//! │  connect_ebay ──► authorization_url(state) ──► seller consents on eBay │
//! │                                                  │                      │
//! │  /admin/ebay/callback?code=… ◄───────────────────┘                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  exchange_code(code)  POST /identity/v1/oauth2/token                    │
//! │       │               grant_type=authorization_code                     │
//! │       ▼                                                                 │
//! │  site_settings: access_token, refresh_token, token_expires_at          │
//! │                                                                         │
//! │  [every sync]                                                          │
//! │  valid_access_token(now)                                               │
//! │       ├── Valid (expires > now + margin) ──► reuse, 0 POSTs            │
//! │       └── otherwise ──► POST grant_type=refresh_token                  │
//! │                           ├── ok ──► persist, 1 POST                    │
//! │                           └── fail ──► wait, POST again (2 POSTs max)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::client::Endpoints;
use crate::config::SyncSettings;
use crate::error::{EbayError, EbayResult};
use crate::settings::EbaySettings;
use cardshop_db::{setting_keys as keys, SettingsRepository};

/// First attempt plus one retry.
const MAX_REFRESH_ATTEMPTS: u32 = 2;

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds.
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// A freshly issued token as persisted to settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Present when eBay rotated (or first issued) the refresh token.
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl TokenGrant {
    fn from_response(resp: TokenResponse, now: DateTime<Utc>) -> Self {
        TokenGrant {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token.filter(|t| !t.is_empty()),
            expires_at: now + ChronoDuration::seconds(resp.expires_in),
        }
    }
}

/// OAuth token manager.
#[derive(Debug, Clone)]
pub struct TokenManager {
    http: reqwest::Client,
    endpoints: Endpoints,
    settings: SettingsRepository,
    margin_secs: i64,
    retry_delay: Duration,
    scope: String,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        endpoints: Endpoints,
        settings: SettingsRepository,
        sync: &SyncSettings,
    ) -> Self {
        TokenManager {
            http,
            endpoints,
            settings,
            margin_secs: sync.token_refresh_margin_secs,
            retry_delay: sync.token_retry_delay(),
            scope: sync.scope(),
        }
    }

    /// Returns an access token that is valid for at least the margin,
    /// refreshing it first when needed.
    pub async fn valid_access_token(
        &self,
        creds: &EbaySettings,
        now: DateTime<Utc>,
    ) -> EbayResult<String> {
        let state = creds.token_state(now, self.margin_secs);
        debug!(?state, "Token gate");

        if state.is_usable() {
            if let Some(token) = &creds.access_token {
                return Ok(token.clone());
            }
        }

        let grant = self.refresh(creds, now).await?;
        Ok(grant.access_token)
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// ## Errors
    /// * `MissingCredentials` / `NotConnected` - nothing was sent
    /// * `TokenRefresh` - both attempts failed
    pub async fn refresh(&self, creds: &EbaySettings, now: DateTime<Utc>) -> EbayResult<TokenGrant> {
        let (client_id, client_secret) = app_credentials(creds)?;
        let refresh_token = creds
            .refresh_token
            .as_deref()
            .ok_or(EbayError::NotConnected)?;

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", self.scope.as_str()),
        ];

        let mut backoff = self.create_backoff();
        let mut attempt = 1;

        let response = loop {
            match self.post_token(client_id, client_secret, &form).await {
                Ok(resp) => break resp,
                Err(e) if attempt < MAX_REFRESH_ATTEMPTS => {
                    let delay = backoff.next_backoff().unwrap_or(self.retry_delay);
                    warn!(attempt, error = %e, ?delay, "Token refresh failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempt, error = %e, "Token refresh failed");
                    return Err(EbayError::TokenRefresh(e.to_string()));
                }
            }
        };

        let grant = TokenGrant::from_response(response, now);
        self.persist(&grant).await?;

        info!(
            expires_at = %grant.expires_at,
            rotated = grant.refresh_token.is_some(),
            "Access token refreshed"
        );
        Ok(grant)
    }

    /// Consent page URL for the "Connect eBay" button.
    pub fn authorization_url(&self, creds: &EbaySettings, state: &str) -> EbayResult<String> {
        let client_id = creds
            .client_id
            .as_deref()
            .ok_or_else(|| EbayError::MissingCredentials("client id".into()))?;
        let ru_name = creds
            .ru_name
            .as_deref()
            .ok_or_else(|| EbayError::MissingCredentials("RuName".into()))?;

        let url = url::Url::parse_with_params(
            &self.endpoints.authorize_url(),
            &[
                ("client_id", client_id),
                ("redirect_uri", ru_name),
                ("response_type", "code"),
                ("scope", self.scope.as_str()),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    /// Trades an authorization code for the first token pair.
    ///
    /// Codes are single use, so there is no retry.
    pub async fn exchange_code(
        &self,
        creds: &EbaySettings,
        code: &str,
        now: DateTime<Utc>,
    ) -> EbayResult<TokenGrant> {
        let (client_id, client_secret) = app_credentials(creds)?;
        let ru_name = creds
            .ru_name
            .as_deref()
            .ok_or_else(|| EbayError::MissingCredentials("RuName".into()))?;

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", ru_name),
        ];

        let response = self.post_token(client_id, client_secret, &form).await?;
        let grant = TokenGrant::from_response(response, now);
        if grant.refresh_token.is_none() {
            return Err(EbayError::Parse(
                "authorization code grant returned no refresh token".into(),
            ));
        }

        self.persist(&grant).await?;
        info!(expires_at = %grant.expires_at, "eBay account connected");
        Ok(grant)
    }

    /// Forgets every stored token.
    pub async fn disconnect(&self) -> EbayResult<()> {
        for key in keys::TOKEN_KEYS {
            self.settings.delete(key).await?;
        }
        info!("eBay account disconnected");
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn post_token(
        &self,
        client_id: &str,
        client_secret: &str,
        form: &[(&str, &str)],
    ) -> EbayResult<TokenResponse> {
        let resp = self
            .http
            .post(self.endpoints.token_url())
            .basic_auth(client_id, Some(client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| EbayError::Transport(format!("token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EbayError::Api {
                call: "oauth2/token".to_string(),
                message: format!("({status}): {body}"),
            });
        }

        resp.json::<TokenResponse>()
            .await
            .map_err(|e| EbayError::Parse(format!("token response: {e}")))
    }

    async fn persist(&self, grant: &TokenGrant) -> EbayResult<()> {
        let mut entries = vec![
            (keys::ACCESS_TOKEN, grant.access_token.clone()),
            (keys::TOKEN_EXPIRES_AT, grant.expires_at.timestamp().to_string()),
        ];
        if let Some(refresh) = &grant.refresh_token {
            entries.push((keys::REFRESH_TOKEN, refresh.clone()));
        }
        self.settings.set_many(&entries).await?;
        Ok(())
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.retry_delay,
            initial_interval: self.retry_delay,
            max_interval: self.retry_delay,
            randomization_factor: 0.0,
            multiplier: 1.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

fn app_credentials(creds: &EbaySettings) -> EbayResult<(&str, &str)> {
    match (creds.client_id.as_deref(), creds.client_secret.as_deref()) {
        (Some(id), Some(secret)) => Ok((id, secret)),
        (None, _) => Err(EbayError::MissingCredentials("client id".into())),
        (_, None) => Err(EbayError::MissingCredentials("client secret".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardshop_db::{Database, DbConfig};
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        server: MockServer,
        db: Database,
        manager: TokenManager,
    }

    async fn setup() -> Fixture {
        let server = MockServer::start().await;
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let endpoints = Endpoints {
            api: server.uri(),
            auth_web: server.uri(),
            finding: server.uri(),
        };
        let sync = SyncSettings {
            token_retry_delay_ms: 10,
            ..Default::default()
        };
        let manager = TokenManager::new(reqwest::Client::new(), endpoints, db.settings(), &sync);
        Fixture { server, db, manager }
    }

    fn creds(access: Option<&str>, expires_at: Option<DateTime<Utc>>) -> EbaySettings {
        EbaySettings {
            client_id: Some("app-id".into()),
            client_secret: Some("app-secret".into()),
            ru_name: Some("Card_Shop-RuName".into()),
            seller_id: Some("cardseller".into()),
            access_token: access.map(String::from),
            refresh_token: Some("refresh-1".into()),
            token_expires_at: expires_at,
            sync_interval_hours: 6,
            ..Default::default()
        }
    }

    fn token_body(access: &str) -> serde_json::Value {
        serde_json::json!({
            "access_token": access,
            "expires_in": 7200,
            "token_type": "User Access Token"
        })
    }

    #[tokio::test]
    async fn test_valid_token_makes_no_request() {
        let fx = setup().await;
        Mock::given(method("POST"))
            .and(path("/identity/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("new")))
            .expect(0)
            .mount(&fx.server)
            .await;

        let now = Utc::now();
        let creds = creds(Some("current"), Some(now + ChronoDuration::seconds(3600)));
        let token = fx.manager.valid_access_token(&creds, now).await.unwrap();
        assert_eq!(token, "current");
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_once() {
        let fx = setup().await;
        Mock::given(method("POST"))
            .and(path("/identity/v1/oauth2/token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh")))
            .expect(1)
            .mount(&fx.server)
            .await;

        let now = Utc::now();
        let creds = creds(Some("old"), Some(now - ChronoDuration::seconds(5)));
        let token = fx.manager.valid_access_token(&creds, now).await.unwrap();
        assert_eq!(token, "fresh");

        let stored = EbaySettings::load(&fx.db.settings()).await.unwrap();
        assert_eq!(stored.access_token.as_deref(), Some("fresh"));
        assert_eq!(
            stored.token_expires_at.unwrap().timestamp(),
            (now + ChronoDuration::seconds(7200)).timestamp()
        );
    }

    #[tokio::test]
    async fn test_expiring_within_margin_refreshes() {
        let fx = setup().await;
        Mock::given(method("POST"))
            .and(path("/identity/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh")))
            .expect(1)
            .mount(&fx.server)
            .await;

        let now = Utc::now();
        let creds = creds(Some("old"), Some(now + ChronoDuration::seconds(300)));
        assert_eq!(fx.manager.valid_access_token(&creds, now).await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_failing_refresh_posts_twice() {
        let fx = setup().await;
        Mock::given(method("POST"))
            .and(path("/identity/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .expect(2)
            .mount(&fx.server)
            .await;

        let now = Utc::now();
        let err = fx
            .manager
            .valid_access_token(&creds(None, None), now)
            .await
            .unwrap_err();
        assert!(matches!(err, EbayError::TokenRefresh(_)));
    }

    #[tokio::test]
    async fn test_not_connected_sends_nothing() {
        let fx = setup().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("x")))
            .expect(0)
            .mount(&fx.server)
            .await;

        let mut creds = creds(None, None);
        creds.refresh_token = None;
        let err = fx
            .manager
            .valid_access_token(&creds, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EbayError::NotConnected));
    }

    #[tokio::test]
    async fn test_exchange_code_and_disconnect() {
        let fx = setup().await;
        Mock::given(method("POST"))
            .and(path("/identity/v1/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "first",
                "expires_in": 7200,
                "refresh_token": "refresh-2",
                "refresh_token_expires_in": 47304000
            })))
            .expect(1)
            .mount(&fx.server)
            .await;

        let mut creds = creds(None, None);
        creds.refresh_token = None;
        let grant = fx
            .manager
            .exchange_code(&creds, "abc123", Utc::now())
            .await
            .unwrap();
        assert_eq!(grant.refresh_token.as_deref(), Some("refresh-2"));

        let stored = EbaySettings::load(&fx.db.settings()).await.unwrap();
        assert!(stored.is_connected());

        fx.manager.disconnect().await.unwrap();
        let stored = EbaySettings::load(&fx.db.settings()).await.unwrap();
        assert!(!stored.is_connected());
        assert!(stored.access_token.is_none());
    }

    #[tokio::test]
    async fn test_authorization_url() {
        let fx = setup().await;
        let url = fx
            .manager
            .authorization_url(&creds(None, None), "state-xyz")
            .unwrap();

        assert!(url.starts_with(&format!("{}/oauth2/authorize?", fx.server.uri())));
        assert!(url.contains("client_id=app-id"));
        assert!(url.contains("redirect_uri=Card_Shop-RuName"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=state-xyz"));
    }
}
