//! # Sync Engine
//!
//! One full mirror pass of the seller's eBay listings into the local table.
//!
//! ## Run Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SyncEngine::run                                │
//! │                                                                         │
//! │  1. lease "ebay_sync"  ──held──► SyncInProgress (no run recorded)       │
//! │  2. sync_runs.start(trigger)                                            │
//! │  ┌────────────────── bounded by run_timeout ─────────────────────────┐  │
//! │  │ 3. settings: client id, secret, seller id                         │  │
//! │  │ 4. token gate (0, 1 or 2 POSTs)                                   │  │
//! │  │ 5. TieredFetcher: Trading → Browse → Finding                      │  │
//! │  │ 6. load_snapshot + diff                                           │  │
//! │  │ 7. status check each missing row, one at a time                   │  │
//! │  │ 8. apply change set (single transaction)                          │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │  9. ok:  sync_runs.complete, last_sync = now                            │
//! │     err: sync_runs.fail                                                 │
//! │ 10. release lease (always)                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{TokenGrant, TokenManager};
use crate::client::{build_http_client, EbayClient, Endpoints};
use crate::config::AppConfig;
use crate::error::{EbayError, EbayResult};
use crate::settings::EbaySettings;
use crate::source::{FetchRequest, PageLimits, TieredFetcher};
use crate::status::ListingStatusChecker;
use cardshop_core::{diff, ReconcileReport, SyncTrigger, TokenState};
use cardshop_db::{setting_keys as keys, Database};

/// Lease name shared by every sync entry point.
pub const SYNC_LEASE: &str = "ebay_sync";

/// Result of one `run`, shown to the admin and printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
    pub trigger: SyncTrigger,
    /// `None` when the run never started (lease held, database down).
    pub run_id: Option<String>,
    pub report: Option<ReconcileReport>,
}

impl SyncOutcome {
    fn failed(trigger: SyncTrigger, run_id: Option<String>, error: &EbayError) -> Self {
        SyncOutcome {
            success: false,
            message: error.to_string(),
            trigger,
            run_id,
            report: None,
        }
    }
}

/// Connection summary for the admin status page.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub has_credentials: bool,
    pub connected: bool,
    pub token_state: TokenState,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub sandbox: bool,
    pub seller_id: Option<String>,
    pub sync_interval_hours: i64,
    pub last_sync: Option<DateTime<Utc>>,
    pub missing: Vec<&'static str>,
}

/// Runs syncs and the OAuth admin actions.
pub struct SyncEngine {
    db: Database,
    config: AppConfig,
    http: reqwest::Client,
}

impl SyncEngine {
    pub fn new(db: Database, config: AppConfig) -> EbayResult<Self> {
        let http = build_http_client(config.sync.http_timeout())?;
        Ok(SyncEngine { db, config, http })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn load_settings(&self) -> EbayResult<EbaySettings> {
        EbaySettings::load(&self.db.settings()).await
    }

    fn endpoints(&self, settings: &EbaySettings) -> Endpoints {
        self.config.endpoints.resolve(settings.sandbox)
    }

    fn token_manager(&self, settings: &EbaySettings) -> TokenManager {
        TokenManager::new(
            self.http.clone(),
            self.endpoints(settings),
            self.db.settings(),
            &self.config.sync,
        )
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Runs one sync. Never returns an error; failures are in the outcome.
    pub async fn run(&self, trigger: SyncTrigger) -> SyncOutcome {
        let holder = Uuid::new_v4().to_string();
        let leases = self.db.leases();

        match leases
            .try_acquire(
                SYNC_LEASE,
                &holder,
                self.config.sync.lease_ttl_secs,
                Utc::now().timestamp(),
            )
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(%trigger, "Sync already running, skipping");
                return SyncOutcome::failed(trigger, None, &EbayError::SyncInProgress);
            }
            Err(e) => {
                error!(?e, "Could not acquire sync lease");
                return SyncOutcome::failed(trigger, None, &EbayError::from(e));
            }
        }

        let outcome = self.run_locked(trigger).await;

        if let Err(e) = leases.release(SYNC_LEASE, &holder).await {
            error!(?e, "Failed to release sync lease");
        }
        outcome
    }

    async fn run_locked(&self, trigger: SyncTrigger) -> SyncOutcome {
        let runs = self.db.sync_runs();
        let run = match runs.start(trigger).await {
            Ok(run) => run,
            Err(e) => {
                error!(?e, "Could not record sync run");
                return SyncOutcome::failed(trigger, None, &EbayError::from(e));
            }
        };
        info!(run_id = %run.id, %trigger, "Sync run started");

        let timeout = self.config.sync.run_timeout();
        let result = match tokio::time::timeout(timeout, self.execute()).await {
            Ok(result) => result,
            Err(_) => Err(EbayError::Timeout(timeout.as_secs())),
        };

        match result {
            Ok(report) => {
                if let Err(e) = runs.complete(&run.id, &report).await {
                    error!(?e, run_id = %run.id, "Failed to record sync completion");
                }
                if let Err(e) = self
                    .db
                    .settings()
                    .set(keys::LAST_SYNC, &Utc::now().to_rfc3339())
                    .await
                {
                    error!(?e, "Failed to store last_sync");
                }

                let message = report.summary();
                info!(run_id = %run.id, source = ?report.source, "{message}");
                SyncOutcome {
                    success: true,
                    message,
                    trigger,
                    run_id: Some(run.id),
                    report: Some(report),
                }
            }
            Err(e) => {
                error!(run_id = %run.id, error = %e, "Sync run failed");
                if let Err(db_err) = runs.fail(&run.id, &e.to_string()).await {
                    error!(?db_err, run_id = %run.id, "Failed to record sync failure");
                }
                SyncOutcome::failed(trigger, Some(run.id), &e)
            }
        }
    }

    /// Steps 3 to 8. Dropping this future mid-way rolls back the apply.
    async fn execute(&self) -> EbayResult<ReconcileReport> {
        let settings = self.load_settings().await?;
        settings.require_sync_ready()?;
        let seller_id = settings
            .seller_id
            .clone()
            .ok_or_else(|| EbayError::MissingCredentials("seller id".into()))?;
        let client_id = settings
            .client_id
            .clone()
            .ok_or_else(|| EbayError::MissingCredentials("client id".into()))?;

        let access_token = self
            .token_manager(&settings)
            .valid_access_token(&settings, Utc::now())
            .await?;

        let client = EbayClient::new(self.http.clone(), self.endpoints(&settings), &self.config.sync);
        let request = FetchRequest {
            seller_id,
            access_token,
            client_id,
        };
        let fetched = TieredFetcher::standard(client.clone(), PageLimits::from_settings(&self.config.sync))
            .fetch(&request)
            .await?;

        let snapshot = self.db.listings().load_snapshot().await?;
        let mut changes = diff(&snapshot, &fetched.listings);
        debug!(
            inserts = changes.inserts.len(),
            updates = changes.updates.len(),
            unchanged = changes.unchanged,
            missing = changes.missing.len(),
            "Diffed listings"
        );

        let missing = std::mem::take(&mut changes.missing);
        if !missing.is_empty() {
            info!(count = missing.len(), "Checking status of missing listings");
        }
        let checker = ListingStatusChecker::new(client);
        for row in &missing {
            let status = checker.check(&row.ebay_item_id, &request.access_token).await;
            let action = changes.record_missing(row, status);
            debug!(sku = %row.sku, %status, ?action, "Resolved missing listing");
        }

        if changes.has_writes() {
            let applied = self
                .db
                .listings()
                .apply_change_set(&changes, Utc::now())
                .await?;
            debug!(?applied, "Applied listing changes");
        } else {
            debug!("No listing changes to apply");
        }

        Ok(changes.report(fetched.listings.len(), fetched.tier))
    }

    // =========================================================================
    // OAuth Actions
    // =========================================================================

    /// Forces a token refresh regardless of the stored expiry.
    pub async fn refresh_token_now(&self) -> EbayResult<TokenGrant> {
        let settings = self.load_settings().await?;
        self.token_manager(&settings)
            .refresh(&settings, Utc::now())
            .await
    }

    /// Builds the consent URL and remembers its `state` for the callback.
    pub async fn begin_connect(&self) -> EbayResult<String> {
        let settings = self.load_settings().await?;
        let state = Uuid::new_v4().simple().to_string();
        let url = self.token_manager(&settings).authorization_url(&settings, &state)?;
        self.db.settings().set(keys::OAUTH_STATE, &state).await?;
        info!("Starting eBay OAuth consent");
        Ok(url)
    }

    /// Handles the consent redirect.
    pub async fn complete_connect(&self, code: &str, state: &str) -> EbayResult<TokenGrant> {
        let repo = self.db.settings();
        let expected = repo.get(keys::OAUTH_STATE).await?;
        if expected.as_deref() != Some(state) {
            warn!("OAuth callback with unexpected state");
            return Err(EbayError::Invalid("OAuth state mismatch".into()));
        }
        repo.delete(keys::OAUTH_STATE).await?;

        let settings = self.load_settings().await?;
        self.token_manager(&settings)
            .exchange_code(&settings, code, Utc::now())
            .await
    }

    pub async fn disconnect(&self) -> EbayResult<()> {
        let settings = self.load_settings().await?;
        self.token_manager(&settings).disconnect().await
    }

    pub async fn connection_status(&self) -> EbayResult<ConnectionStatus> {
        let settings = self.load_settings().await?;
        let token_state = settings.token_state(Utc::now(), self.config.sync.token_refresh_margin_secs);
        Ok(ConnectionStatus {
            has_credentials: settings.has_credentials(),
            connected: settings.is_connected(),
            token_state,
            token_expires_at: settings.token_expires_at,
            sandbox: settings.sandbox,
            missing: settings.missing_for_sync(),
            seller_id: settings.seller_id,
            sync_interval_hours: settings.sync_interval_hours,
            last_sync: settings.last_sync,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointSettings;
    use cardshop_core::{FetchedListing, SyncRunStatus};
    use cardshop_db::DbConfig;
    use chrono::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        server: MockServer,
        db: Database,
        engine: SyncEngine,
    }

    async fn setup() -> Fixture {
        let server = MockServer::start().await;
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut config = AppConfig::default();
        config.endpoints = EndpointSettings::all(&server.uri());
        config.sync.token_retry_delay_ms = 10;
        config.sync.run_timeout_secs = 30;

        let engine = SyncEngine::new(db.clone(), config).unwrap();
        Fixture { server, db, engine }
    }

    async fn seed_credentials(db: &Database) {
        let expires = (Utc::now() + Duration::hours(2)).timestamp().to_string();
        db.settings()
            .set_many(&[
                (keys::CLIENT_ID, "app".to_string()),
                (keys::CLIENT_SECRET, "secret".to_string()),
                (keys::SELLER_ID, "cardseller".to_string()),
                (keys::ACCESS_TOKEN, "live-token".to_string()),
                (keys::REFRESH_TOKEN, "refresh".to_string()),
                (keys::TOKEN_EXPIRES_AT, expires),
            ])
            .await
            .unwrap();
    }

    fn fetched(item_id: &str, title: &str, price_cents: i64) -> FetchedListing {
        FetchedListing {
            item_id: item_id.to_string(),
            title: title.to_string(),
            description: String::new(),
            price_cents,
            currency: "USD".to_string(),
            quantity: 1,
            image_url: String::new(),
            listing_url: format!("https://www.ebay.com/itm/{item_id}"),
            seller_id: "cardseller".to_string(),
        }
    }

    fn seller_list_xml(item_id: &str, title: &str, price: &str) -> String {
        format!(
            r#"<GetSellerListResponse><Ack>Success</Ack>
            <PaginationResult><TotalNumberOfPages>1</TotalNumberOfPages></PaginationResult>
            <HasMoreItems>false</HasMoreItems>
            <ItemArray><Item>
                <ItemID>{item_id}</ItemID>
                <Title>{title}</Title>
                <Quantity>1</Quantity>
                <ListingDetails><ViewItemURL>https://www.ebay.com/itm/{item_id}</ViewItemURL></ListingDetails>
                <Seller><UserID>cardseller</UserID></Seller>
                <SellingStatus>
                    <CurrentPrice currencyID="USD">{price}</CurrentPrice>
                    <QuantitySold>0</QuantitySold>
                    <ListingStatus>Active</ListingStatus>
                </SellingStatus>
            </Item></ItemArray></GetSellerListResponse>"#
        )
    }

    #[tokio::test]
    async fn test_sync_updates_and_removes() {
        let fx = setup().await;
        seed_credentials(&fx.db).await;

        let listings = fx.db.listings();
        let now = Utc::now();
        let kept_id = listings.insert(&fetched("111", "Charizard", 1000), now).await.unwrap();
        listings.insert(&fetched("222", "Blastoise", 800), now).await.unwrap();
        listings.set_category(kept_id, Some("Pokemon")).await.unwrap();
        listings.toggle_favorite(kept_id).await.unwrap();

        Mock::given(method("POST"))
            .and(path("/identity/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&fx.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ws/api.dll"))
            .and(header("X-EBAY-API-CALL-NAME", "GetSellerList"))
            .and(header("X-EBAY-API-IAF-TOKEN", "live-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(seller_list_xml("111", "Charizard Holo", "12.50")),
            )
            .expect(1)
            .mount(&fx.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ws/api.dll"))
            .and(header("X-EBAY-API-CALL-NAME", "GetItem"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<GetItemResponse><Ack>Failure</Ack><Errors>\
                 <ShortMessage>Item not found.</ShortMessage><ErrorCode>17</ErrorCode>\
                 </Errors></GetItemResponse>",
            ))
            .expect(1)
            .mount(&fx.server)
            .await;

        let outcome = fx.engine.run(SyncTrigger::Manual).await;
        assert!(outcome.success, "{}", outcome.message);

        let report = outcome.report.unwrap();
        assert_eq!(report.source, Some(cardshop_core::SourceTier::Trading));
        assert_eq!(report.fetched, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(report.inserted, 0);

        let row = listings.get_by_sku("EBAY-111").await.unwrap().unwrap();
        assert_eq!(row.title, "Charizard Holo");
        assert_eq!(row.price_cents, 1250);
        assert_eq!(row.category.as_deref(), Some("Pokemon"));
        assert!(row.is_favorite);
        assert!(listings.get_by_sku("EBAY-222").await.unwrap().is_none());

        let runs = fx.db.sync_runs().latest(1).await.unwrap();
        assert_eq!(runs[0].status, SyncRunStatus::Completed);
        assert_eq!(runs[0].removed, 1);

        let settings = fx.engine.load_settings().await.unwrap();
        assert!(settings.last_sync.is_some());
        assert!(fx
            .db
            .leases()
            .holder(SYNC_LEASE, Utc::now().timestamp())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_sync_skips_when_lease_held() {
        let fx = setup().await;
        seed_credentials(&fx.db).await;
        fx.db
            .leases()
            .try_acquire(SYNC_LEASE, "cron", 900, Utc::now().timestamp())
            .await
            .unwrap();

        let outcome = fx.engine.run(SyncTrigger::Scheduled).await;
        assert!(!outcome.success);
        assert!(outcome.run_id.is_none());
        assert!(fx.db.sync_runs().latest(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credentials_fails_run() {
        let fx = setup().await;

        let outcome = fx.engine.run(SyncTrigger::Cli).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("client id"));

        let runs = fx.db.sync_runs().latest(1).await.unwrap();
        assert_eq!(runs[0].status, SyncRunStatus::Failed);
    }

    #[tokio::test]
    async fn test_outage_deletes_nothing() {
        let fx = setup().await;
        seed_credentials(&fx.db).await;
        fx.db
            .listings()
            .insert(&fetched("333", "Venusaur", 500), Utc::now())
            .await
            .unwrap();

        Mock::given(method("POST"))
            .and(path("/ws/api.dll"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&fx.server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&fx.server)
            .await;

        let outcome = fx.engine.run(SyncTrigger::Manual).await;
        assert!(!outcome.success);
        assert_eq!(fx.db.listings().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_connect_round_trip() {
        let fx = setup().await;
        seed_credentials(&fx.db).await;
        fx.db.settings().set(keys::RU_NAME, "Card_Shop-RuName").await.unwrap();

        let url = fx.engine.begin_connect().await.unwrap();
        let state = fx
            .db
            .settings()
            .get(keys::OAUTH_STATE)
            .await
            .unwrap()
            .unwrap();
        assert!(url.contains(&format!("state={state}")));

        let err = fx.engine.complete_connect("code", "forged").await.unwrap_err();
        assert!(matches!(err, EbayError::Invalid(_)));

        let status = fx.engine.connection_status().await.unwrap();
        assert!(status.connected);
        assert_eq!(status.token_state, TokenState::Valid);
    }
}
