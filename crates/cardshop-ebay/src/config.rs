//! # Application Configuration
//!
//! Process-level settings for the server, the database and the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CARDSHOP_PORT=8080                                                 │
//! │     CARDSHOP_ADMIN_TOKEN=...                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/cardshop/cardshop.toml (Linux)                           │
//! │     ~/Library/Application Support/com.cardshop.cardshop/... (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! eBay credentials and OAuth tokens are NOT part of this file. They live in
//! the `site_settings` table and are edited from the admin page.
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 8080
//! admin_token = "change-me"
//!
//! [database]
//! path = "/var/lib/cardshop/cardshop.db"
//!
//! [sync]
//! token_refresh_margin_secs = 600
//! run_timeout_secs = 600
//! page_size = 100
//! marketplace_id = "EBAY_US"
//!
//! [endpoints]
//! # api = "http://localhost:9999"   # stand-in eBay for local testing
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::Endpoints;
use crate::error::{EbayError, EbayResult};
use cardshop_core::TOKEN_REFRESH_MARGIN_SECS;

// =============================================================================
// Server Settings
// =============================================================================

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind address (default: 0.0.0.0 for all interfaces).
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for `/admin/*`. Admin routes answer 503 when unset.
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Public base URL of the shop, used for the OAuth return page.
    #[serde(default)]
    pub public_url: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
            admin_token: None,
            public_url: None,
        }
    }
}

impl ServerSettings {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "cardshop", "cardshop")
        .map(|dirs| dirs.data_dir().join("cardshop.db"))
        .unwrap_or_else(|| PathBuf::from("cardshop.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Refresh the OAuth token when it expires within this many seconds.
    #[serde(default = "default_refresh_margin")]
    pub token_refresh_margin_secs: i64,

    /// Delay before the single token refresh retry (milliseconds).
    #[serde(default = "default_token_retry_delay")]
    pub token_retry_delay_ms: u64,

    /// Wall-clock bound for a whole sync run.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Timeout for every outbound HTTP call.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Lease lifetime; a crashed run blocks the next one for at most this long.
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl_secs: i64,

    /// Entries per page for all fetch tiers.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Upper bound on pages per tier.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Browse API marketplace header.
    #[serde(default = "default_marketplace")]
    pub marketplace_id: String,

    /// Trading API site id (0 = US).
    #[serde(default)]
    pub site_id: u32,

    /// Trading API compatibility level.
    #[serde(default = "default_compat_level")]
    pub compatibility_level: u32,

    /// OAuth scopes requested on consent and refresh.
    #[serde(default = "default_scopes")]
    pub oauth_scopes: Vec<String>,

    /// Run the background scheduler in `serve`.
    #[serde(default = "default_true")]
    pub scheduler_enabled: bool,

    /// How often the scheduler checks whether a sync is due.
    #[serde(default = "default_scheduler_tick")]
    pub scheduler_tick_secs: u64,
}

fn default_refresh_margin() -> i64 {
    TOKEN_REFRESH_MARGIN_SECS
}
fn default_token_retry_delay() -> u64 {
    2_000
}
fn default_run_timeout() -> u64 {
    600
}
fn default_http_timeout() -> u64 {
    30
}
fn default_lease_ttl() -> i64 {
    900
}
fn default_page_size() -> u32 {
    100
}
fn default_max_pages() -> u32 {
    50
}
fn default_marketplace() -> String {
    "EBAY_US".to_string()
}
fn default_compat_level() -> u32 {
    1193
}
fn default_scopes() -> Vec<String> {
    vec![
        "https://api.ebay.com/oauth/api_scope".to_string(),
        "https://api.ebay.com/oauth/api_scope/sell.inventory".to_string(),
    ]
}
fn default_true() -> bool {
    true
}
fn default_scheduler_tick() -> u64 {
    300
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            token_refresh_margin_secs: default_refresh_margin(),
            token_retry_delay_ms: default_token_retry_delay(),
            run_timeout_secs: default_run_timeout(),
            http_timeout_secs: default_http_timeout(),
            lease_ttl_secs: default_lease_ttl(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            marketplace_id: default_marketplace(),
            site_id: 0,
            compatibility_level: default_compat_level(),
            oauth_scopes: default_scopes(),
            scheduler_enabled: true,
            scheduler_tick_secs: default_scheduler_tick(),
        }
    }
}

impl SyncSettings {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn token_retry_delay(&self) -> Duration {
        Duration::from_millis(self.token_retry_delay_ms)
    }

    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_secs(self.scheduler_tick_secs)
    }

    /// Space-separated scope string as sent to eBay.
    pub fn scope(&self) -> String {
        self.oauth_scopes.join(" ")
    }
}

// =============================================================================
// Endpoint Overrides
// =============================================================================

/// Optional base URL overrides.
///
/// Unset fields follow the `ebay_sandbox` setting (production or sandbox
/// hosts). Tests point all three at a local mock server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointSettings {
    /// REST + Trading + OAuth token host.
    #[serde(default)]
    pub api: Option<String>,

    /// Consent page host.
    #[serde(default)]
    pub auth_web: Option<String>,

    /// Finding API host.
    #[serde(default)]
    pub finding: Option<String>,
}

impl EndpointSettings {
    /// Resolves the endpoints for the given environment.
    pub fn resolve(&self, sandbox: bool) -> Endpoints {
        let mut endpoints = Endpoints::for_environment(sandbox);
        if let Some(api) = &self.api {
            endpoints.api = api.trim_end_matches('/').to_string();
        }
        if let Some(auth_web) = &self.auth_web {
            endpoints.auth_web = auth_web.trim_end_matches('/').to_string();
        }
        if let Some(finding) = &self.finding {
            endpoints.finding = finding.trim_end_matches('/').to_string();
        }
        endpoints
    }

    /// Points every endpoint at one base URL.
    pub fn all(base: &str) -> Self {
        EndpointSettings {
            api: Some(base.to_string()),
            auth_web: Some(base.to_string()),
            finding: Some(base.to_string()),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub endpoints: EndpointSettings,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (cardshop.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EbayResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EbayResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EbayError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EbayResult<()> {
        if self.sync.page_size == 0 || self.sync.page_size > 200 {
            return Err(EbayError::Config(
                "sync.page_size must be between 1 and 200".into(),
            ));
        }
        if self.sync.max_pages == 0 {
            return Err(EbayError::Config("sync.max_pages must be greater than 0".into()));
        }
        if self.sync.run_timeout_secs == 0 || self.sync.http_timeout_secs == 0 {
            return Err(EbayError::Config("sync timeouts must be greater than 0".into()));
        }
        if self.sync.lease_ttl_secs <= 0 {
            return Err(EbayError::Config("sync.lease_ttl_secs must be positive".into()));
        }
        // A shorter lease would expire under a run that is still inside its timeout.
        let run_timeout = i64::try_from(self.sync.run_timeout_secs).unwrap_or(i64::MAX);
        if self.sync.lease_ttl_secs <= run_timeout {
            return Err(EbayError::Config(
                "sync.lease_ttl_secs must be greater than sync.run_timeout_secs".into(),
            ));
        }
        if self.sync.token_refresh_margin_secs < 0 {
            return Err(EbayError::Config(
                "sync.token_refresh_margin_secs must not be negative".into(),
            ));
        }

        for url in [
            &self.endpoints.api,
            &self.endpoints.auth_web,
            &self.endpoints.finding,
        ]
        .into_iter()
        .flatten()
        {
            url::Url::parse(url)?;
        }

        if let Some(token) = &self.server.admin_token {
            if token.trim().len() < 8 {
                return Err(EbayError::Config(
                    "server.admin_token must be at least 8 characters".into(),
                ));
            }
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("CARDSHOP_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Ok(port) = std::env::var("CARDSHOP_PORT") {
            if let Ok(p) = port.parse::<u16>() {
                debug!(port = p, "Overriding port from environment");
                self.server.port = p;
            }
        }

        if let Ok(token) = std::env::var("CARDSHOP_ADMIN_TOKEN") {
            self.server.admin_token = Some(token).filter(|t| !t.is_empty());
        }

        if let Ok(url) = std::env::var("CARDSHOP_PUBLIC_URL") {
            self.server.public_url = Some(url);
        }

        if let Ok(path) = std::env::var("CARDSHOP_DATABASE") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(secs) = std::env::var("CARDSHOP_RUN_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.sync.run_timeout_secs = s;
            }
        }

        if let Ok(enabled) = std::env::var("CARDSHOP_SCHEDULER") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "on" => self.sync.scheduler_enabled = true,
                "0" | "false" | "off" => self.sync.scheduler_enabled = false,
                _ => warn!(value = %enabled, "Unknown CARDSHOP_SCHEDULER value"),
            }
        }

        if let Ok(api) = std::env::var("CARDSHOP_EBAY_API_URL") {
            self.endpoints.api = Some(api);
        }
        if let Ok(auth) = std::env::var("CARDSHOP_EBAY_AUTH_URL") {
            self.endpoints.auth_web = Some(auth);
        }
        if let Ok(finding) = std::env::var("CARDSHOP_EBAY_FINDING_URL") {
            self.endpoints.finding = Some(finding);
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "cardshop", "cardshop")
            .map(|dirs| dirs.config_dir().join("cardshop.toml"))
    }
}
