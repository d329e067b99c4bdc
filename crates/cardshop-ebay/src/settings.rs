//! # eBay Settings
//!
//! Typed view over the `site_settings` rows the integration uses.
//!
//! ```text
//!   site_settings (text)              EbaySettings (typed)
//!   ─────────────────────             ─────────────────────
//!   ebay_sandbox = "1"          ──►   sandbox: bool
//!   ebay_token_expires_at = "…" ──►   token_expires_at: Option<DateTime>
//!   ebay_sync_interval_hours    ──►   sync_interval_hours: i64 (default 6)
//!   last_sync = RFC 3339        ──►   last_sync: Option<DateTime>
//! ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EbayError, EbayResult};
use cardshop_core::validation::{validate_seller_id, validate_sync_interval_hours};
use cardshop_core::{assess_token, TokenState};
use cardshop_db::{setting_keys as keys, SettingsRepository};

/// Sync interval used when none is stored.
pub const DEFAULT_SYNC_INTERVAL_HOURS: i64 = 6;

/// Credentials, tokens and schedule state as stored by the admin page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EbaySettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub dev_id: Option<String>,
    /// eBay "RuName", sent as `redirect_uri`.
    pub ru_name: Option<String>,
    pub seller_id: Option<String>,
    pub sandbox: bool,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub sync_interval_hours: i64,
    pub last_sync: Option<DateTime<Utc>>,
}

impl EbaySettings {
    /// Reads every eBay setting in one query.
    pub async fn load(repo: &SettingsRepository) -> EbayResult<Self> {
        let all = [
            keys::CLIENT_ID,
            keys::CLIENT_SECRET,
            keys::DEV_ID,
            keys::RU_NAME,
            keys::SELLER_ID,
            keys::SANDBOX,
            keys::ACCESS_TOKEN,
            keys::REFRESH_TOKEN,
            keys::TOKEN_EXPIRES_AT,
            keys::SYNC_INTERVAL_HOURS,
            keys::LAST_SYNC,
        ];
        let mut map = repo.get_many(&all).await?;
        let mut take = |key: &str| map.remove(key).map(|v| v.trim().to_string());

        let settings = EbaySettings {
            client_id: take(keys::CLIENT_ID),
            client_secret: take(keys::CLIENT_SECRET),
            dev_id: take(keys::DEV_ID),
            ru_name: take(keys::RU_NAME),
            seller_id: take(keys::SELLER_ID),
            sandbox: take(keys::SANDBOX).map(|v| parse_bool(&v)).unwrap_or(false),
            access_token: take(keys::ACCESS_TOKEN),
            refresh_token: take(keys::REFRESH_TOKEN),
            token_expires_at: take(keys::TOKEN_EXPIRES_AT).and_then(|v| parse_unix(&v)),
            sync_interval_hours: take(keys::SYNC_INTERVAL_HOURS)
                .and_then(|v| v.parse().ok())
                .filter(|h| validate_sync_interval_hours(*h).is_ok())
                .unwrap_or(DEFAULT_SYNC_INTERVAL_HOURS),
            last_sync: take(keys::LAST_SYNC).and_then(|v| parse_rfc3339(&v)),
        };

        debug!(
            has_credentials = settings.has_credentials(),
            connected = settings.is_connected(),
            sandbox = settings.sandbox,
            "Loaded eBay settings"
        );
        Ok(settings)
    }

    /// Client id and secret are both present.
    pub fn has_credentials(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    /// A refresh token exists (the seller granted consent).
    pub fn is_connected(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Names of the settings a sync needs but does not have.
    pub fn missing_for_sync(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.client_id.is_none() {
            missing.push("client id");
        }
        if self.client_secret.is_none() {
            missing.push("client secret");
        }
        if self.seller_id.is_none() {
            missing.push("seller id");
        }
        missing
    }

    /// Fails with `MissingCredentials` unless a sync can be attempted.
    pub fn require_sync_ready(&self) -> EbayResult<()> {
        let missing = self.missing_for_sync();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EbayError::MissingCredentials(missing.join(", ")))
        }
    }

    /// Runs the token gate against the stored access token.
    pub fn token_state(&self, now: DateTime<Utc>, margin_secs: i64) -> TokenState {
        assess_token(
            self.access_token.as_deref(),
            self.token_expires_at,
            now,
            margin_secs,
        )
    }

    /// True when the scheduled interval has elapsed since the last sync.
    pub fn sync_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_sync {
            None => true,
            Some(last) => last + Duration::hours(self.sync_interval_hours) <= now,
        }
    }
}

// =============================================================================
// Admin Form Update
// =============================================================================

/// Values submitted by the "save API settings" admin action.
///
/// A blank secret keeps the stored one so the form never has to echo it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSettingsUpdate {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub dev_id: String,
    #[serde(default)]
    pub ru_name: String,
    #[serde(default)]
    pub seller_id: String,
    #[serde(default)]
    pub sandbox: bool,
    #[serde(default)]
    pub sync_interval_hours: Option<i64>,
}

impl ApiSettingsUpdate {
    pub fn validate(&self) -> EbayResult<()> {
        if !self.seller_id.trim().is_empty() {
            validate_seller_id(self.seller_id.trim())?;
        }
        if let Some(hours) = self.sync_interval_hours {
            validate_sync_interval_hours(hours)?;
        }
        Ok(())
    }

    /// Validates and writes the update in one transaction.
    pub async fn save(&self, repo: &SettingsRepository) -> EbayResult<()> {
        self.validate()?;

        let mut entries: Vec<(&str, String)> = vec![
            (keys::CLIENT_ID, self.client_id.trim().to_string()),
            (keys::DEV_ID, self.dev_id.trim().to_string()),
            (keys::RU_NAME, self.ru_name.trim().to_string()),
            (keys::SELLER_ID, self.seller_id.trim().to_string()),
            (keys::SANDBOX, if self.sandbox { "1" } else { "0" }.to_string()),
        ];
        if !self.client_secret.trim().is_empty() {
            entries.push((keys::CLIENT_SECRET, self.client_secret.trim().to_string()));
        }
        if let Some(hours) = self.sync_interval_hours {
            entries.push((keys::SYNC_INTERVAL_HOURS, hours.to_string()));
        }

        repo.set_many(&entries).await?;
        debug!(sandbox = self.sandbox, "API settings saved");
        Ok(())
    }
}

// =============================================================================
// Coercion
// =============================================================================

/// Lenient boolean: `1`, `true`, `yes`, `on` (any case).
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_unix(value: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = value.trim().parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value.trim()) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            warn!(value, error = %e, "Ignoring unparseable last_sync");
            None
        }
    }
}
