//! # Settings Repository
//!
//! Key/value store backing credentials, OAuth tokens, `last_sync` and the
//! sync interval. Values are plain text; callers parse them.

use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::debug;

use crate::error::DbResult;

/// Well-known setting keys.
pub mod keys {
    pub const CLIENT_ID: &str = "ebay_client_id";
    pub const CLIENT_SECRET: &str = "ebay_client_secret";
    pub const DEV_ID: &str = "ebay_dev_id";
    pub const RU_NAME: &str = "ebay_ru_name";
    pub const SELLER_ID: &str = "ebay_seller_id";
    pub const SANDBOX: &str = "ebay_sandbox";
    pub const ACCESS_TOKEN: &str = "ebay_access_token";
    pub const REFRESH_TOKEN: &str = "ebay_refresh_token";
    /// Unix seconds.
    pub const TOKEN_EXPIRES_AT: &str = "ebay_token_expires_at";
    pub const SYNC_INTERVAL_HOURS: &str = "ebay_sync_interval_hours";
    /// RFC 3339.
    pub const LAST_SYNC: &str = "last_sync";
    /// Anti-forgery value for the OAuth consent round trip.
    pub const OAUTH_STATE: &str = "ebay_oauth_state";

    /// Keys cleared by "disconnect".
    pub const TOKEN_KEYS: [&str; 3] = [ACCESS_TOKEN, REFRESH_TOKEN, TOKEN_EXPIRES_AT];
}

/// Repository for site settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Reads a setting. Empty values read as `None`.
    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT setting_value FROM site_settings WHERE setting_key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.filter(|v| !v.is_empty()))
    }

    /// Reads a setting or falls back to `default`.
    pub async fn get_or(&self, key: &str, default: &str) -> DbResult<String> {
        Ok(self.get(key).await?.unwrap_or_else(|| default.to_string()))
    }

    /// Reads several settings at once. Missing keys are absent from the map.
    pub async fn get_many(&self, keys: &[&str]) -> DbResult<HashMap<String, String>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT setting_key, setting_value FROM site_settings")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .filter(|(k, v)| keys.contains(&k.as_str()) && !v.is_empty())
            .collect())
    }

    /// Inserts or replaces a setting.
    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        debug!(key, "Writing setting");

        sqlx::query(
            r#"
            INSERT INTO site_settings (setting_key, setting_value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(setting_key) DO UPDATE SET
                setting_value = excluded.setting_value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Writes several settings in one transaction.
    pub async fn set_many(&self, entries: &[(&str, String)]) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO site_settings (setting_key, setting_value, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(setting_key) DO UPDATE SET
                    setting_value = excluded.setting_value,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(*key)
            .bind(value)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(count = entries.len(), "Wrote settings");
        Ok(())
    }

    /// Removes a setting. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM site_settings WHERE setting_key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = db.settings();

        assert_eq!(settings.get(keys::SELLER_ID).await.unwrap(), None);

        settings.set(keys::SELLER_ID, "cardseller").await.unwrap();
        settings.set(keys::SELLER_ID, "othershop").await.unwrap();
        assert_eq!(
            settings.get(keys::SELLER_ID).await.unwrap().as_deref(),
            Some("othershop")
        );
    }

    #[tokio::test]
    async fn test_empty_value_reads_as_missing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = db.settings();

        settings.set(keys::ACCESS_TOKEN, "").await.unwrap();
        assert_eq!(settings.get(keys::ACCESS_TOKEN).await.unwrap(), None);
        assert_eq!(
            settings.get_or(keys::SYNC_INTERVAL_HOURS, "6").await.unwrap(),
            "6"
        );
    }

    #[tokio::test]
    async fn test_set_many_and_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = db.settings();

        settings
            .set_many(&[
                (keys::ACCESS_TOKEN, "tok".to_string()),
                (keys::REFRESH_TOKEN, "ref".to_string()),
            ])
            .await
            .unwrap();

        let map = settings.get_many(&keys::TOKEN_KEYS).await.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(keys::REFRESH_TOKEN).map(String::as_str), Some("ref"));

        assert!(settings.delete(keys::ACCESS_TOKEN).await.unwrap());
        assert!(!settings.delete(keys::ACCESS_TOKEN).await.unwrap());
    }
}
