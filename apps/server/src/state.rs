//! Shared application state.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use cardshop_db::{Database, DbConfig};
use cardshop_ebay::{AppConfig, SyncEngine};

/// State handed to every handler.
pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub engine: Arc<SyncEngine>,
}

/// Opens the configured SQLite file, creating its directory and running
/// migrations.
pub async fn open_database(config: &AppConfig) -> anyhow::Result<Database> {
    let path = &config.database.path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }

    let db = Database::new(
        DbConfig::new(path.clone()).max_connections(config.database.max_connections),
    )
    .await
    .with_context(|| format!("opening database {}", path.display()))?;

    info!(path = %path.display(), "Database ready");
    Ok(db)
}

/// Builds the state from configuration.
pub async fn build_state(config: AppConfig) -> anyhow::Result<Arc<AppState>> {
    let db = open_database(&config).await?;
    from_parts(db, config)
}

/// Builds the state around an existing database.
pub fn from_parts(db: Database, config: AppConfig) -> anyhow::Result<Arc<AppState>> {
    let engine = SyncEngine::new(db.clone(), config.clone()).context("creating sync engine")?;
    Ok(Arc::new(AppState {
        config,
        db,
        engine: Arc::new(engine),
    }))
}
