//! # cardshop-ebay: eBay Integration
//!
//! Mirrors a seller's active eBay listings into the local catalog.
//!
//! ## Components
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         cardshop-ebay                                   │
//! │                                                                         │
//! │  ┌──────────────┐     ┌──────────────┐     ┌─────────────────────────┐ │
//! │  │ SyncScheduler│────►│  SyncEngine  │────►│ TieredFetcher           │ │
//! │  │ (interval)   │     │  lease, run  │     │  Trading → Browse →     │ │
//! │  └──────────────┘     │  log, diff,  │     │  Finding                │ │
//! │                       │  apply       │     └─────────────────────────┘ │
//! │  admin / CLI ────────►│              │────►┌─────────────────────────┐ │
//! │                       └──────┬───────┘     │ ListingStatusChecker    │ │
//! │                              │             │  GetItem → Browse       │ │
//! │                              ▼             └─────────────────────────┘ │
//! │                       ┌──────────────┐                                 │
//! │                       │ TokenManager │  refresh, consent, callback     │
//! │                       └──────────────┘                                 │
//! │                                                                         │
//! │  EbayClient (reqwest) • xml • EbaySettings (site_settings) • AppConfig │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let config = AppConfig::load(None)?;
//! let db = Database::new(DbConfig::new(&config.database.path)).await?;
//! let engine = SyncEngine::new(db, config)?;
//!
//! let outcome = engine.run(SyncTrigger::Cli).await;
//! println!("{}", outcome.message);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod settings;
pub mod source;
pub mod status;
pub mod xml;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::{TokenGrant, TokenManager};
pub use client::{EbayClient, Endpoints};
pub use config::AppConfig;
pub use engine::{ConnectionStatus, SyncEngine, SyncOutcome, SYNC_LEASE};
pub use error::{EbayError, EbayResult};
pub use scheduler::{SchedulerHandle, SyncScheduler};
pub use settings::{ApiSettingsUpdate, EbaySettings};
pub use source::{FetchRequest, FetchResult, ListingSource, TieredFetcher};
pub use status::ListingStatusChecker;
