//! # cardshop-db: Database Layer for the Card Shop
//!
//! SQLite storage for the eBay listing mirror, using sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Card Shop Data Flow                              │
//! │                                                                         │
//! │  SyncEngine (cardshop-ebay)        HTTP handlers (apps/server)         │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   cardshop-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────────┐  ┌─────────────────────┐  ┌───────────────┐  │   │
//! │  │  │  Database    │  │   Repositories      │  │  Migrations   │  │   │
//! │  │  │  (pool.rs)   │◄─│ listing  click      │  │  (embedded)   │  │   │
//! │  │  │  SqlitePool  │  │ settings category   │  │ 001_init.sql  │  │   │
//! │  │  │              │  │ sync_run lease      │  │               │  │   │
//! │  │  └──────────────┘  └─────────────────────┘  └───────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cardshop_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("cardshop.db")).await?;
//! let listings = db.listings().load_snapshot().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::category::CategoryRepository;
pub use repository::click::ClickRepository;
pub use repository::lease::LeaseRepository;
pub use repository::listing::{ApplyOutcome, ListingRepository};
pub use repository::settings::{keys as setting_keys, SettingsRepository};
pub use repository::sync_run::SyncRunRepository;
