//! # Repository Module
//!
//! One repository per table, each holding a clone of the pool.
//!
//! ## Available Repositories
//!
//! - [`listing::ListingRepository`] - Listing snapshot, change set application, admin flags
//! - [`click::ClickRepository`] - Click log + counter bump
//! - [`settings::SettingsRepository`] - Key/value settings
//! - [`category::CategoryRepository`] - Admin categories
//! - [`sync_run::SyncRunRepository`] - Sync history
//! - [`lease::LeaseRepository`] - Sync mutual exclusion

pub mod category;
pub mod click;
pub mod lease;
pub mod listing;
pub mod settings;
pub mod sync_run;
