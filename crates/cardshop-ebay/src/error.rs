//! # eBay Integration Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       eBay Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     eBay API            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Config         │  │  Transport      │  │  Api {call, message}    │ │
//! │  │  MissingCreds   │  │  Timeout        │  │  Parse                  │ │
//! │  │  NotConnected   │  │                 │  │  TokenRefresh           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Database     │  │     Sync        │                              │
//! │  │                 │  │                 │                              │
//! │  │  Database       │  │  SyncInProgress │                              │
//! │  │  Invalid        │  │                 │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use cardshop_core::{CoreError, ValidationError};
use cardshop_db::DbError;

/// Result type alias for eBay operations.
pub type EbayResult<T> = Result<T, EbayError>;

/// Everything that can go wrong talking to eBay or running a sync.
#[derive(Debug, Error)]
pub enum EbayError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid application configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Required eBay settings are not filled in.
    #[error("eBay API credentials not configured: missing {0}")]
    MissingCredentials(String),

    /// No OAuth refresh token: the seller never connected (or disconnected).
    #[error("eBay account not connected. Use \"Connect eBay\" first.")]
    NotConnected,

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Network-level failure (DNS, TLS, connection reset, HTTP timeout).
    #[error("eBay request failed: {0}")]
    Transport(String),

    /// The whole sync run exceeded its wall-clock bound.
    #[error("Sync timed out after {0} seconds")]
    Timeout(u64),

    // =========================================================================
    // API Errors
    // =========================================================================
    /// eBay answered but reported a failure.
    #[error("eBay {call} failed: {message}")]
    Api { call: String, message: String },

    /// Response body could not be understood.
    #[error("Could not parse eBay response: {0}")]
    Parse(String),

    /// OAuth refresh failed after the retry.
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    // =========================================================================
    // Sync / Storage Errors
    // =========================================================================
    /// Another run holds the sync lease.
    #[error("A sync is already in progress")]
    SyncInProgress,

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Input rejected by domain validation.
    #[error("{0}")]
    Invalid(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for EbayError {
    fn from(err: reqwest::Error) -> Self {
        EbayError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for EbayError {
    fn from(err: serde_json::Error) -> Self {
        EbayError::Parse(err.to_string())
    }
}

impl From<url::ParseError> for EbayError {
    fn from(err: url::ParseError) -> Self {
        EbayError::Config(format!("invalid URL: {err}"))
    }
}

impl From<std::io::Error> for EbayError {
    fn from(err: std::io::Error) -> Self {
        EbayError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for EbayError {
    fn from(err: toml::de::Error) -> Self {
        EbayError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for EbayError {
    fn from(err: toml::ser::Error) -> Self {
        EbayError::Config(err.to_string())
    }
}

impl From<CoreError> for EbayError {
    fn from(err: CoreError) -> Self {
        EbayError::Invalid(err.to_string())
    }
}

impl From<ValidationError> for EbayError {
    fn from(err: ValidationError) -> Self {
        EbayError::Invalid(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EbayError {
    /// Returns true if a later attempt may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EbayError::Transport(_)
                | EbayError::Timeout(_)
                | EbayError::SyncInProgress
                | EbayError::TokenRefresh(_)
        )
    }

    /// Returns true if the shop owner has to fix settings first.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EbayError::Config(_) | EbayError::MissingCredentials(_) | EbayError::NotConnected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(EbayError::Transport("connection reset".into()).is_retryable());
        assert!(EbayError::Timeout(600).is_retryable());
        assert!(EbayError::SyncInProgress.is_retryable());

        assert!(!EbayError::MissingCredentials("client id".into()).is_retryable());
        assert!(!EbayError::Parse("bad xml".into()).is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(EbayError::NotConnected.is_config_error());
        assert!(EbayError::MissingCredentials("seller id".into()).is_config_error());
        assert!(!EbayError::Transport("x".into()).is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = EbayError::Api {
            call: "GetSellerList".into(),
            message: "Invalid token".into(),
        };
        assert_eq!(err.to_string(), "eBay GetSellerList failed: Invalid token");
    }
}
