//! # Token Validity Gate
//!
//! Decides whether the stored OAuth access token can be reused.
//!
//! ```text
//!   now                      expires_at
//!    │◄──────── remaining ──────►│
//!    │                           │
//!    remaining >  margin  ──► Valid      (reuse, no network call)
//!    0 < remaining <= margin ─► Expiring (refresh)
//!    remaining <= 0       ──► Expired    (refresh)
//!    no token / no expiry ──► Missing    (refresh if a refresh token exists)
//! ```
//!
//! The clock is passed in so the gate stays pure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the token gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    /// No access token or no expiry stored.
    Missing,
    /// Token is usable for at least `margin` more seconds.
    Valid,
    /// Token still works but expires within the margin.
    Expiring,
    /// Token has expired.
    Expired,
}

impl TokenState {
    /// True when the token can be used as-is.
    pub fn is_usable(&self) -> bool {
        matches!(self, TokenState::Valid)
    }
}

/// Evaluates the stored token against `now`.
///
/// ## Example
/// ```rust
/// use chrono::{Duration, Utc};
/// use cardshop_core::token::{assess_token, TokenState};
///
/// let now = Utc::now();
/// let state = assess_token(Some("tok"), Some(now + Duration::hours(2)), now, 600);
/// assert_eq!(state, TokenState::Valid);
/// ```
pub fn assess_token(
    access_token: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    margin_secs: i64,
) -> TokenState {
    let token_present = access_token.map(|t| !t.trim().is_empty()).unwrap_or(false);
    let Some(expires_at) = expires_at.filter(|_| token_present) else {
        return TokenState::Missing;
    };

    let remaining = (expires_at - now).num_seconds();
    if remaining > margin_secs {
        TokenState::Valid
    } else if remaining > 0 {
        TokenState::Expiring
    } else {
        TokenState::Expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_valid_beyond_margin() {
        let now = Utc::now();
        let state = assess_token(Some("tok"), Some(now + Duration::seconds(601)), now, 600);
        assert_eq!(state, TokenState::Valid);
        assert!(state.is_usable());
    }

    #[test]
    fn test_exactly_at_margin_is_expiring() {
        let now = Utc::now();
        let state = assess_token(Some("tok"), Some(now + Duration::seconds(600)), now, 600);
        assert_eq!(state, TokenState::Expiring);
        assert!(!state.is_usable());
    }

    #[test]
    fn test_expired() {
        let now = Utc::now();
        let state = assess_token(Some("tok"), Some(now - Duration::seconds(1)), now, 600);
        assert_eq!(state, TokenState::Expired);
    }

    #[test]
    fn test_missing_token_or_expiry() {
        let now = Utc::now();
        assert_eq!(assess_token(None, Some(now), now, 600), TokenState::Missing);
        assert_eq!(assess_token(Some(""), Some(now), now, 600), TokenState::Missing);
        assert_eq!(assess_token(Some("tok"), None, now, 600), TokenState::Missing);
    }
}
