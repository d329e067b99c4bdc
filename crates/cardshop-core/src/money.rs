//! # Money Module
//!
//! Listing prices are stored as integer cents.
//!
//! eBay returns prices as decimal strings (`"12.00"`, `"12.5"`, `"12"`).
//! They are converted straight to cents by splitting on the decimal point,
//! never by going through `f64`:
//!
//! ```text
//!   "12.5"  ──► major "12", minor "5"  ──► 12 * 100 + 50 ──► 1250
//!   "0.99"  ──► major "0",  minor "99" ──►  0 * 100 + 99 ──►   99
//!   "12.345"──► minor has 3 digits     ──► CoreError::InvalidPrice
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// A monetary value in the smallest currency unit (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parses an eBay decimal price string into cents.
    ///
    /// ## Accepted Forms
    /// - `"12"`, `"12.5"`, `"12.50"`, `" 12.50 "`
    /// - a leading `-` for negative amounts (never sent by eBay, kept for symmetry)
    ///
    /// ## Example
    /// ```rust
    /// use cardshop_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("12.00").unwrap().cents(), 1200);
    /// assert_eq!(Money::parse_decimal("7.5").unwrap().cents(), 750);
    /// assert!(Money::parse_decimal("7.555").is_err());
    /// ```
    pub fn parse_decimal(value: &str) -> CoreResult<Self> {
        let raw = value.trim();
        let invalid = |reason: &str| CoreError::InvalidPrice {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("empty"));
        }

        let (negative, unsigned) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let (major_str, minor_str) = match unsigned.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (unsigned, ""),
        };

        if major_str.is_empty() && minor_str.is_empty() {
            return Err(invalid("no digits"));
        }
        if !major_str.chars().all(|c| c.is_ascii_digit())
            || !minor_str.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("not a number"));
        }
        if minor_str.len() > 2 {
            return Err(invalid("too many decimal places"));
        }

        let major: i64 = if major_str.is_empty() {
            0
        } else {
            major_str.parse().map_err(|_| invalid("out of range"))?
        };
        let minor: i64 = match minor_str.len() {
            0 => 0,
            1 => minor_str.parse::<i64>().map_err(|_| invalid("not a number"))? * 10,
            _ => minor_str.parse().map_err(|_| invalid("not a number"))?,
        };

        let cents = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(|| invalid("out of range"))?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

/// Renders as a plain decimal (`12.50`), the form eBay and the storefront use.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }
}

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Money(cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!(Money::parse_decimal("12").unwrap().cents(), 1200);
        assert_eq!(Money::parse_decimal("12.00").unwrap().cents(), 1200);
        assert_eq!(Money::parse_decimal("12.5").unwrap().cents(), 1250);
        assert_eq!(Money::parse_decimal("0.99").unwrap().cents(), 99);
        assert_eq!(Money::parse_decimal(".99").unwrap().cents(), 99);
        assert_eq!(Money::parse_decimal(" 3.10 ").unwrap().cents(), 310);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Money::parse_decimal("").is_err());
        assert!(Money::parse_decimal(".").is_err());
        assert!(Money::parse_decimal("abc").is_err());
        assert!(Money::parse_decimal("1.234").is_err());
        assert!(Money::parse_decimal("1,50").is_err());
    }

    #[test]
    fn test_parse_negative() {
        assert_eq!(Money::parse_decimal("-5.50").unwrap().cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1250).to_string(), "12.50");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
    }
}
