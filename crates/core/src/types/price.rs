//! Type-safe price representation using decimal arithmetic.
//!
//! The commerce API serializes every monetary amount as a decimal string
//! (e.g., `"24.99"`). All amounts here are display-side copies of
//! server-computed values; nothing in this type is ever sent back to the
//! server as an input.

use core::fmt;
use core::ops::{Add, Sub};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount in the store currency's standard unit (dollars, not cents).
///
/// Wraps [`Decimal`] so money never passes through floating point. Serializes
/// as a decimal string, matching the commerce API wire format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether this amount is greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Multiply by a quantity, for per-line display subtotals.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        format!("${:.2}", self.0)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_pads_to_two_decimals() {
        assert_eq!(Price::from_cents(1999).display(), "$19.99");
        assert_eq!(Price::from_cents(500).display(), "$5.00");
        assert_eq!(Price::new(Decimal::from(13)).display(), "$13.00");
    }

    #[test]
    fn test_times() {
        let price = Price::from_cents(1250);
        assert_eq!(price.times(3), Price::from_cents(3750));
    }

    #[test]
    fn test_arithmetic() {
        let subtotal = Price::from_cents(2000);
        let discount = Price::from_cents(500);
        let shipping = Price::from_cents(500);
        assert_eq!(subtotal - discount + shipping, Price::from_cents(2000));
    }

    #[test]
    fn test_serde_decimal_string() {
        let price: Price = serde_json::from_str("\"24.99\"").unwrap();
        assert_eq!(price, Price::from_cents(2499));

        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"24.99\"");
    }

    #[test]
    fn test_is_positive() {
        assert!(Price::from_cents(1).is_positive());
        assert!(!Price::ZERO.is_positive());
    }
}
