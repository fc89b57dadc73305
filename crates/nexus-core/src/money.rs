//! # Money
//!
//! Integer minor units ("cents") for costs, prices, refunds and valuations.
//!
//! The margin gate never divides: a price passes when
//! `price * (10000 - bps) >= cost * 10000`, so cost 80.00 at 2500 bps puts
//! the floor at exactly 106.67 with no float rounding in between.
//!
//! ```rust
//! use nexus_core::money::Money;
//!
//! let cost = Money::from_cents(8000);
//! assert_eq!(cost.margin_floor(2500).cents(), 10667);
//! assert!(!Money::from_cents(10000).meets_margin_floor(cost, 2500));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};
use ts_rs::TS;

/// Basis points in one whole (100%).
pub const BPS_SCALE: i64 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// Signed amount in cents; exchange settlements may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Line or layer total: `self × qty`.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Lowest sell price that keeps `min_margin_bps` of margin over this cost.
    ///
    /// `floor = ceil(cost * 10000 / (10000 - min_margin_bps))`. With 2500 bps
    /// this is `cost / 0.75` rounded up to the next cent. A zero or negative
    /// cost has no floor. A margin of 100% or more can never be met, so the
    /// floor is `i64::MAX` cents.
    pub fn margin_floor(&self, min_margin_bps: u32) -> Money {
        if self.0 <= 0 {
            return Money::zero();
        }
        let denominator = BPS_SCALE as i128 - min_margin_bps as i128;
        if denominator <= 0 {
            return Money(i64::MAX);
        }
        let numerator = self.0 as i128 * BPS_SCALE as i128;
        let floor = (numerator + denominator - 1) / denominator;
        Money(i64::try_from(floor).unwrap_or(i64::MAX))
    }

    /// Checks `self` (a sell price) against the margin floor of `cost`.
    ///
    /// Uses cross multiplication, so no value is ever rounded:
    /// `price * (10000 - bps) >= cost * 10000`.
    pub fn meets_margin_floor(&self, cost: Money, min_margin_bps: u32) -> bool {
        if cost.0 <= 0 {
            return true;
        }
        let lhs = self.0 as i128 * (BPS_SCALE as i128 - min_margin_bps as i128);
        let rhs = cost.0 as i128 * BPS_SCALE as i128;
        lhs >= rhs
    }
}

// =============================================================================
// Operators
// =============================================================================

/// `12.50`, `-3.05`: for logs and error messages, no currency symbol.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "0.00");
        assert_eq!(format!("{}", Money::from_cents(-5)), "-0.05");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!((-a).cents(), -1000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_margin_floor_default_policy() {
        // 80.00 / 0.75 = 106.666… → 106.67
        let cost = Money::from_cents(8000);
        assert_eq!(cost.margin_floor(2500).cents(), 10667);

        // Exact division has no rounding: 75.00 / 0.75 = 100.00
        assert_eq!(Money::from_cents(7500).margin_floor(2500).cents(), 10000);
    }

    #[test]
    fn test_margin_floor_zero_cost() {
        assert!(Money::zero().margin_floor(2500).is_zero());
        assert!(Money::zero().meets_margin_floor(Money::zero(), 2500));
    }

    #[test]
    fn test_meets_margin_floor_boundaries() {
        let cost = Money::from_cents(8000);

        assert!(!Money::from_cents(10000).meets_margin_floor(cost, 2500));
        assert!(!Money::from_cents(10666).meets_margin_floor(cost, 2500));
        assert!(Money::from_cents(10667).meets_margin_floor(cost, 2500));

        // The floor itself always passes
        for cents in [1, 99, 3250, 215_000] {
            let c = Money::from_cents(cents);
            assert!(c.margin_floor(2500).meets_margin_floor(c, 2500));
        }
    }

    #[test]
    fn test_full_margin_policy_has_unreachable_floor() {
        let cost = Money::from_cents(8000);
        for bps in [10_000, 12_000, u32::MAX] {
            assert_eq!(cost.margin_floor(bps).cents(), i64::MAX);
            assert!(!Money::from_cents(i64::MAX).meets_margin_floor(cost, bps));
        }
        assert!(Money::zero().margin_floor(10_000).is_zero());
    }

    #[test]
    fn test_margin_floor_saturates_for_huge_costs() {
        let cost = Money::from_cents(i64::MAX);
        assert_eq!(cost.margin_floor(2500).cents(), i64::MAX);
    }

    #[test]
    fn test_zero_margin_policy_allows_selling_at_cost() {
        let cost = Money::from_cents(4200);
        assert_eq!(cost.margin_floor(0), cost);
        assert!(cost.meets_margin_floor(cost, 0));
    }
}
