//! # Pricing Policy
//!
//! The minimum-margin gate applied to every sale line.
//!
//! ```text
//! sold price ≥ floor(cost)?  ──yes──► line accepted
//!        │
//!        no
//!        │
//!        ▼
//! override present? ──no──► MarginViolation
//!        │
//!        yes
//!        │
//!        ▼
//! approver is admin? ──no──► Unauthorized
//!        │
//!        yes
//!        ▼
//! line accepted, audit note written to the OUT line
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::access::require_admin;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Actor;

/// Default minimum margin: 25% of the sell price (`price ≥ cost / 0.75`).
pub const DEFAULT_MIN_MARGIN_BPS: u32 = 2500;

/// Minimum-margin rule, in basis points of the sell price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginPolicy {
    pub min_margin_bps: u32,
}

impl Default for MarginPolicy {
    fn default() -> Self {
        Self {
            min_margin_bps: DEFAULT_MIN_MARGIN_BPS,
        }
    }
}

/// Admin approval for selling below the margin floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceOverride {
    pub approved_by: Actor,
    pub reason: String,
}

/// Outcome of a margin check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceCheck {
    /// Price is at or above the floor.
    Accepted,
    /// Price is below the floor; the note goes on the ledger line.
    Overridden { note: String },
}

impl MarginPolicy {
    /// A minimum of 10000 bps or more blocks every priced sale of a costed
    /// product unless an admin overrides it.
    pub const fn new(min_margin_bps: u32) -> Self {
        Self { min_margin_bps }
    }

    /// Lowest price that passes for `cost`.
    pub fn floor(&self, cost: Money) -> Money {
        cost.margin_floor(self.min_margin_bps)
    }

    /// Checks one sale line.
    pub fn check(
        &self,
        product: &str,
        cost: Money,
        price: Money,
        price_override: Option<&PriceOverride>,
    ) -> CoreResult<PriceCheck> {
        if price.meets_margin_floor(cost, self.min_margin_bps) {
            return Ok(PriceCheck::Accepted);
        }

        let floor = self.floor(cost);
        let Some(approval) = price_override else {
            return Err(CoreError::MarginViolation {
                product: product.to_string(),
                price: price.to_string(),
                min_price: floor.to_string(),
            });
        };

        require_admin(&approval.approved_by, "approve a below-margin price")?;

        Ok(PriceCheck::Overridden {
            note: format!(
                "Price override by {}: sold at {} below minimum {} ({})",
                approval.approved_by.name, price, floor, approval.reason
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cost_80() -> Money {
        Money::from_cents(8000)
    }

    #[test]
    fn test_price_at_floor_is_accepted() {
        let policy = MarginPolicy::default();
        let result = policy.check("Grinder", cost_80(), Money::from_cents(10667), None);
        assert_eq!(result, Ok(PriceCheck::Accepted));
    }

    #[test]
    fn test_below_floor_without_override_is_margin_violation() {
        let policy = MarginPolicy::default();
        let err = policy
            .check("Grinder", cost_80(), Money::from_cents(10000), None)
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::MarginViolation {
                product: "Grinder".to_string(),
                price: "100.00".to_string(),
                min_price: "106.67".to_string(),
            }
        );
    }

    #[test]
    fn test_admin_override_is_accepted_with_note() {
        let policy = MarginPolicy::default();
        let approval = PriceOverride {
            approved_by: Actor::admin("Maria"),
            reason: "loyal customer".to_string(),
        };
        let result = policy
            .check("Grinder", cost_80(), Money::from_cents(10000), Some(&approval))
            .unwrap();

        match result {
            PriceCheck::Overridden { note } => {
                assert!(note.contains("Maria"));
                assert!(note.contains("loyal customer"));
            }
            other => panic!("expected override, got {:?}", other),
        }
    }

    #[test]
    fn test_staff_override_is_unauthorized() {
        let policy = MarginPolicy::default();
        let approval = PriceOverride {
            approved_by: Actor::staff("Jun"),
            reason: "asked nicely".to_string(),
        };
        let err = policy
            .check("Grinder", cost_80(), Money::from_cents(10000), Some(&approval))
            .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));
    }

    #[test]
    fn test_full_margin_policy_needs_override() {
        let policy = MarginPolicy::new(10_000);
        let err = policy
            .check("Grinder", cost_80(), Money::from_cents(50_000), None)
            .unwrap_err();
        assert!(matches!(err, CoreError::MarginViolation { .. }));

        let approval = PriceOverride {
            approved_by: Actor::admin("Maria"),
            reason: "display unit".to_string(),
        };
        let result = policy.check("Grinder", cost_80(), Money::from_cents(50_000), Some(&approval));
        assert!(matches!(result, Ok(PriceCheck::Overridden { .. })));
    }

    #[test]
    fn test_zero_cost_has_no_floor() {
        let policy = MarginPolicy::default();
        let result = policy.check("Freebie", Money::zero(), Money::zero(), None);
        assert_eq!(result, Ok(PriceCheck::Accepted));
    }
}
