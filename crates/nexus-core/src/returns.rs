//! # Return/Exchange Engine
//!
//! Reverses a sale line and optionally records a replacement sale.
//!
//! ## Routing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  process_return(product, qty, refund, reason, restock, replacement?)    │
//! │                                                                         │
//! │  RETURN line (total = refund, unit_cost = product cost)   ◄── always    │
//! │                                                                         │
//! │  restock = false ──► no stock change (write-off)                        │
//! │  restock = true                                                         │
//! │     ├── reason ~ "damaged" ──► batch on the damage bin (lazy create)    │
//! │     └── otherwise          ──► batch on the product itself              │
//! │                                                                         │
//! │  replacement? ──► apply_sale on the post-return stock                   │
//! │                   net = Σ replacement subtotal − refund                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::ledger::StockSet;
use crate::money::Money;
use crate::pricing::MarginPolicy;
use crate::sale::{apply_sale, SaleLine, SaleReceipt, SaleRequest};
use crate::types::{new_id, Actor, Transaction, TransactionType};
use crate::validation::{validate_invoice_number, validate_non_negative, validate_quantity};

/// Replacement goods handed over in an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Replacement {
    pub lines: Vec<SaleLine>,
    pub new_invoice_number: String,
}

/// A customer return, optionally with an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnRequest {
    pub product_id: String,
    pub quantity: i64,
    /// Invoice the goods were sold on.
    pub invoice_number: String,
    /// Amount given back; may differ from the original line total.
    pub refund_cents: i64,
    pub reason: String,
    /// Put the units back into stock (main or damage bin).
    pub restock: bool,
    #[serde(default)]
    pub replacement: Option<Replacement>,
    pub actor: Actor,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub reference_no: Option<String>,
}

/// Result of a return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnOutcome {
    pub return_transaction: Transaction,
    pub replacement: Option<SaleReceipt>,
    /// Positive: customer owes the balance. Negative: customer is refunded.
    pub net_settlement_cents: i64,
}

/// Whether a return reason sends the units to the damage bin.
pub fn is_damage_reason(reason: &str) -> bool {
    reason.to_lowercase().contains("damaged")
}

/// `Σ replacement subtotal − refund`.
pub fn net_settlement(replacement_subtotal: Money, refund: Money) -> Money {
    replacement_subtotal - refund
}

/// Applies a return and its replacement sale (if any) to `stock`.
///
/// The replacement is validated against the stock as it stands after the
/// return, so returned units can be handed straight back out. Any error
/// leaves `stock` unchanged.
pub fn process_return(
    stock: &mut StockSet,
    request: &ReturnRequest,
    policy: &MarginPolicy,
    now: DateTime<Utc>,
) -> CoreResult<ReturnOutcome> {
    validate_quantity(request.quantity)?;
    validate_invoice_number(&request.invoice_number)?;
    validate_non_negative("refund", request.refund_cents)?;

    let mut working = stock.clone();
    let return_transaction = apply_return(&mut working, request, now)?;

    let replacement = match &request.replacement {
        Some(replacement) => {
            let sale = SaleRequest {
                lines: replacement.lines.clone(),
                actor: request.actor.clone(),
                payment_method: request.payment_method.clone(),
                reference_no: request.reference_no.clone(),
                date: Some(now),
            };
            Some(apply_sale(
                &mut working,
                &sale,
                &replacement.new_invoice_number,
                policy,
                now,
            )?)
        }
        None => None,
    };

    let replacement_subtotal = replacement
        .as_ref()
        .map(|r| r.subtotal())
        .unwrap_or_else(Money::zero);
    let net = net_settlement(replacement_subtotal, Money::from_cents(request.refund_cents));

    *stock = working;
    Ok(ReturnOutcome {
        return_transaction,
        replacement,
        net_settlement_cents: net.cents(),
    })
}

fn apply_return(
    stock: &mut StockSet,
    request: &ReturnRequest,
    now: DateTime<Utc>,
) -> CoreResult<Transaction> {
    let product = stock.require(&request.product_id)?;
    let unit_cost = product.current_cost();

    let transaction = Transaction {
        id: new_id(),
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        kind: TransactionType::Return,
        quantity: request.quantity,
        date: now,
        user: request.actor.name.clone(),
        branch: product.branch.clone(),
        unit_cost_cents: unit_cost.cents(),
        total_cents: request.refund_cents,
        price_cents: None,
        invoice_number: Some(request.invoice_number.clone()),
        notes: Some(request.reason.clone()),
        payment_method: request.payment_method.clone(),
        reference_no: request.reference_no.clone(),
    };

    if request.restock {
        let target = if is_damage_reason(&request.reason) {
            stock.ensure_damage_bin(&request.product_id, now)?
        } else {
            request.product_id.clone()
        };
        stock
            .get_mut(&target)?
            .append_batch(request.quantity, unit_cost, now);
    }

    Ok(transaction)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::ledger::{day, test_product};
    use crate::types::Product;

    fn product_x() -> Product {
        let mut p = test_product("x", "X-1", "Oslob");
        p.name = "X".to_string();
        p.price_cents = 2000;
        p.append_batch(10, Money::from_cents(1000), day(1));
        p
    }

    fn return_of(qty: i64, refund: i64, reason: &str, restock: bool) -> ReturnRequest {
        ReturnRequest {
            product_id: "x".to_string(),
            quantity: qty,
            invoice_number: "SI-5001".to_string(),
            refund_cents: refund,
            reason: reason.to_string(),
            restock,
            replacement: None,
            actor: Actor::staff("Jun"),
            payment_method: None,
            reference_no: None,
        }
    }

    fn sell_five(stock: &mut StockSet) {
        let sale = SaleRequest {
            lines: vec![SaleLine::new("x", 5, 2000)],
            actor: Actor::staff("Jun"),
            payment_method: None,
            reference_no: None,
            date: None,
        };
        let receipt = apply_sale(stock, &sale, "SI-5001", &MarginPolicy::default(), day(2)).unwrap();
        assert_eq!(receipt.subtotal_cents, 10_000);
    }

    #[test]
    fn test_damaged_return_goes_to_damage_bin() {
        let mut stock = StockSet::new(vec![product_x()]);
        sell_five(&mut stock);

        let outcome = process_return(
            &mut stock,
            &return_of(5, 10_000, "Damaged Item", true),
            &MarginPolicy::default(),
            day(3),
        )
        .unwrap();

        // Main stock unchanged by the return
        assert_eq!(stock.get("x").unwrap().quantity, 5);

        let bin = stock.damage_bin_of("x").unwrap();
        assert_eq!(bin.name, "(DAMAGE) X");
        assert_eq!(bin.quantity, 5);
        assert_eq!(bin.batches.len(), 1);
        assert_eq!(bin.batches[0].unit_cost_cents, 1000);
        assert_eq!(bin.batches[0].original_quantity, 5);

        let tx = &outcome.return_transaction;
        assert_eq!(tx.kind, TransactionType::Return);
        assert_eq!(tx.total_cents, 10_000);
        assert_eq!(tx.quantity, 5);
        assert_eq!(outcome.net_settlement_cents, -10_000);
    }

    #[test]
    fn test_plain_return_restocks_main_product() {
        let mut stock = StockSet::new(vec![product_x()]);
        sell_five(&mut stock);

        process_return(
            &mut stock,
            &return_of(2, 4000, "Change Item", true),
            &MarginPolicy::default(),
            day(3),
        )
        .unwrap();

        let p = stock.get("x").unwrap();
        assert_eq!(p.quantity, 7);
        assert!(p.is_consistent());
        assert!(stock.damage_bin_of("x").is_none());
    }

    #[test]
    fn test_write_off_does_not_touch_stock() {
        let mut stock = StockSet::new(vec![product_x()]);
        sell_five(&mut stock);

        let outcome = process_return(
            &mut stock,
            &return_of(1, 2000, "DAMAGED beyond repair", false),
            &MarginPolicy::default(),
            day(3),
        )
        .unwrap();

        assert_eq!(stock.get("x").unwrap().quantity, 5);
        assert!(stock.damage_bin_of("x").is_none());
        assert_eq!(outcome.return_transaction.notes.as_deref(), Some("DAMAGED beyond repair"));
    }

    #[test]
    fn test_exchange_computes_net_settlement() {
        let mut y = test_product("y", "Y-1", "Oslob");
        y.append_batch(3, Money::from_cents(1500), day(1));
        let mut stock = StockSet::new(vec![product_x(), y]);
        sell_five(&mut stock);

        let mut request = return_of(1, 2000, "Change Item", true);
        request.replacement = Some(Replacement {
            lines: vec![SaleLine::new("y", 1, 3500)],
            new_invoice_number: "SI-5001".to_string(),
        });

        let outcome =
            process_return(&mut stock, &request, &MarginPolicy::default(), day(3)).unwrap();

        let replacement = outcome.replacement.unwrap();
        assert_eq!(replacement.subtotal_cents, 3500);
        assert_eq!(outcome.net_settlement_cents, 1500);
        assert_eq!(stock.get("y").unwrap().quantity, 2);
        assert_eq!(stock.get("x").unwrap().quantity, 6);
    }

    #[test]
    fn test_failing_replacement_rejects_the_return() {
        let mut stock = StockSet::new(vec![product_x()]);
        sell_five(&mut stock);

        let mut request = return_of(1, 2000, "Change Item", true);
        request.replacement = Some(Replacement {
            lines: vec![SaleLine::new("x", 50, 2000)],
            new_invoice_number: "SI-5009".to_string(),
        });

        let err = process_return(&mut stock, &request, &MarginPolicy::default(), day(3))
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { .. }));
        assert_eq!(stock.get("x").unwrap().quantity, 5);
    }

    #[test]
    fn test_return_validation() {
        let mut stock = StockSet::new(vec![product_x()]);
        let policy = MarginPolicy::default();

        let mut unknown = return_of(1, 0, "Change Item", true);
        unknown.product_id = "missing".to_string();
        assert!(matches!(
            process_return(&mut stock, &unknown, &policy, day(3)),
            Err(CoreError::NotFound { .. })
        ));

        assert!(matches!(
            process_return(&mut stock, &return_of(1, -5, "Change Item", true), &policy, day(3)),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            process_return(&mut stock, &return_of(0, 0, "Change Item", true), &policy, day(3)),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_damage_reason_is_case_insensitive() {
        assert!(is_damage_reason("Damaged Item"));
        assert!(is_damage_reason("item DAMAGED in transit"));
        assert!(!is_damage_reason("Change Item"));
    }
}
