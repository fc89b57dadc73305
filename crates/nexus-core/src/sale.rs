//! # Sale Engine
//!
//! Validates and executes a multi-line sale against the batch ledger.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_sale(lines, invoice)                                             │
//! │                                                                         │
//! │  1. field checks        (invoice, qty > 0, price ≥ 0)                   │
//! │  2. stock check         Σ qty per product ≤ active batches              │
//! │  3. per line, on copies of the products:                                │
//! │       unit_cost = current_cost()      ◄── captured before depletion     │
//! │       margin gate (policy + override)                                   │
//! │       deplete_fifo(qty)                                                 │
//! │       OUT line: total = qty × sold price                                │
//! │  4. copies replace the originals   ◄── only reached if every line passed│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failing line leaves every product exactly as it was.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::ledger::StockSet;
use crate::money::Money;
use crate::pricing::{MarginPolicy, PriceCheck, PriceOverride};
use crate::types::{new_id, Actor, Product, Transaction, TransactionType};
use crate::validation::{validate_invoice_number, validate_price_cents, validate_quantity};

// =============================================================================
// Requests & Receipts
// =============================================================================

/// One product sold at one price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
    pub sold_price_cents: i64,
    /// Required when the price is below the margin floor.
    #[serde(default)]
    pub price_override: Option<PriceOverride>,
}

impl SaleLine {
    pub fn new(product_id: impl Into<String>, quantity: i64, sold_price_cents: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            sold_price_cents,
            price_override: None,
        }
    }

    #[inline]
    pub fn sold_price(&self) -> Money {
        Money::from_cents(self.sold_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        self.sold_price().multiply_quantity(self.quantity)
    }
}

/// A customer sale; the invoice number is supplied separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRequest {
    pub lines: Vec<SaleLine>,
    pub actor: Actor,
    pub payment_method: Option<String>,
    pub reference_no: Option<String>,
    /// Sale date; defaults to the time of the call.
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// Result of a recorded sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleReceipt {
    pub invoice_number: String,
    pub transactions: Vec<Transaction>,
    /// Σ quantity × sold price.
    pub subtotal_cents: i64,
}

impl SaleReceipt {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Apply
// =============================================================================

/// Records a sale against `stock`, all lines or none.
///
/// ## Errors
/// - `Validation`: blank invoice, no lines, quantity ≤ 0, negative price
/// - `NotFound`: unknown product
/// - `InsufficientStock`: Σ quantity for a product exceeds its active batches
/// - `MarginViolation` / `Unauthorized`: margin gate
pub fn apply_sale(
    stock: &mut StockSet,
    request: &SaleRequest,
    invoice_number: &str,
    policy: &MarginPolicy,
    now: DateTime<Utc>,
) -> CoreResult<SaleReceipt> {
    validate_invoice_number(invoice_number)?;
    if request.lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        }
        .into());
    }
    for line in &request.lines {
        validate_quantity(line.quantity)?;
        validate_price_cents(line.sold_price_cents)?;
    }

    // Several lines may name the same product. An overflowing total
    // saturates and fails the stock check below.
    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
    for line in &request.lines {
        let total = totals.entry(line.product_id.as_str()).or_insert(0);
        *total = total.saturating_add(line.quantity);
    }

    let mut working: BTreeMap<String, Product> = BTreeMap::new();
    for (id, requested) in &totals {
        let product = stock.require(id)?;
        let available = product.available();
        if available < *requested {
            return Err(CoreError::InsufficientStock {
                product: product.name.clone(),
                available,
                requested: *requested,
            });
        }
        working.insert(id.to_string(), product.clone());
    }

    let date = request.date.unwrap_or(now);
    let mut transactions = Vec::with_capacity(request.lines.len());
    let mut subtotal = Money::zero();

    for line in &request.lines {
        let product = working
            .get_mut(&line.product_id)
            .ok_or_else(|| CoreError::not_found("product", line.product_id.as_str()))?;

        let unit_cost = product.current_cost();
        let check = policy.check(
            &product.name,
            unit_cost,
            line.sold_price(),
            line.price_override.as_ref(),
        )?;
        let notes = match check {
            PriceCheck::Accepted => None,
            PriceCheck::Overridden { note } => Some(note),
        };

        product.deplete_fifo(line.quantity, date)?;

        subtotal += line.subtotal();
        transactions.push(Transaction {
            id: new_id(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            kind: TransactionType::Out,
            quantity: line.quantity,
            date,
            user: request.actor.name.clone(),
            branch: product.branch.clone(),
            unit_cost_cents: unit_cost.cents(),
            total_cents: line.subtotal().cents(),
            price_cents: Some(line.sold_price_cents),
            invoice_number: Some(invoice_number.to_string()),
            notes,
            payment_method: request.payment_method.clone(),
            reference_no: request.reference_no.clone(),
        });
    }

    for (id, product) in working {
        *stock.get_mut(&id)? = product;
    }

    Ok(SaleReceipt {
        invoice_number: invoice_number.to_string(),
        transactions,
        subtotal_cents: subtotal.cents(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
