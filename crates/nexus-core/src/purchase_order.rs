//! # Purchase Order Engine
//!
//! Creation and cumulative receiving of supplier orders.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Pending Receipt ──receive (some qty)──► Partially Received            │
//! │        │                                        │                       │
//! │        │ receive (all items complete)           │ receive (all complete)│
//! │        ▼                                        ▼                       │
//! │     Closed ◄────────────────────────────────────┘                       │
//! │                                                                         │
//! │   item complete ⇔ received + damaged ≥ ordered                          │
//! │   received + damaged > ordered is rejected (OverQuantity), never clamped│
//! │   an all-zero call changes nothing                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Receiving Effects
//! - good units: batch at the PO unit cost + one IN line per receive line
//! - damaged units: batch on the damage bin at the product's cost, no ledger
//!   line (audited in the `ReceivingRecord` only)
//! - template-only items are materialized as branch products on first receipt

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::ledger::StockSet;
use crate::money::Money;
use crate::types::{
    new_id, Actor, ItemRef, MasterProduct, PoItem, PoStatus, Product, PurchaseOrder,
    ReceivedQuantity, ReceivingRecord, Transaction, TransactionType,
};
use crate::validation::{
    validate_non_negative, validate_price_cents, validate_quantity, validate_required,
};

// =============================================================================
// Creation
// =============================================================================

/// A requested PO line: a branch product or a master template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PoItemDraft {
    pub item: ItemRef,
    pub quantity_ordered: i64,
    /// Defaults to the product's current cost or the template cost.
    #[serde(default)]
    pub unit_cost_cents: Option<i64>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Input for creating a purchase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrderDraft {
    /// Generated when absent.
    #[serde(default)]
    pub po_number: Option<String>,
    pub supplier: String,
    pub branch: String,
    pub prepared_by: String,
    pub noted_by: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<PoItemDraft>,
    pub actor: Actor,
}

/// Builds a new `Pending Receipt` order.
///
/// `branch_stock` holds the products of the draft's branch. A template whose
/// SKU is already stocked at the branch resolves to that product; other
/// templates stay tagged for creation on first receipt.
pub fn create_purchase_order(
    draft: &PurchaseOrderDraft,
    po_number: String,
    branch_stock: &StockSet,
    templates: &[MasterProduct],
    now: DateTime<Utc>,
) -> CoreResult<PurchaseOrder> {
    validate_required("po_number", &po_number)?;
    validate_required("supplier", &draft.supplier)?;
    validate_required("branch", &draft.branch)?;
    validate_required("prepared_by", &draft.prepared_by)?;
    validate_required("noted_by", &draft.noted_by)?;
    if draft.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        }
        .into());
    }

    let mut items = Vec::with_capacity(draft.items.len());
    for line in &draft.items {
        validate_quantity(line.quantity_ordered)?;
        if let Some(cost) = line.unit_cost_cents {
            validate_price_cents(cost)?;
        }
        let unit = line.unit.clone().unwrap_or_else(|| "pcs".to_string());

        let item = match &line.item {
            ItemRef::Product(id) => {
                let product = branch_stock
                    .get(id)
                    .filter(|p| p.branch == draft.branch)
                    .ok_or_else(|| CoreError::not_found("product", id.as_str()))?;
                PoItem {
                    product_id: Some(product.id.clone()),
                    template_id: None,
                    product_name: product.name.clone(),
                    sku: product.sku.clone(),
                    quantity_ordered: line.quantity_ordered,
                    quantity_received: 0,
                    quantity_damaged: 0,
                    unit_cost_cents: line
                        .unit_cost_cents
                        .unwrap_or_else(|| product.current_cost().cents()),
                    unit,
                }
            }
            ItemRef::Template(id) => {
                let template = find_template(templates, id)?;
                let stocked = branch_stock
                    .find_by_sku(&draft.branch, &template.sku)
                    .map(|p| p.id.clone());
                PoItem {
                    product_id: stocked,
                    template_id: Some(template.id.clone()),
                    product_name: template.name.clone(),
                    sku: template.sku.clone(),
                    quantity_ordered: line.quantity_ordered,
                    quantity_received: 0,
                    quantity_damaged: 0,
                    unit_cost_cents: line.unit_cost_cents.unwrap_or(template.cost_cents),
                    unit,
                }
            }
        };
        items.push(item);
    }
    reject_repeated_items(&items)?;

    Ok(PurchaseOrder {
        id: new_id(),
        po_number: po_number.trim().to_string(),
        status: PoStatus::PendingReceipt,
        supplier: draft.supplier.trim().to_string(),
        branch: draft.branch.clone(),
        date_created: now,
        created_by: draft.actor.name.clone(),
        prepared_by: draft.prepared_by.trim().to_string(),
        noted_by: draft.noted_by.trim().to_string(),
        items,
        notes: draft.notes.clone(),
        receiving_history: Vec::new(),
        version: 0,
    })
}

/// Two lines for one product (directly or through its template) would split
/// its receipts, so an order names each product and template once.
fn reject_repeated_items(items: &[PoItem]) -> CoreResult<()> {
    let mut products = BTreeSet::new();
    let mut templates = BTreeSet::new();
    for item in items {
        let repeated = item
            .product_id
            .as_deref()
            .is_some_and(|id| !products.insert(id))
            || item
                .template_id
                .as_deref()
                .is_some_and(|id| !templates.insert(id));
        if repeated {
            return Err(CoreError::duplicate("purchase order item", item.sku.as_str()));
        }
    }
    Ok(())
}

fn find_template<'a>(templates: &'a [MasterProduct], id: &str) -> CoreResult<&'a MasterProduct> {
    templates
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| CoreError::not_found("master product", id))
}

// =============================================================================
// Receiving
// =============================================================================

/// Units of one PO item in a receiving call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiveLine {
    pub item: ItemRef,
    pub quantity: i64,
    /// Why the units were rejected (damaged lines).
    #[serde(default)]
    pub reason: Option<String>,
}

impl ReceiveLine {
    pub fn new(item: ItemRef, quantity: i64) -> Self {
        Self {
            item,
            quantity,
            reason: None,
        }
    }
}

/// One delivery against a purchase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiveRequest {
    /// Supplier invoice / delivery reference; stamped on the IN lines.
    #[serde(default)]
    pub invoice_reference: Option<String>,
    #[serde(default)]
    pub good: Vec<ReceiveLine>,
    #[serde(default)]
    pub damaged: Vec<ReceiveLine>,
    pub actor: Actor,
}

/// What a receiving call produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiveOutcome {
    pub transactions: Vec<Transaction>,
    /// `None` when the call carried no units.
    pub record: Option<ReceivingRecord>,
}

/// Applies a receiving call to `po` and `stock`, all lines or none.
///
/// ## Errors
/// - `Validation`: negative quantity
/// - `NotFound`: line matches no PO item, template or product is gone
/// - `OverQuantity`: received + damaged would exceed ordered for an item
pub fn receive_purchase_order(
    po: &mut PurchaseOrder,
    stock: &mut StockSet,
    templates: &[MasterProduct],
    request: &ReceiveRequest,
    now: DateTime<Utc>,
) -> CoreResult<ReceiveOutcome> {
    // Resolve every line to an item index and total per item
    let mut good_lines = Vec::with_capacity(request.good.len());
    let mut damaged_lines = Vec::with_capacity(request.damaged.len());
    let mut totals: BTreeMap<usize, (i64, i64)> = BTreeMap::new();

    for line in &request.good {
        let idx = resolve_item(po, line)?;
        let total = totals.entry(idx).or_insert((0, 0));
        total.0 = total.0.saturating_add(line.quantity);
        good_lines.push((idx, line));
    }
    for line in &request.damaged {
        let idx = resolve_item(po, line)?;
        let total = totals.entry(idx).or_insert((0, 0));
        total.1 = total.1.saturating_add(line.quantity);
        damaged_lines.push((idx, line));
    }

    // Totals saturate, so an overflowing request reads as over-quantity
    for (&idx, &(good, damaged)) in &totals {
        let item = &po.items[idx];
        let requested = good.saturating_add(damaged);
        let after = item
            .quantity_received
            .saturating_add(item.quantity_damaged)
            .saturating_add(requested);
        if after > item.quantity_ordered {
            return Err(CoreError::OverQuantity {
                sku: item.sku.clone(),
                ordered: item.quantity_ordered,
                received: item.quantity_received,
                damaged: item.quantity_damaged,
                requested,
            });
        }
    }

    if totals.values().all(|&(good, damaged)| good + damaged == 0) {
        return Ok(ReceiveOutcome::default());
    }

    let mut order = po.clone();
    let mut working = stock.clone();

    // Template-only items become branch products before any batch lands
    for (&idx, &(good, damaged)) in &totals {
        if good + damaged == 0 {
            continue;
        }
        let product_id = materialize_item(&mut order, idx, &mut working, templates, now)?;
        working.require(&product_id)?;
    }

    // Damaged units are layered at the cost the product had before this call
    let mut pre_receipt_cost: BTreeMap<usize, Money> = BTreeMap::new();
    for &(idx, line) in &damaged_lines {
        if line.quantity > 0 {
            let product_id = item_product_id(&order.items[idx])?;
            pre_receipt_cost.insert(idx, working.require(&product_id)?.current_cost());
        }
    }

    let reference = request
        .invoice_reference
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    let mut transactions = Vec::new();
    let mut received = Vec::new();
    for &(idx, line) in &good_lines {
        if line.quantity == 0 {
            continue;
        }
        let item = &order.items[idx];
        let product_id = item_product_id(item)?;
        let product = working.get_mut(&product_id)?;
        product.append_batch(line.quantity, item.unit_cost(), now);

        transactions.push(Transaction {
            id: new_id(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            kind: TransactionType::In,
            quantity: line.quantity,
            date: now,
            user: request.actor.name.clone(),
            branch: order.branch.clone(),
            unit_cost_cents: item.unit_cost_cents,
            total_cents: item.unit_cost().multiply_quantity(line.quantity).cents(),
            price_cents: None,
            invoice_number: reference.clone(),
            notes: Some(format!("Received on {}", order.po_number)),
            payment_method: None,
            reference_no: Some(order.po_number.clone()),
        });
        received.push(ReceivedQuantity {
            product_id,
            quantity: line.quantity,
            reason: None,
        });
    }

    let mut damaged = Vec::new();
    for &(idx, line) in &damaged_lines {
        if line.quantity == 0 {
            continue;
        }
        let product_id = item_product_id(&order.items[idx])?;
        let cost = pre_receipt_cost
            .get(&idx)
            .copied()
            .unwrap_or_else(Money::zero);
        let bin_id = working.ensure_damage_bin(&product_id, now)?;
        working.get_mut(&bin_id)?.append_batch(line.quantity, cost, now);
        damaged.push(ReceivedQuantity {
            product_id,
            quantity: line.quantity,
            reason: line.reason.clone(),
        });
    }

    for (&idx, &(good, damaged_qty)) in &totals {
        let item = &mut order.items[idx];
        item.quantity_received += good;
        item.quantity_damaged += damaged_qty;
    }
    order.status = next_status(&order);

    let record = ReceivingRecord {
        id: new_id(),
        date_received: now,
        invoice_reference: reference,
        received_by: request.actor.name.clone(),
        items: received,
        damaged_items: damaged,
    };
    order.receiving_history.push(record.clone());

    *po = order;
    *stock = working;
    Ok(ReceiveOutcome {
        transactions,
        record: Some(record),
    })
}

/// Status after item counters change; never moves backwards.
pub fn next_status(po: &PurchaseOrder) -> PoStatus {
    if po.items.iter().all(PoItem::is_complete) {
        PoStatus::Closed
    } else if po
        .items
        .iter()
        .any(|i| i.quantity_received + i.quantity_damaged > 0)
    {
        PoStatus::PartiallyReceived
    } else {
        po.status
    }
}

fn resolve_item(po: &PurchaseOrder, line: &ReceiveLine) -> CoreResult<usize> {
    validate_non_negative("quantity", line.quantity)?;
    po.items
        .iter()
        .position(|i| i.matches(&line.item))
        .ok_or_else(|| {
            let id = match &line.item {
                ItemRef::Product(id) | ItemRef::Template(id) => id.clone(),
            };
            CoreError::not_found("purchase order item", id)
        })
}

fn item_product_id(item: &PoItem) -> CoreResult<String> {
    item.product_id
        .clone()
        .ok_or_else(|| CoreError::not_found("product", item.sku.as_str()))
}

/// Ensures the item points at a branch product, creating it from its
/// template if needed. Returns the product id.
fn materialize_item(
    order: &mut PurchaseOrder,
    idx: usize,
    stock: &mut StockSet,
    templates: &[MasterProduct],
    now: DateTime<Utc>,
) -> CoreResult<String> {
    if let Some(id) = &order.items[idx].product_id {
        return Ok(id.clone());
    }

    let template_id = order.items[idx]
        .template_id
        .clone()
        .ok_or_else(|| CoreError::not_found("product", order.items[idx].sku.as_str()))?;
    let template = find_template(templates, &template_id)?;

    let product_id = match stock.find_by_sku(&order.branch, &template.sku) {
        Some(existing) => existing.id.clone(),
        None => {
            let product = product_from_template(template, &order.branch, now);
            let id = product.id.clone();
            stock.insert_new(product)?;
            id
        }
    };

    order.items[idx].product_id = Some(product_id.clone());
    Ok(product_id)
}

/// A branch product built from a template: zero stock, no sell price yet.
pub fn product_from_template(template: &MasterProduct, branch: &str, now: DateTime<Utc>) -> Product {
    Product {
        id: new_id(),
        name: template.name.clone(),
        sku: template.sku.clone(),
        category: template.category.clone(),
        branch: branch.to_string(),
        quantity: 0,
        min_level: template.min_level,
        price_cents: 0,
        cost_cents: template.cost_cents,
        supplier: template.supplier.clone(),
        description: template.description.clone(),
        last_updated: now,
        last_restock_date: None,
        last_restock_quantity: None,
        damage_of: None,
        batches: Vec::new(),
        version: 0,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
