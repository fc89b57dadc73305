//! # Domain Types
//!
//! Core domain types used throughout Nexus Inventory.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  Transaction    │   │ PurchaseOrder   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku + branch   │   │  kind IN/OUT/RET│   │  po_number      │       │
//! │  │  quantity       │   │  invoice_number │   │  status         │       │
//! │  │  batches ───────┼─┐ │  unit/total cost│   │  items ─────────┼─┐     │
//! │  │  damage_of      │ │ └─────────────────┘   │  receiving_hist │ │     │
//! │  └─────────────────┘ │                       └─────────────────┘ │     │
//! │                      ▼                                           ▼     │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StockBatch    │   │ MasterProduct   │   │     PoItem      │       │
//! │  │  FIFO layer     │   │ catalog template│   │ ordered/recv/dmg│       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for relations
//! - Business ID: (sku + branch, po_number, invoice_number) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::money::Money;

/// Generates a fresh entity identifier (UUID v4).
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Stock Batch
// =============================================================================

/// A FIFO cost layer: units received together at one unit cost.
///
/// Batches are never deleted once drained; a batch with `quantity == 0` is
/// kept for history and ignored by depletion and cost lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockBatch {
    pub id: String,
    /// Receipt date; depletion order is ascending by this field.
    #[ts(as = "String")]
    pub date_added: DateTime<Utc>,
    /// Units still on hand in this layer.
    pub quantity: i64,
    /// Units received; never changes after creation.
    pub original_quantity: i64,
    pub unit_cost_cents: i64,
}

impl StockBatch {
    /// Creates a full batch (`quantity == original_quantity`).
    pub fn new(quantity: i64, unit_cost: Money, date_added: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            date_added,
            quantity,
            original_quantity: quantity,
            unit_cost_cents: unit_cost.cents(),
        }
    }

    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    /// Whether the batch still holds stock.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.quantity > 0
    }
}

// =============================================================================
// Product
// =============================================================================

/// One stock-keeping unit at one branch.
///
/// `quantity` is stored redundantly and must always equal the sum of the
/// batch quantities. The mutators in [`crate::ledger`] keep both in step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Stock Keeping Unit, unique per branch.
    pub sku: String,

    pub category: String,

    /// Branch that holds this stock.
    pub branch: String,

    /// Units on hand (Σ batch quantities).
    pub quantity: i64,

    /// Reorder threshold; `quantity <= min_level` counts as low stock.
    pub min_level: i64,

    /// Current sell price in cents.
    pub price_cents: i64,

    /// FIFO "next cost": unit cost of the oldest active batch, or the last
    /// known cost when no batch holds stock.
    pub cost_cents: i64,

    pub supplier: String,

    pub description: String,

    #[ts(as = "String")]
    pub last_updated: DateTime<Utc>,

    #[ts(as = "Option<String>")]
    pub last_restock_date: Option<DateTime<Utc>>,

    pub last_restock_quantity: Option<i64>,

    /// For a damaged-goods bin: the product whose damaged units it holds.
    pub damage_of: Option<String>,

    /// FIFO layers, in insertion order.
    pub batches: Vec<StockBatch>,

    /// Optimistic concurrency version, bumped on every write.
    pub version: i64,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the stored cost as a Money type.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Whether this row is a damaged-goods bin.
    #[inline]
    pub fn is_damage_bin(&self) -> bool {
        self.damage_of.is_some()
    }

    /// Whether stock is at or below the reorder threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_level
    }
}

// =============================================================================
// Transaction Type
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Stock received (restock, import, PO receipt).
    In,
    /// Stock sold.
    Out,
    /// Customer return.
    Return,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::In => "IN",
            TransactionType::Out => "OUT",
            TransactionType::Return => "RETURN",
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// An immutable ledger line.
///
/// Lines are grouped by `invoice_number` for display; an exchange writes OUT
/// and RETURN lines under the same number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Transaction {
    pub id: String,
    pub product_id: String,
    /// Product name at time of the movement (frozen).
    pub product_name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub quantity: i64,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub user: String,
    pub branch: String,
    pub unit_cost_cents: i64,
    /// OUT: quantity × sold price. RETURN: refund. IN: quantity × unit cost.
    pub total_cents: i64,
    /// Sold unit price (OUT only).
    pub price_cents: Option<i64>,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub reference_no: Option<String>,
}

impl Transaction {
    /// Returns the line total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the unit cost as Money.
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }
}

// =============================================================================
// Master Product
// =============================================================================

/// A catalog template that purchase orders can reference before the item is
/// stocked at a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MasterProduct {
    pub id: String,
    pub name: String,
    /// Unique across all templates.
    pub sku: String,
    pub category: String,
    pub min_level: i64,
    pub cost_cents: i64,
    pub supplier: String,
    pub description: String,
    #[ts(as = "String")]
    pub last_updated: DateTime<Utc>,
}

// =============================================================================
// Purchase Order Status
// =============================================================================

/// Purchase order lifecycle. Transitions only move forward.
///
/// ```text
/// Pending Receipt ──► Partially Received ──► Closed
///        │                                     ▲
///        └─────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
pub enum PoStatus {
    #[serde(rename = "Pending Receipt")]
    PendingReceipt,
    #[serde(rename = "Partially Received")]
    PartiallyReceived,
    #[serde(rename = "Closed")]
    Closed,
}

impl Default for PoStatus {
    fn default() -> Self {
        PoStatus::PendingReceipt
    }
}

// =============================================================================
// Purchase Order Item
// =============================================================================

/// A line of a purchase order.
///
/// Exactly one of `product_id`/`template_id` identifies the goods until the
/// first receipt; a template-only line gets its `product_id` when the product
/// is materialized at the branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PoItem {
    pub product_id: Option<String>,
    pub template_id: Option<String>,
    pub product_name: String,
    pub sku: String,
    pub quantity_ordered: i64,
    /// Cumulative good units.
    pub quantity_received: i64,
    /// Cumulative rejected units.
    pub quantity_damaged: i64,
    /// Negotiated unit cost; good receipts are layered at this cost.
    pub unit_cost_cents: i64,
    pub unit: String,
}

impl PoItem {
    /// Units still expected.
    #[inline]
    pub fn outstanding(&self) -> i64 {
        self.quantity_ordered - self.quantity_received - self.quantity_damaged
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.quantity_received + self.quantity_damaged >= self.quantity_ordered
    }

    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    /// Whether a receive line addresses this item.
    pub fn matches(&self, item: &ItemRef) -> bool {
        match item {
            ItemRef::Product(id) => self.product_id.as_deref() == Some(id.as_str()),
            ItemRef::Template(id) => self.template_id.as_deref() == Some(id.as_str()),
        }
    }
}

/// Identifies a PO item in a receiving call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ItemRef {
    Product(String),
    Template(String),
}

// =============================================================================
// Receiving Record
// =============================================================================

/// One line of a receiving audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceivedQuantity {
    pub product_id: String,
    pub quantity: i64,
    pub reason: Option<String>,
}

/// Audit entry appended to a purchase order for every receiving call.
///
/// Damaged lines produce no ledger transaction, so this record is their only
/// trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceivingRecord {
    pub id: String,
    #[ts(as = "String")]
    pub date_received: DateTime<Utc>,
    pub invoice_reference: Option<String>,
    pub received_by: String,
    pub items: Vec<ReceivedQuantity>,
    pub damaged_items: Vec<ReceivedQuantity>,
}

// =============================================================================
// Purchase Order
// =============================================================================

/// A supplier order for one branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrder {
    pub id: String,
    pub po_number: String,
    pub status: PoStatus,
    pub supplier: String,
    pub branch: String,
    #[ts(as = "String")]
    pub date_created: DateTime<Utc>,
    pub created_by: String,
    pub prepared_by: String,
    pub noted_by: String,
    pub items: Vec<PoItem>,
    pub notes: Option<String>,
    pub receiving_history: Vec<ReceivingRecord>,
    /// Optimistic concurrency version.
    pub version: i64,
}

impl PurchaseOrder {
    /// Total ordered value (Σ ordered × unit cost).
    pub fn ordered_value(&self) -> Money {
        self.items
            .iter()
            .map(|i| i.unit_cost().multiply_quantity(i.quantity_ordered))
            .sum()
    }
}

// =============================================================================
// Actors
// =============================================================================

/// Permission level of the person calling the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Staff,
}

/// The person performing an operation; `name` is written to ledger lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub name: String,
    pub role: UserRole,
}

impl Actor {
    pub fn admin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: UserRole::Admin,
        }
    }

    pub fn staff(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: UserRole::Staff,
        }
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(ordered: i64, received: i64, damaged: i64) -> PoItem {
        PoItem {
            product_id: Some("p1".to_string()),
            template_id: None,
            product_name: "Barrel Bolt".to_string(),
            sku: "BOLT-1".to_string(),
            quantity_ordered: ordered,
            quantity_received: received,
            quantity_damaged: damaged,
            unit_cost_cents: 3250,
            unit: "pcs".to_string(),
        }
    }

    #[test]
    fn test_po_item_completion() {
        assert!(!item(10, 6, 0).is_complete());
        assert!(item(10, 6, 4).is_complete());
        assert_eq!(item(10, 6, 1).outstanding(), 3);
    }

    #[test]
    fn test_po_item_matching() {
        let mut line = item(10, 0, 0);
        line.template_id = Some("t1".to_string());

        assert!(line.matches(&ItemRef::Product("p1".to_string())));
        assert!(line.matches(&ItemRef::Template("t1".to_string())));
        assert!(!line.matches(&ItemRef::Product("t1".to_string())));
    }

    #[test]
    fn test_po_status_serializes_with_display_names() {
        let json = serde_json::to_string(&PoStatus::PartiallyReceived).unwrap();
        assert_eq!(json, "\"Partially Received\"");
        assert_eq!(PoStatus::default(), PoStatus::PendingReceipt);
    }

    #[test]
    fn test_transaction_type_serializes_uppercase() {
        let json = serde_json::to_string(&TransactionType::Return).unwrap();
        assert_eq!(json, "\"RETURN\"");
        assert_eq!(TransactionType::Out.as_str(), "OUT");
    }

    #[test]
    fn test_actor_roles() {
        assert!(Actor::admin("Maria").is_admin());
        assert!(!Actor::staff("Jun").is_admin());
    }
}
