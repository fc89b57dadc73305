//! # Batch/Cost Ledger
//!
//! FIFO cost layers on [`Product`] and the [`StockSet`] working set that the
//! sale, return and receiving algorithms mutate.
//!
//! ## FIFO Depletion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  batches (sorted by date_added)                                         │
//! │                                                                         │
//! │   b1 2024-02-01  qty 6 @ 17.50   ◄── consumed first                     │
//! │   b2 2024-03-10  qty 10 @ 18.00                                         │
//! │   b3 2024-04-02  qty 0 @ 16.90   (drained, kept for audit)              │
//! │                                                                         │
//! │  deplete_fifo(7):  b1 6 → 0, b2 10 → 9                                  │
//! │  cost (next cost) = 18.00                                               │
//! │  valuation        = 9 × 18.00 = 162.00                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - `product.quantity == Σ batch.quantity` after every mutation here
//! - `0 <= batch.quantity <= batch.original_quantity`
//! - `product.cost` is refreshed to the FIFO next cost after every mutation

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{new_id, Product, StockBatch};

/// Prefix of a damaged-goods bin's display name.
pub const DAMAGE_NAME_PREFIX: &str = "(DAMAGE) ";

/// Suffix of a damaged-goods bin's SKU.
pub const DAMAGE_SKU_SUFFIX: &str = "-DMG";

// =============================================================================
// Product Ledger Operations
// =============================================================================

impl Product {
    /// Units held by active batches.
    pub fn available(&self) -> i64 {
        self.batches.iter().map(|b| b.quantity).sum()
    }

    /// Whether the stored quantity agrees with the batch layers.
    pub fn is_consistent(&self) -> bool {
        self.quantity == self.available()
            && self
                .batches
                .iter()
                .all(|b| b.quantity >= 0 && b.quantity <= b.original_quantity)
    }

    /// Pushes a new layer and records it as the latest restock.
    ///
    /// Insertion order does not matter; depletion sorts by `date_added`.
    pub fn append_batch(
        &mut self,
        quantity: i64,
        unit_cost: Money,
        date_added: DateTime<Utc>,
    ) -> &StockBatch {
        self.quantity += quantity;
        self.last_restock_date = Some(date_added);
        self.last_restock_quantity = Some(quantity);
        self.last_updated = date_added;
        self.batches
            .push(StockBatch::new(quantity, unit_cost, date_added));
        self.cost_cents = self.current_cost().cents();

        let last = self.batches.len() - 1;
        &self.batches[last]
    }

    /// Consumes `quantity` units oldest batch first.
    ///
    /// Callers check availability before depleting anything; the check here
    /// only guards the invariant. Batches are left sorted by `date_added`.
    pub fn deplete_fifo(&mut self, quantity: i64, now: DateTime<Utc>) -> CoreResult<()> {
        let available = self.available();
        if quantity > available {
            return Err(CoreError::InsufficientStock {
                product: self.name.clone(),
                available,
                requested: quantity,
            });
        }

        // Stable sort keeps insertion order for equal dates
        self.batches.sort_by_key(|b| b.date_added);

        let mut remaining = quantity;
        for batch in self.batches.iter_mut() {
            if remaining == 0 {
                break;
            }
            let take = batch.quantity.min(remaining);
            batch.quantity -= take;
            remaining -= take;
        }

        self.quantity -= quantity;
        self.last_updated = now;
        self.cost_cents = self.current_cost().cents();
        Ok(())
    }

    /// Unit cost of the oldest active batch, falling back to the stored cost
    /// when nothing is in stock.
    pub fn current_cost(&self) -> Money {
        self.batches
            .iter()
            .filter(|b| b.is_active())
            .min_by_key(|b| b.date_added)
            .map(|b| b.unit_cost())
            .unwrap_or_else(|| self.cost())
    }

    /// `Σ batch.quantity × batch.unit_cost`.
    ///
    /// Layers may carry different costs, so this is not `quantity × cost`.
    pub fn valuation(&self) -> Money {
        self.batches
            .iter()
            .map(|b| b.unit_cost().multiply_quantity(b.quantity))
            .sum()
    }

    /// Builds the damaged-goods bin for this product (empty, price 0).
    pub fn new_damage_bin(&self, now: DateTime<Utc>) -> Product {
        Product {
            id: new_id(),
            name: format!("{}{}", DAMAGE_NAME_PREFIX, self.name),
            sku: format!("{}{}", self.sku, DAMAGE_SKU_SUFFIX),
            category: self.category.clone(),
            branch: self.branch.clone(),
            quantity: 0,
            min_level: 0,
            price_cents: 0,
            cost_cents: self.current_cost().cents(),
            supplier: self.supplier.clone(),
            description: self.description.clone(),
            last_updated: now,
            last_restock_date: None,
            last_restock_quantity: None,
            damage_of: Some(self.id.clone()),
            batches: Vec::new(),
            version: 0,
        }
    }
}

// =============================================================================
// Stock Set
// =============================================================================

/// Products loaded for one engine call.
///
/// Tracks which rows were created or modified so the persistence layer
/// writes back exactly those.
#[derive(Debug, Clone, Default)]
pub struct StockSet {
    products: BTreeMap<String, Product>,
    created: BTreeSet<String>,
    dirty: BTreeSet<String>,
}

/// Rows to persist after an engine call.
#[derive(Debug, Clone, Default)]
pub struct StockChanges {
    pub created: Vec<Product>,
    pub updated: Vec<Product>,
}

impl StockChanges {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty()
    }
}

impl StockSet {
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            created: BTreeSet::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.get(id)
    }

    /// Looks up a product, failing with `NotFound`.
    pub fn require(&self, id: &str) -> CoreResult<&Product> {
        self.products
            .get(id)
            .ok_or_else(|| CoreError::not_found("product", id))
    }

    /// Mutable access; marks the product for write-back.
    pub fn get_mut(&mut self, id: &str) -> CoreResult<&mut Product> {
        let product = self
            .products
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("product", id))?;
        if !self.created.contains(id) {
            self.dirty.insert(id.to_string());
        }
        Ok(product)
    }

    /// Adds a product that does not exist in storage yet.
    ///
    /// Fails with `Duplicate` when the branch already has the SKU.
    pub fn insert_new(&mut self, product: Product) -> CoreResult<()> {
        if self.find_by_sku(&product.branch, &product.sku).is_some() {
            return Err(CoreError::duplicate("sku", product.sku));
        }
        self.created.insert(product.id.clone());
        self.products.insert(product.id.clone(), product);
        Ok(())
    }

    pub fn find_by_sku(&self, branch: &str, sku: &str) -> Option<&Product> {
        self.products
            .values()
            .find(|p| p.branch == branch && p.sku == sku)
    }

    /// The damaged-goods bin of `product_id`, if one exists.
    pub fn damage_bin_of(&self, product_id: &str) -> Option<&Product> {
        self.products
            .values()
            .find(|p| p.damage_of.as_deref() == Some(product_id))
    }

    /// Returns the id of the product's damage bin, creating it on first use.
    ///
    /// A bin is found by its `damage_of` back-reference. Rows imported with
    /// only the `-DMG` SKU convention are adopted by setting the reference.
    /// A bin's own damaged units stay in the bin.
    pub fn ensure_damage_bin(&mut self, product_id: &str, now: DateTime<Utc>) -> CoreResult<String> {
        let product = self.require(product_id)?;
        if product.is_damage_bin() {
            return Ok(product.id.clone());
        }
        if let Some(bin) = self.damage_bin_of(product_id) {
            return Ok(bin.id.clone());
        }

        let bin_sku = format!("{}{}", product.sku, DAMAGE_SKU_SUFFIX);
        let legacy = self
            .find_by_sku(&product.branch, &bin_sku)
            .filter(|p| p.damage_of.is_none())
            .map(|p| p.id.clone());
        if let Some(legacy_id) = legacy {
            let owner = product_id.to_string();
            self.get_mut(&legacy_id)?.damage_of = Some(owner);
            return Ok(legacy_id);
        }

        let bin = product.new_damage_bin(now);
        let bin_id = bin.id.clone();
        self.insert_new(bin)?;
        Ok(bin_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Splits the set into the rows that need writing.
    pub fn into_changes(mut self) -> StockChanges {
        let mut changes = StockChanges::default();
        for id in &self.created {
            if let Some(p) = self.products.remove(id) {
                changes.created.push(p);
            }
        }
        for id in &self.dirty {
            if let Some(p) = self.products.remove(id) {
                changes.updated.push(p);
            }
        }
        changes
    }
}

// =============================================================================
// Test Support
// =============================================================================

/// Builds an empty product for tests in this crate.
#[cfg(test)]
pub(crate) fn test_product(id: &str, sku: &str, branch: &str) -> Product {
    use chrono::TimeZone;

    Product {
        id: id.to_string(),
        name: format!("Product {}", id),
        sku: sku.to_string(),
        category: "Hardware".to_string(),
        branch: branch.to_string(),
        quantity: 0,
        min_level: 5,
        price_cents: 0,
        cost_cents: 0,
        supplier: "Advance".to_string(),
        description: String::new(),
        last_updated: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        last_restock_date: None,
        last_restock_quantity: None,
        damage_of: None,
        batches: Vec::new(),
        version: 1,
    }
}

/// Day `n` of January 2024, for ordering batches in tests.
#[cfg(test)]
pub(crate) fn day(n: u32) -> DateTime<Utc> {
    use chrono::TimeZone;

    Utc.with_ymd_and_hms(2024, 1, n, 9, 0, 0).unwrap()
}

// =============================================================================
// Unit Tests
// =============================================================================
