//! # Catalog Rules
//!
//! Creation and editing of branch products, master templates, branches and
//! categories.
//!
//! ## Product Lifecycle
//! ```text
//! ProductDraft ──create_product──► Product (+ first batch, + IN line)
//!                    │
//!                    └── initial_damage > 0 ──► damage bin with one batch
//!
//! ProductUpdate ──update_product──► descriptive fields / price
//!                    │
//!                    └── cost: admin only, and only with no active batches
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::access::require_admin;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::ledger::StockSet;
use crate::money::Money;
use crate::types::{new_id, Actor, MasterProduct, Product, Transaction, TransactionType};
use crate::validation::{
    validate_non_negative, validate_price_cents, validate_product_name, validate_quantity,
    validate_required, validate_sku,
};

/// Branch and category names known to the catalog.
#[derive(Debug, Clone, Copy)]
pub struct CatalogRefs<'a> {
    pub branches: &'a [String],
    pub categories: &'a [String],
}

impl CatalogRefs<'_> {
    pub fn require_branch(&self, branch: &str) -> CoreResult<()> {
        if self.branches.iter().any(|b| b == branch) {
            Ok(())
        } else {
            Err(CoreError::not_found("branch", branch))
        }
    }

    pub fn require_category(&self, category: &str) -> CoreResult<()> {
        if self.categories.iter().any(|c| c == category) {
            Ok(())
        } else {
            Err(CoreError::not_found("category", category))
        }
    }
}

// =============================================================================
// Branches & Categories
// =============================================================================

/// Validates a new branch/category name; returns it trimmed.
///
/// Names compare case-insensitively, so "Oslob" and "oslob" collide.
pub fn validate_new_name(field: &str, name: &str, existing: &[String]) -> CoreResult<String> {
    validate_required(field, name)?;
    let name = name.trim();
    if existing.iter().any(|e| e.eq_ignore_ascii_case(name)) {
        return Err(CoreError::duplicate(field, name));
    }
    Ok(name.to_string())
}

// =============================================================================
// Products
// =============================================================================

/// Input for a new branch product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductDraft {
    pub name: String,
    pub sku: String,
    pub category: String,
    pub branch: String,
    pub price_cents: i64,
    pub cost_cents: i64,
    #[serde(default)]
    pub min_level: i64,
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub description: String,
    /// Opening stock, layered at `cost_cents`.
    #[serde(default)]
    pub initial_quantity: i64,
    /// Opening damaged units, placed in the damage bin.
    #[serde(default)]
    pub initial_damage: i64,
}

/// Partial edit of a product; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductUpdate {
    pub id: String,
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub min_level: Option<i64>,
    pub price_cents: Option<i64>,
    pub cost_cents: Option<i64>,
    pub supplier: Option<String>,
    pub description: Option<String>,
}

/// Result of creating one product.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedProduct {
    pub product_id: String,
    /// Damage bin created for `initial_damage`.
    pub damage_bin_id: Option<String>,
    /// IN line for the opening stock, if any.
    pub transaction: Option<Transaction>,
}

/// Adds a product to `stock` (which must hold the draft's branch).
pub fn create_product(
    stock: &mut StockSet,
    draft: &ProductDraft,
    refs: CatalogRefs<'_>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> CoreResult<CreatedProduct> {
    validate_product_name(&draft.name)?;
    validate_sku(&draft.sku)?;
    refs.require_branch(&draft.branch)?;
    refs.require_category(&draft.category)?;
    validate_price_cents(draft.price_cents)?;
    validate_non_negative("cost", draft.cost_cents)?;
    validate_non_negative("min_level", draft.min_level)?;
    validate_non_negative("initial_quantity", draft.initial_quantity)?;
    validate_non_negative("initial_damage", draft.initial_damage)?;

    let mut product = Product {
        id: new_id(),
        name: draft.name.trim().to_string(),
        sku: draft.sku.trim().to_string(),
        category: draft.category.clone(),
        branch: draft.branch.clone(),
        quantity: 0,
        min_level: draft.min_level,
        price_cents: draft.price_cents,
        cost_cents: draft.cost_cents,
        supplier: draft.supplier.trim().to_string(),
        description: draft.description.trim().to_string(),
        last_updated: now,
        last_restock_date: None,
        last_restock_quantity: None,
        damage_of: None,
        batches: Vec::new(),
        version: 0,
    };

    let cost = Money::from_cents(draft.cost_cents);
    let transaction = if draft.initial_quantity > 0 {
        product.append_batch(draft.initial_quantity, cost, now);
        Some(restock_transaction(&product, draft.initial_quantity, cost, actor, now))
    } else {
        None
    };

    let product_id = product.id.clone();
    stock.insert_new(product)?;

    let damage_bin_id = if draft.initial_damage > 0 {
        let bin_id = stock.ensure_damage_bin(&product_id, now)?;
        stock
            .get_mut(&bin_id)?
            .append_batch(draft.initial_damage, cost, now);
        Some(bin_id)
    } else {
        None
    };

    Ok(CreatedProduct {
        product_id,
        damage_bin_id,
        transaction,
    })
}

/// Creates every draft or none; SKU collisions inside the batch count.
pub fn import_products(
    stock: &mut StockSet,
    drafts: &[ProductDraft],
    refs: CatalogRefs<'_>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> CoreResult<Vec<CreatedProduct>> {
    if drafts.is_empty() {
        return Err(ValidationError::Required {
            field: "products".to_string(),
        }
        .into());
    }

    let mut working = stock.clone();
    let mut created = Vec::with_capacity(drafts.len());
    for draft in drafts {
        created.push(create_product(&mut working, draft, refs, actor, now)?);
    }

    *stock = working;
    Ok(created)
}

/// Applies an edit. Batches and quantity are never touched here.
pub fn update_product(
    stock: &mut StockSet,
    update: &ProductUpdate,
    refs: CatalogRefs<'_>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    let current = stock.require(&update.id)?;

    if let Some(name) = &update.name {
        validate_product_name(name)?;
    }
    if let Some(sku) = &update.sku {
        validate_sku(sku)?;
        let sku = sku.trim();
        if let Some(other) = stock.find_by_sku(&current.branch, sku) {
            if other.id != current.id {
                return Err(CoreError::duplicate("sku", sku));
            }
        }
    }
    if let Some(category) = &update.category {
        refs.require_category(category)?;
    }
    if let Some(min_level) = update.min_level {
        validate_non_negative("min_level", min_level)?;
    }
    if let Some(price) = update.price_cents {
        validate_price_cents(price)?;
        if current.is_damage_bin() && price != 0 {
            return Err(ValidationError::Immutable {
                field: "price".to_string(),
                reason: "damage bins are never sold".to_string(),
            }
            .into());
        }
    }
    if let Some(cost) = update.cost_cents {
        if cost != current.cost_cents {
            validate_non_negative("cost", cost)?;
            require_admin(actor, "edit product cost")?;
            if current.available() > 0 {
                return Err(ValidationError::Immutable {
                    field: "cost".to_string(),
                    reason: "product has active batches".to_string(),
                }
                .into());
            }
        }
    }

    let product = stock.get_mut(&update.id)?;
    if let Some(name) = &update.name {
        product.name = name.trim().to_string();
    }
    if let Some(sku) = &update.sku {
        product.sku = sku.trim().to_string();
    }
    if let Some(category) = &update.category {
        product.category = category.clone();
    }
    if let Some(min_level) = update.min_level {
        product.min_level = min_level;
    }
    if let Some(price) = update.price_cents {
        product.price_cents = price;
    }
    if let Some(cost) = update.cost_cents {
        product.cost_cents = cost;
    }
    if let Some(supplier) = &update.supplier {
        product.supplier = supplier.trim().to_string();
    }
    if let Some(description) = &update.description {
        product.description = description.trim().to_string();
    }
    product.last_updated = now;
    Ok(())
}

/// Manual restock: a new layer plus an IN line.
pub fn restock(
    stock: &mut StockSet,
    product_id: &str,
    quantity: i64,
    unit_cost: Money,
    actor: &Actor,
    now: DateTime<Utc>,
) -> CoreResult<Transaction> {
    validate_quantity(quantity)?;
    validate_non_negative("unit_cost", unit_cost.cents())?;

    let product = stock.get_mut(product_id)?;
    product.append_batch(quantity, unit_cost, now);
    Ok(restock_transaction(product, quantity, unit_cost, actor, now))
}

fn restock_transaction(
    product: &Product,
    quantity: i64,
    unit_cost: Money,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Transaction {
    Transaction {
        id: new_id(),
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        kind: TransactionType::In,
        quantity,
        date: now,
        user: actor.name.clone(),
        branch: product.branch.clone(),
        unit_cost_cents: unit_cost.cents(),
        total_cents: unit_cost.multiply_quantity(quantity).cents(),
        price_cents: None,
        invoice_number: None,
        notes: None,
        payment_method: None,
        reference_no: None,
    }
}

// =============================================================================
// Master Templates
// =============================================================================

/// Input for creating (`id: None`) or replacing a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MasterProductInput {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub sku: String,
    pub category: String,
    #[serde(default)]
    pub min_level: i64,
    pub cost_cents: i64,
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub description: String,
}

/// Validates a template against the existing list and builds the row.
pub fn build_master_product(
    input: &MasterProductInput,
    existing: &[MasterProduct],
    now: DateTime<Utc>,
) -> CoreResult<MasterProduct> {
    validate_product_name(&input.name)?;
    validate_sku(&input.sku)?;
    validate_required("category", &input.category)?;
    validate_non_negative("min_level", input.min_level)?;
    validate_non_negative("cost", input.cost_cents)?;

    if let Some(id) = &input.id {
        if !existing.iter().any(|t| &t.id == id) {
            return Err(CoreError::not_found("master product", id.as_str()));
        }
    }

    let sku = input.sku.trim();
    let clash = existing
        .iter()
        .any(|t| t.sku == sku && Some(&t.id) != input.id.as_ref());
    if clash {
        return Err(CoreError::duplicate("sku", sku));
    }

    Ok(MasterProduct {
        id: input.id.clone().unwrap_or_else(new_id),
        name: input.name.trim().to_string(),
        sku: sku.to_string(),
        category: input.category.trim().to_string(),
        min_level: input.min_level,
        cost_cents: input.cost_cents,
        supplier: input.supplier.trim().to_string(),
        description: input.description.trim().to_string(),
        last_updated: now,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
