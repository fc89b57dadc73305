//! # Product Repository
//!
//! Products and their FIFO batches.
//!
//! ## Storage Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products (one row per SKU per branch)                                  │
//! │  ┌──────────┬──────────┬────────┬──────────┬───────────┬─────────┐     │
//! │  │ id       │ sku      │ branch │ quantity │ damage_of │ version │     │
//! │  └────┬─────┴──────────┴────────┴──────────┴───────────┴─────────┘     │
//! │       │ 1:N (ON DELETE CASCADE)                                        │
//! │       ▼                                                                 │
//! │  stock_batches (rowid order = insertion order)                         │
//! │  ┌──────────┬────────────┬──────────┬───────────────────┬──────────┐   │
//! │  │ id       │ date_added │ quantity │ original_quantity │ unit_cost│   │
//! │  └──────────┴────────────┴──────────┴───────────────────┴──────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `pub(crate)` functions take a bare connection so the same SQL serves
//! both the pool-backed [`ProductRepository`] and a
//! [`UnitOfWork`](crate::UnitOfWork) transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use nexus_core::{Product, StockBatch, StockChanges};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    sku: String,
    category: String,
    branch: String,
    quantity: i64,
    min_level: i64,
    price_cents: i64,
    cost_cents: i64,
    supplier: String,
    description: String,
    last_updated: DateTime<Utc>,
    last_restock_date: Option<DateTime<Utc>>,
    last_restock_quantity: Option<i64>,
    damage_of: Option<String>,
    version: i64,
}

impl ProductRow {
    fn into_product(self, batches: Vec<StockBatch>) -> Product {
        Product {
            id: self.id,
            name: self.name,
            sku: self.sku,
            category: self.category,
            branch: self.branch,
            quantity: self.quantity,
            min_level: self.min_level,
            price_cents: self.price_cents,
            cost_cents: self.cost_cents,
            supplier: self.supplier,
            description: self.description,
            last_updated: self.last_updated,
            last_restock_date: self.last_restock_date,
            last_restock_quantity: self.last_restock_quantity,
            damage_of: self.damage_of,
            batches,
            version: self.version,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BatchRow {
    product_id: String,
    id: String,
    date_added: DateTime<Utc>,
    quantity: i64,
    original_quantity: i64,
    unit_cost_cents: i64,
}

impl From<BatchRow> for StockBatch {
    fn from(row: BatchRow) -> Self {
        StockBatch {
            id: row.id,
            date_added: row.date_added,
            quantity: row.quantity,
            original_quantity: row.original_quantity,
            unit_cost_cents: row.unit_cost_cents,
        }
    }
}

const SELECT_PRODUCT: &str = r#"
    SELECT id, name, sku, category, branch, quantity, min_level, price_cents,
           cost_cents, supplier, description, last_updated, last_restock_date,
           last_restock_quantity, damage_of, version
    FROM products
"#;

const SELECT_BATCH: &str = r#"
    SELECT b.product_id, b.id, b.date_added, b.quantity, b.original_quantity,
           b.unit_cost_cents
    FROM stock_batches b
"#;

// =============================================================================
// Reads
// =============================================================================

/// Groups batch rows under their product rows, keeping row order.
fn assemble(rows: Vec<ProductRow>, batch_rows: Vec<BatchRow>) -> Vec<Product> {
    let mut batches: HashMap<String, Vec<StockBatch>> = HashMap::new();
    for row in batch_rows {
        batches
            .entry(row.product_id.clone())
            .or_default()
            .push(row.into());
    }
    rows.into_iter()
        .map(|row| {
            let layers = batches.remove(&row.id).unwrap_or_default();
            row.into_product(layers)
        })
        .collect()
}

pub(crate) async fn fetch_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let row = sqlx::query_as::<_, ProductRow>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let batch_rows = sqlx::query_as::<_, BatchRow>(&format!(
        "{SELECT_BATCH} WHERE b.product_id = ?1 ORDER BY b.rowid"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(assemble(vec![row], batch_rows).pop())
}

/// All products, or those of one branch, ordered by branch then name.
pub(crate) async fn fetch_products(
    conn: &mut SqliteConnection,
    branch: Option<&str>,
) -> DbResult<Vec<Product>> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "{SELECT_PRODUCT} WHERE (?1 IS NULL OR branch = ?1) ORDER BY branch, name, sku"
    ))
    .bind(branch)
    .fetch_all(&mut *conn)
    .await?;

    let batch_rows = sqlx::query_as::<_, BatchRow>(&format!(
        "{SELECT_BATCH} JOIN products p ON p.id = b.product_id \
         WHERE (?1 IS NULL OR p.branch = ?1) ORDER BY b.rowid"
    ))
    .bind(branch)
    .fetch_all(&mut *conn)
    .await?;

    Ok(assemble(rows, batch_rows))
}

/// Damage bins a damage event on `product` may land in: the row whose
/// `damage_of` points at it, plus an unlinked `<sku>-DMG` row in its branch.
pub(crate) async fn fetch_damage_candidates(
    conn: &mut SqliteConnection,
    product: &Product,
    bin_sku: &str,
) -> DbResult<Vec<Product>> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT id FROM products
        WHERE damage_of = ?1
           OR (branch = ?2 AND sku = ?3 AND damage_of IS NULL)
        "#,
    )
    .bind(&product.id)
    .bind(&product.branch)
    .bind(bin_sku)
    .fetch_all(&mut *conn)
    .await?;

    let mut bins = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(bin) = fetch_product(conn, &id).await? {
            bins.push(bin);
        }
    }
    Ok(bins)
}

pub(crate) async fn fetch_damage_bin_id(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Option<String>> {
    let id = sqlx::query_scalar("SELECT id FROM products WHERE damage_of = ?1 LIMIT 1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(id)
}

// =============================================================================
// Writes
// =============================================================================

pub(crate) async fn insert_product(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    debug!(product_id = %product.id, sku = %product.sku, branch = %product.branch, "Inserting product");

    sqlx::query(
        r#"
        INSERT INTO products (
            id, name, sku, category, branch, quantity, min_level, price_cents,
            cost_cents, supplier, description, last_updated, last_restock_date,
            last_restock_quantity, damage_of, version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 1)
        "#,
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(&product.sku)
    .bind(&product.category)
    .bind(&product.branch)
    .bind(product.quantity)
    .bind(product.min_level)
    .bind(product.price_cents)
    .bind(product.cost_cents)
    .bind(&product.supplier)
    .bind(&product.description)
    .bind(product.last_updated)
    .bind(product.last_restock_date)
    .bind(product.last_restock_quantity)
    .bind(&product.damage_of)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => DbError::duplicate(field, product.sku.clone()),
        other => other,
    })?;

    upsert_batches(conn, product).await
}

/// Writes a modified product back if nobody else has since `product.version`.
pub(crate) async fn update_product(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    debug!(product_id = %product.id, version = product.version, "Updating product");

    let result = sqlx::query(
        r#"
        UPDATE products SET
            name = ?1, sku = ?2, category = ?3, quantity = ?4, min_level = ?5,
            price_cents = ?6, cost_cents = ?7, supplier = ?8, description = ?9,
            last_updated = ?10, last_restock_date = ?11, last_restock_quantity = ?12,
            damage_of = ?13, version = version + 1
        WHERE id = ?14 AND version = ?15
        "#,
    )
    .bind(&product.name)
    .bind(&product.sku)
    .bind(&product.category)
    .bind(product.quantity)
    .bind(product.min_level)
    .bind(product.price_cents)
    .bind(product.cost_cents)
    .bind(&product.supplier)
    .bind(&product.description)
    .bind(product.last_updated)
    .bind(product.last_restock_date)
    .bind(product.last_restock_quantity)
    .bind(&product.damage_of)
    .bind(&product.id)
    .bind(product.version)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => DbError::duplicate(field, product.sku.clone()),
        other => other,
    })?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict("product", product.id.clone()));
    }

    upsert_batches(conn, product).await
}

/// Batches are append-only rows whose remaining quantity changes.
async fn upsert_batches(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    for batch in &product.batches {
        sqlx::query(
            r#"
            INSERT INTO stock_batches (
                id, product_id, date_added, quantity, original_quantity, unit_cost_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET quantity = excluded.quantity
            "#,
        )
        .bind(&batch.id)
        .bind(&product.id)
        .bind(batch.date_added)
        .bind(batch.quantity)
        .bind(batch.original_quantity)
        .bind(batch.unit_cost_cents)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Persists everything a [`StockSet`](nexus_core::StockSet) recorded.
///
/// Created rows are inserted owners-first so a new damage bin's
/// `damage_of` reference resolves.
pub(crate) async fn save_changes(conn: &mut SqliteConnection, changes: &StockChanges) -> DbResult<()> {
    let (owners, bins): (Vec<&Product>, Vec<&Product>) =
        changes.created.iter().partition(|p| p.damage_of.is_none());
    for product in owners.into_iter().chain(bins) {
        insert_product(conn, product).await?;
    }
    for product in &changes.updated {
        update_product(conn, product).await?;
    }
    Ok(())
}

pub(crate) async fn delete_product(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    debug!(product_id = %id, "Deleting product");

    let result = sqlx::query("DELETE FROM products WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to products outside a unit of work.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let oslob = repo.list(Some("Oslob")).await?;
/// let bolt = repo.get_by_id("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product with its batches.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        debug!(id = %id, "Getting product by ID");
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    /// Lists products, optionally for one branch.
    pub async fn list(&self, branch: Option<&str>) -> DbResult<Vec<Product>> {
        debug!(branch = ?branch, "Listing products");
        let mut conn = self.pool.acquire().await?;
        fetch_products(&mut conn, branch).await
    }

    /// Id of the damage bin linked to `product_id`, if any.
    pub async fn damage_bin_id(&self, product_id: &str) -> DbResult<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        fetch_damage_bin_id(&mut conn, product_id).await
    }

    /// Counts all products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================
