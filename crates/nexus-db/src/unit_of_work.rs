//! # Unit of Work
//!
//! One SQLite transaction spanning a whole engine operation.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  let mut uow = db.begin().await?;          BEGIN                        │
//! │  let stock = uow.load_products(..).await?;  reads (same connection)     │
//! │  ... pure nexus-core logic ...                                         │
//! │  uow.save_stock(&changes).await?;           versioned writes            │
//! │  uow.append_transactions(&lines).await?;                                │
//! │  uow.commit().await?;                      COMMIT                       │
//! │                                                                         │
//! │  Any `?` before commit drops the unit of work → ROLLBACK               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every read inside an operation goes through the unit of work: an
//! in-memory database has a single pooled connection, and the transaction
//! holds it.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction as SqlTransaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::catalog::{self, NameList};
use crate::repository::invoice::{self, InvoiceSequence};
use crate::repository::{ledger, product, purchase_order};
use nexus_core::ledger::DAMAGE_SKU_SUFFIX;
use nexus_core::{MasterProduct, Product, PurchaseOrder, StockChanges, Transaction};

/// A database transaction with typed load/save methods.
pub struct UnitOfWork {
    tx: SqlTransaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub(crate) async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let tx = pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Unit of work started");
        Ok(UnitOfWork { tx })
    }

    fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Commits every write made through this unit of work.
    pub async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Unit of work committed");
        Ok(())
    }

    /// Discards every write. Dropping the unit of work does the same.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Unit of work rolled back");
        Ok(())
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn load_product(&mut self, id: &str) -> DbResult<Option<Product>> {
        product::fetch_product(self.conn(), id).await
    }

    /// Loads a product, failing with `NotFound`.
    pub async fn require_product(&mut self, id: &str) -> DbResult<Product> {
        self.load_product(id)
            .await?
            .ok_or_else(|| DbError::not_found("product", id))
    }

    /// Loads the listed products, skipping ids that do not exist.
    pub async fn load_products_by_id(&mut self, ids: &[String]) -> DbResult<Vec<Product>> {
        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(p) = product::fetch_product(self.conn(), id).await? {
                products.push(p);
            }
        }
        Ok(products)
    }

    pub async fn load_products(&mut self, branch: Option<&str>) -> DbResult<Vec<Product>> {
        product::fetch_products(self.conn(), branch).await
    }

    /// Rows that can serve as `owner`'s damage bin (linked or legacy `-DMG`).
    pub async fn load_damage_candidates(&mut self, owner: &Product) -> DbResult<Vec<Product>> {
        let bin_sku = format!("{}{}", owner.sku, DAMAGE_SKU_SUFFIX);
        product::fetch_damage_candidates(self.conn(), owner, &bin_sku).await
    }

    /// Inserts created rows and version-checks updated ones.
    pub async fn save_stock(&mut self, changes: &StockChanges) -> DbResult<()> {
        product::save_changes(self.conn(), changes).await
    }

    pub async fn delete_product(&mut self, id: &str) -> DbResult<bool> {
        product::delete_product(self.conn(), id).await
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    pub async fn append_transactions(&mut self, transactions: &[Transaction]) -> DbResult<()> {
        ledger::insert_transactions(self.conn(), transactions).await
    }

    /// Whether `invoice_number` already has sale lines.
    pub async fn invoice_has_sales(&mut self, invoice_number: &str) -> DbResult<bool> {
        Ok(ledger::count_invoice_sales(self.conn(), invoice_number).await? > 0)
    }

    pub async fn invoice_lines(&mut self, invoice_number: &str) -> DbResult<Vec<Transaction>> {
        ledger::fetch_invoice_lines(self.conn(), invoice_number).await
    }

    pub async fn delete_invoice(&mut self, invoice_number: &str) -> DbResult<u64> {
        ledger::delete_invoice(self.conn(), invoice_number).await
    }

    // =========================================================================
    // Purchase Orders
    // =========================================================================

    pub async fn load_purchase_order(&mut self, id: &str) -> DbResult<Option<PurchaseOrder>> {
        purchase_order::fetch_purchase_order(self.conn(), id).await
    }

    pub async fn po_number_exists(&mut self, po_number: &str) -> DbResult<bool> {
        purchase_order::po_number_exists(self.conn(), po_number).await
    }

    pub async fn count_po_numbers_with_prefix(&mut self, prefix: &str) -> DbResult<i64> {
        purchase_order::count_po_numbers_with_prefix(self.conn(), prefix).await
    }

    pub async fn insert_purchase_order(&mut self, po: &PurchaseOrder) -> DbResult<()> {
        purchase_order::insert_purchase_order(self.conn(), po).await
    }

    pub async fn update_purchase_order(&mut self, po: &PurchaseOrder) -> DbResult<()> {
        purchase_order::update_purchase_order(self.conn(), po).await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub async fn names(&mut self, list: NameList) -> DbResult<Vec<String>> {
        catalog::fetch_names(self.conn(), list).await
    }

    pub async fn add_name(&mut self, list: NameList, name: &str, now: DateTime<Utc>) -> DbResult<()> {
        catalog::insert_name(self.conn(), list, name, now).await
    }

    pub async fn remove_name(&mut self, list: NameList, name: &str) -> DbResult<bool> {
        catalog::delete_name(self.conn(), list, name).await
    }

    pub async fn master_products(&mut self) -> DbResult<Vec<MasterProduct>> {
        catalog::fetch_master_products(self.conn()).await
    }

    pub async fn save_master_product(&mut self, template: &MasterProduct) -> DbResult<()> {
        catalog::upsert_master_product(self.conn(), template).await
    }

    pub async fn delete_master_product(&mut self, id: &str) -> DbResult<bool> {
        catalog::delete_master_product(self.conn(), id).await
    }

    // =========================================================================
    // Invoice Sequence
    // =========================================================================

    pub async fn invoice_sequence(&mut self) -> DbResult<Option<InvoiceSequence>> {
        invoice::fetch_sequence(self.conn()).await
    }

    pub async fn store_invoice_sequence(
        &mut self,
        next_value: &str,
        read_version: Option<i64>,
    ) -> DbResult<()> {
        invoice::store_sequence(self.conn(), next_value, read_version).await
    }
}
