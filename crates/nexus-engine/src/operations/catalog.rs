//! # Catalog Operations
//!
//! Branch and category lists, master templates, branch products and manual
//! restock.
//!
//! ## Locks
//! ```text
//! add/delete branch        catalog:branches
//! add/delete category      catalog:categories
//! save/delete template     catalog:master-products
//! create/import product    branch:<name>            (SKU uniqueness)
//! update product           product:<id>, branch:<name>
//! delete product, restock  product:<id>
//! ```

use std::collections::BTreeSet;

use tracing::{debug, info};

use nexus_core::catalog::{
    self, build_master_product, validate_new_name, CatalogRefs, CreatedProduct,
    MasterProductInput, ProductDraft, ProductUpdate,
};
use nexus_core::{Actor, MasterProduct, Money, Product, StockSet, Transaction};
use nexus_db::{NameList, UnitOfWork};

use super::rejected;
use crate::error::{EngineError, EngineResult};
use crate::locks::{branch_key, product_key, BRANCH_LIST, CATEGORY_LIST, MASTER_PRODUCTS};
use crate::Engine;

/// Branch and category names, read inside the unit of work.
struct Refs {
    branches: Vec<String>,
    categories: Vec<String>,
}

impl Refs {
    async fn load(uow: &mut UnitOfWork) -> EngineResult<Self> {
        Ok(Refs {
            branches: uow.names(NameList::Branches).await?,
            categories: uow.names(NameList::Categories).await?,
        })
    }

    fn as_refs(&self) -> CatalogRefs<'_> {
        CatalogRefs {
            branches: &self.branches,
            categories: &self.categories,
        }
    }
}

impl Engine {
    // =========================================================================
    // Branches & Categories
    // =========================================================================

    pub async fn branches(&self) -> EngineResult<Vec<String>> {
        Ok(self.database().catalog().branches().await?)
    }

    pub async fn categories(&self) -> EngineResult<Vec<String>> {
        Ok(self.database().catalog().categories().await?)
    }

    /// Adds a branch; returns the stored (trimmed) name.
    pub async fn add_branch(&self, name: &str) -> EngineResult<String> {
        self.add_name(NameList::Branches, BRANCH_LIST, "branch", name)
            .await
    }

    pub async fn delete_branch(&self, name: &str) -> EngineResult<()> {
        self.delete_name(NameList::Branches, BRANCH_LIST, "branch", name)
            .await
    }

    /// Adds a category; returns the stored (trimmed) name.
    pub async fn add_category(&self, name: &str) -> EngineResult<String> {
        self.add_name(NameList::Categories, CATEGORY_LIST, "category", name)
            .await
    }

    pub async fn delete_category(&self, name: &str) -> EngineResult<()> {
        self.delete_name(NameList::Categories, CATEGORY_LIST, "category", name)
            .await
    }

    async fn add_name(
        &self,
        list: NameList,
        lock: &str,
        field: &str,
        name: &str,
    ) -> EngineResult<String> {
        let _locks = self.locks().acquire([lock]).await;
        let mut uow = self.database().begin().await?;

        let existing = uow.names(list).await?;
        let name = validate_new_name(field, name, &existing).map_err(rejected("add name"))?;
        uow.add_name(list, &name, self.now()).await?;
        uow.commit().await?;

        info!(field, name = %name, "Catalog name added");
        Ok(name)
    }

    async fn delete_name(
        &self,
        list: NameList,
        lock: &str,
        field: &str,
        name: &str,
    ) -> EngineResult<()> {
        let _locks = self.locks().acquire([lock]).await;
        let mut uow = self.database().begin().await?;

        if !uow.remove_name(list, name.trim()).await? {
            return Err(EngineError::not_found(field, name));
        }
        uow.commit().await?;

        info!(field, name = %name, "Catalog name deleted");
        Ok(())
    }

    // =========================================================================
    // Master Templates
    // =========================================================================

    pub async fn master_products(&self) -> EngineResult<Vec<MasterProduct>> {
        Ok(self.database().catalog().master_products().await?)
    }

    /// Creates a template (`input.id == None`) or replaces an existing one.
    pub async fn save_master_product(
        &self,
        input: &MasterProductInput,
    ) -> EngineResult<MasterProduct> {
        let _locks = self.locks().acquire([MASTER_PRODUCTS]).await;
        let mut uow = self.database().begin().await?;

        let existing = uow.master_products().await?;
        let template = build_master_product(input, &existing, self.now())
            .map_err(rejected("save master product"))?;
        uow.save_master_product(&template).await?;
        uow.commit().await?;

        info!(template_id = %template.id, sku = %template.sku, "Master product saved");
        Ok(template)
    }

    pub async fn delete_master_product(&self, id: &str) -> EngineResult<()> {
        let _locks = self.locks().acquire([MASTER_PRODUCTS]).await;
        let mut uow = self.database().begin().await?;

        if !uow.delete_master_product(id).await? {
            return Err(EngineError::not_found("master product", id));
        }
        uow.commit().await?;

        info!(template_id = %id, "Master product deleted");
        Ok(())
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn product(&self, id: &str) -> EngineResult<Product> {
        self.database()
            .products()
            .get_by_id(id)
            .await?
            .ok_or_else(|| EngineError::not_found("product", id))
    }

    /// Products of one branch, or of all branches.
    pub async fn products(&self, branch: Option<&str>) -> EngineResult<Vec<Product>> {
        Ok(self.database().products().list(branch).await?)
    }

    /// Creates a product with its opening batch and IN line.
    pub async fn create_product(
        &self,
        draft: &ProductDraft,
        actor: &Actor,
    ) -> EngineResult<CreatedProduct> {
        let mut created = self
            .import_with("create product", std::slice::from_ref(draft), actor)
            .await?;
        created
            .pop()
            .ok_or_else(|| EngineError::internal("product was not created"))
    }

    /// Creates every draft or none.
    pub async fn import_products(
        &self,
        drafts: &[ProductDraft],
        actor: &Actor,
    ) -> EngineResult<Vec<CreatedProduct>> {
        self.import_with("import products", drafts, actor).await
    }

    async fn import_with(
        &self,
        operation: &'static str,
        drafts: &[ProductDraft],
        actor: &Actor,
    ) -> EngineResult<Vec<CreatedProduct>> {
        let branches: BTreeSet<&str> = drafts.iter().map(|d| d.branch.as_str()).collect();
        let _locks = self
            .locks()
            .acquire(branches.iter().map(|b| branch_key(b)))
            .await;
        let mut uow = self.database().begin().await?;

        let refs = Refs::load(&mut uow).await?;
        let mut loaded = Vec::new();
        for branch in &branches {
            loaded.extend(uow.load_products(Some(*branch)).await?);
        }
        let mut stock = StockSet::new(loaded);

        let now = self.now();
        let created = catalog::import_products(&mut stock, drafts, refs.as_refs(), actor, now)
            .map_err(rejected(operation))?;
        let lines: Vec<Transaction> = created
            .iter()
            .filter_map(|c| c.transaction.clone())
            .collect();

        uow.save_stock(&stock.into_changes()).await?;
        uow.append_transactions(&lines).await?;
        uow.commit().await?;

        info!(
            operation,
            products = created.len(),
            ledger_lines = lines.len(),
            user = %actor.name,
            "Products created"
        );
        Ok(created)
    }

    /// Edits a product and returns it as stored.
    pub async fn update_product(
        &self,
        update: &ProductUpdate,
        actor: &Actor,
    ) -> EngineResult<Product> {
        let current = self.product(&update.id).await?;
        let _locks = self
            .locks()
            .acquire([product_key(&update.id), branch_key(&current.branch)])
            .await;
        let mut uow = self.database().begin().await?;

        let refs = Refs::load(&mut uow).await?;
        let mut stock = StockSet::new(uow.load_products(Some(&current.branch)).await?);
        catalog::update_product(&mut stock, update, refs.as_refs(), actor, self.now())
            .map_err(rejected("update product"))?;

        uow.save_stock(&stock.into_changes()).await?;
        let product = uow.require_product(&update.id).await?;
        uow.commit().await?;

        info!(product_id = %product.id, user = %actor.name, "Product updated");
        Ok(product)
    }

    /// Removes a product and its batches; ledger lines stay.
    pub async fn delete_product(&self, id: &str) -> EngineResult<()> {
        let _locks = self.locks().acquire([product_key(id)]).await;
        let mut uow = self.database().begin().await?;

        if !uow.delete_product(id).await? {
            return Err(EngineError::not_found("product", id));
        }
        uow.commit().await?;

        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Manual restock: a new FIFO layer plus an IN line.
    pub async fn restock(
        &self,
        product_id: &str,
        quantity: i64,
        unit_cost_cents: i64,
        actor: &Actor,
    ) -> EngineResult<Transaction> {
        let _locks = self.locks().acquire([product_key(product_id)]).await;
        let mut uow = self.database().begin().await?;

        let mut stock = StockSet::new([uow.require_product(product_id).await?]);
        let line = catalog::restock(
            &mut stock,
            product_id,
            quantity,
            Money::from_cents(unit_cost_cents),
            actor,
            self.now(),
        )
        .map_err(rejected("restock"))?;

        uow.save_stock(&stock.into_changes()).await?;
        uow.append_transactions(std::slice::from_ref(&line)).await?;
        uow.commit().await?;

        debug!(transaction_id = %line.id, "Restock line appended");
        info!(product_id = %product_id, quantity, unit_cost = unit_cost_cents, "Product restocked");
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::{admin, draft, engine, staff, stocked};

    #[tokio::test]
    async fn test_branch_names_are_unique_ignoring_case() {
        let engine = engine().await;

        let err = engine.add_branch("oslob").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Duplicate);

        assert_eq!(engine.add_branch("  Danao ").await.unwrap(), "Danao");
        assert_eq!(engine.branches().await.unwrap(), ["Oslob", "Toledo", "Danao"]);
    }

    #[tokio::test]
    async fn test_blank_and_missing_names() {
        let engine = engine().await;

        let err = engine.add_category("   ").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = engine.delete_category("Plumbing").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        engine.delete_category("Tools").await.unwrap();
        assert_eq!(engine.categories().await.unwrap(), ["Hardware"]);
    }

    #[tokio::test]
    async fn test_create_product_writes_batch_and_in_line() {
        let engine = engine().await;
        let id = stocked(&engine, "Bolt", "BOLT-1", 12, 1000, 2000).await;

        let product = engine.product(&id).await.unwrap();
        assert_eq!(product.quantity, 12);
        assert_eq!(product.batches.len(), 1);
        assert_eq!(product.batches[0].original_quantity, 12);

        let lines = engine.transactions(Some("Oslob")).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].total_cents, 12_000);
    }

    #[tokio::test]
    async fn test_create_product_with_opening_damage() {
        let engine = engine().await;
        let mut d = draft("Pipe", "PIPE-1", 10, 500, 900);
        d.initial_damage = 2;

        let created = engine.create_product(&d, &staff()).await.unwrap();
        let bin = engine
            .product(created.damage_bin_id.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(bin.quantity, 2);
        assert_eq!(bin.damage_of.as_deref(), Some(created.product_id.as_str()));
        assert_eq!(bin.price_cents, 0);
    }

    #[tokio::test]
    async fn test_unknown_branch_and_duplicate_sku() {
        let engine = engine().await;
        stocked(&engine, "Bolt", "BOLT-1", 1, 1000, 2000).await;

        let mut d = draft("Bolt again", "BOLT-1", 1, 1000, 2000);
        let err = engine.create_product(&d, &staff()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Duplicate);

        // Same SKU in another branch is fine
        d.branch = "Toledo".to_string();
        engine.create_product(&d, &staff()).await.unwrap();

        d.branch = "Bogo".to_string();
        let err = engine.create_product(&d, &staff()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_import_is_all_or_nothing() {
        let engine = engine().await;
        let drafts = vec![
            draft("Bolt", "BOLT-1", 5, 1000, 2000),
            draft("Nut", "NUT-1", 5, 100, 200),
            draft("Bolt copy", "BOLT-1", 5, 1000, 2000),
        ];

        let err = engine.import_products(&drafts, &staff()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Duplicate);
        assert!(engine.products(None).await.unwrap().is_empty());
        assert!(engine.transactions(None).await.unwrap().is_empty());

        let created = engine
            .import_products(&drafts[..2], &staff())
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(engine.transactions(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cost_edit_needs_admin_and_empty_stock() {
        let engine = engine().await;
        let id = stocked(&engine, "Bolt", "BOLT-1", 3, 1000, 2000).await;

        let update = ProductUpdate {
            id: id.clone(),
            cost_cents: Some(1200),
            ..ProductUpdate::default()
        };
        let err = engine.update_product(&update, &staff()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);

        let err = engine.update_product(&update, &admin()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let rename = ProductUpdate {
            id: id.clone(),
            name: Some("Barrel Bolt".to_string()),
            price_cents: Some(2500),
            ..ProductUpdate::default()
        };
        let product = engine.update_product(&rename, &staff()).await.unwrap();
        assert_eq!(product.name, "Barrel Bolt");
        assert_eq!(product.price_cents, 2500);
        assert_eq!(product.quantity, 3);
    }

    #[tokio::test]
    async fn test_restock_appends_layer() {
        let engine = engine().await;
        let id = stocked(&engine, "Bolt", "BOLT-1", 3, 1000, 2000).await;

        let line = engine.restock(&id, 4, 1100, &staff()).await.unwrap();
        assert_eq!(line.total_cents, 4400);

        let product = engine.product(&id).await.unwrap();
        assert_eq!(product.quantity, 7);
        assert_eq!(product.batches.len(), 2);
        assert_eq!(product.last_restock_quantity, Some(4));

        let err = engine.restock(&id, 0, 1100, &staff()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_delete_product_keeps_history() {
        let engine = engine().await;
        let id = stocked(&engine, "Bolt", "BOLT-1", 3, 1000, 2000).await;

        engine.delete_product(&id).await.unwrap();
        assert_eq!(
            engine.product(&id).await.unwrap_err().code,
            ErrorCode::NotFound
        );
        assert_eq!(engine.transactions(None).await.unwrap().len(), 1);

        let err = engine.delete_product(&id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_master_product_crud() {
        let engine = engine().await;
        let input = MasterProductInput {
            id: None,
            name: "Grinder".to_string(),
            sku: "GR-4".to_string(),
            category: "Tools".to_string(),
            min_level: 2,
            cost_cents: 175_000,
            supplier: "Bosch".to_string(),
            description: String::new(),
        };

        let template = engine.save_master_product(&input).await.unwrap();
        let err = engine.save_master_product(&input).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Duplicate);

        let edit = MasterProductInput {
            id: Some(template.id.clone()),
            cost_cents: 180_000,
            ..input
        };
        engine.save_master_product(&edit).await.unwrap();
        let all = engine.master_products().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].cost_cents, 180_000);

        engine.delete_master_product(&template.id).await.unwrap();
        assert!(engine.master_products().await.unwrap().is_empty());
    }
}
