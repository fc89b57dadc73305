//! # Catalog Repository
//!
//! Branch and category name lists, and master product templates.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use nexus_core::MasterProduct;

/// One of the two name-list tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameList {
    Branches,
    Categories,
}

impl NameList {
    fn table(self) -> &'static str {
        match self {
            NameList::Branches => "branches",
            NameList::Categories => "categories",
        }
    }

    fn entity(self) -> &'static str {
        match self {
            NameList::Branches => "branch",
            NameList::Categories => "category",
        }
    }
}

// =============================================================================
// Name Lists
// =============================================================================

/// Names in the order they were added.
pub(crate) async fn fetch_names(conn: &mut SqliteConnection, list: NameList) -> DbResult<Vec<String>> {
    let names: Vec<String> =
        sqlx::query_scalar(&format!("SELECT name FROM {} ORDER BY rowid", list.table()))
        .fetch_all(&mut *conn)
        .await?;
    Ok(names)
}

pub(crate) async fn insert_name(
    conn: &mut SqliteConnection,
    list: NameList,
    name: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    debug!(list = list.table(), name = %name, "Adding name");

    sqlx::query(&format!(
        "INSERT INTO {} (name, created_at) VALUES (?1, ?2)",
        list.table()
    ))
    .bind(name)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => DbError::duplicate(list.entity(), name),
        other => other,
    })?;
    Ok(())
}

/// Case-insensitive; returns whether a row was removed.
pub(crate) async fn delete_name(conn: &mut SqliteConnection, list: NameList, name: &str) -> DbResult<bool> {
    debug!(list = list.table(), name = %name, "Removing name");

    let result = sqlx::query(&format!("DELETE FROM {} WHERE name = ?1", list.table()))
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Master Templates
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct MasterProductRow {
    id: String,
    name: String,
    sku: String,
    category: String,
    min_level: i64,
    cost_cents: i64,
    supplier: String,
    description: String,
    last_updated: DateTime<Utc>,
}

impl From<MasterProductRow> for MasterProduct {
    fn from(row: MasterProductRow) -> Self {
        MasterProduct {
            id: row.id,
            name: row.name,
            sku: row.sku,
            category: row.category,
            min_level: row.min_level,
            cost_cents: row.cost_cents,
            supplier: row.supplier,
            description: row.description,
            last_updated: row.last_updated,
        }
    }
}

pub(crate) async fn fetch_master_products(conn: &mut SqliteConnection) -> DbResult<Vec<MasterProduct>> {
    let rows = sqlx::query_as::<_, MasterProductRow>(
        r#"
        SELECT id, name, sku, category, min_level, cost_cents, supplier,
               description, last_updated
        FROM master_products
        ORDER BY name, sku
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(MasterProduct::from).collect())
}

/// Inserts a new template or replaces the one with the same id.
pub(crate) async fn upsert_master_product(
    conn: &mut SqliteConnection,
    template: &MasterProduct,
) -> DbResult<()> {
    debug!(template_id = %template.id, sku = %template.sku, "Saving master product");

    sqlx::query(
        r#"
        INSERT INTO master_products (
            id, name, sku, category, min_level, cost_cents, supplier,
            description, last_updated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            sku = excluded.sku,
            category = excluded.category,
            min_level = excluded.min_level,
            cost_cents = excluded.cost_cents,
            supplier = excluded.supplier,
            description = excluded.description,
            last_updated = excluded.last_updated
        "#,
    )
    .bind(&template.id)
    .bind(&template.name)
    .bind(&template.sku)
    .bind(&template.category)
    .bind(template.min_level)
    .bind(template.cost_cents)
    .bind(&template.supplier)
    .bind(&template.description)
    .bind(template.last_updated)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => DbError::duplicate("sku", template.sku.clone()),
        other => other,
    })?;
    Ok(())
}

pub(crate) async fn delete_master_product(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM master_products WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to the catalog lists outside a unit of work.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    pub async fn branches(&self) -> DbResult<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        fetch_names(&mut conn, NameList::Branches).await
    }

    pub async fn categories(&self) -> DbResult<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        fetch_names(&mut conn, NameList::Categories).await
    }

    pub async fn master_products(&self) -> DbResult<Vec<MasterProduct>> {
        let mut conn = self.pool.acquire().await?;
        fetch_master_products(&mut conn).await
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};

    use super::*;

    #[tokio::test]
    async fn test_names_are_unique_case_insensitively() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();

        insert_name(&mut conn, NameList::Branches, "Oslob", now).await.unwrap();
        insert_name(&mut conn, NameList::Branches, "Toledo", now).await.unwrap();
        let err = insert_name(&mut conn, NameList::Branches, "OSLOB", now)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        // Category names live in their own table
        insert_name(&mut conn, NameList::Categories, "Oslob", now).await.unwrap();

        assert!(delete_name(&mut conn, NameList::Branches, "oslob").await.unwrap());
        assert_eq!(
            fetch_names(&mut conn, NameList::Branches).await.unwrap(),
            vec!["Toledo".to_string()]
        );
    }

    #[tokio::test]
    async fn test_master_product_upsert() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let mut template = MasterProduct {
            id: "t1".to_string(),
            name: "Bolt".to_string(),
            sku: "BOLT-1".to_string(),
            category: "Hardware".to_string(),
            min_level: 10,
            cost_cents: 900,
            supplier: "Advance".to_string(),
            description: String::new(),
            last_updated: Utc::now(),
        };
        upsert_master_product(&mut conn, &template).await.unwrap();

        template.cost_cents = 950;
        upsert_master_product(&mut conn, &template).await.unwrap();

        let stored = fetch_master_products(&mut conn).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].cost_cents, 950);

        let clash = MasterProduct {
            id: "t2".to_string(),
            ..template.clone()
        };
        let err = upsert_master_product(&mut conn, &clash).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        assert!(delete_master_product(&mut conn, "t1").await.unwrap());
    }
}
