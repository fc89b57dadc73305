//! # Purchase Order Repository
//!
//! A purchase order is stored across three tables:
//!
//! ```text
//! purchase_orders ──1:N──► po_items     (line_no order, counters updated in place)
//!        │
//!        └────────1:N──► po_receipts  (append-only audit, line lists as JSON)
//! ```
//!
//! The header row carries the `version` checked on every update.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use nexus_core::{PoItem, PoStatus, PurchaseOrder, ReceivedQuantity, ReceivingRecord};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PurchaseOrderRow {
    id: String,
    po_number: String,
    status: PoStatus,
    supplier: String,
    branch: String,
    date_created: DateTime<Utc>,
    created_by: String,
    prepared_by: String,
    noted_by: String,
    notes: Option<String>,
    version: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct PoItemRow {
    product_id: Option<String>,
    template_id: Option<String>,
    product_name: String,
    sku: String,
    quantity_ordered: i64,
    quantity_received: i64,
    quantity_damaged: i64,
    unit_cost_cents: i64,
    unit: String,
}

impl From<PoItemRow> for PoItem {
    fn from(row: PoItemRow) -> Self {
        PoItem {
            product_id: row.product_id,
            template_id: row.template_id,
            product_name: row.product_name,
            sku: row.sku,
            quantity_ordered: row.quantity_ordered,
            quantity_received: row.quantity_received,
            quantity_damaged: row.quantity_damaged,
            unit_cost_cents: row.unit_cost_cents,
            unit: row.unit,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReceiptRow {
    id: String,
    date_received: DateTime<Utc>,
    invoice_reference: Option<String>,
    received_by: String,
    items_json: String,
    damaged_items_json: String,
}

impl ReceiptRow {
    fn into_record(self) -> DbResult<ReceivingRecord> {
        let items: Vec<ReceivedQuantity> = serde_json::from_str(&self.items_json)?;
        let damaged_items: Vec<ReceivedQuantity> = serde_json::from_str(&self.damaged_items_json)?;
        Ok(ReceivingRecord {
            id: self.id,
            date_received: self.date_received,
            invoice_reference: self.invoice_reference,
            received_by: self.received_by,
            items,
            damaged_items,
        })
    }
}

// =============================================================================
// Reads
// =============================================================================

pub(crate) async fn fetch_purchase_order(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<PurchaseOrder>> {
    let header = sqlx::query_as::<_, PurchaseOrderRow>(
        r#"
        SELECT id, po_number, status, supplier, branch, date_created, created_by,
               prepared_by, noted_by, notes, version
        FROM purchase_orders
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match header {
        Some(header) => Ok(Some(assemble(conn, header).await?)),
        None => Ok(None),
    }
}

/// Newest first.
pub(crate) async fn fetch_purchase_orders(
    conn: &mut SqliteConnection,
    branch: Option<&str>,
) -> DbResult<Vec<PurchaseOrder>> {
    let headers = sqlx::query_as::<_, PurchaseOrderRow>(
        r#"
        SELECT id, po_number, status, supplier, branch, date_created, created_by,
               prepared_by, noted_by, notes, version
        FROM purchase_orders
        WHERE (?1 IS NULL OR branch = ?1)
        ORDER BY date_created DESC, po_number DESC
        "#,
    )
    .bind(branch)
    .fetch_all(&mut *conn)
    .await?;

    let mut orders = Vec::with_capacity(headers.len());
    for header in headers {
        orders.push(assemble(conn, header).await?);
    }
    Ok(orders)
}

async fn assemble(conn: &mut SqliteConnection, header: PurchaseOrderRow) -> DbResult<PurchaseOrder> {
    let items = sqlx::query_as::<_, PoItemRow>(
        r#"
        SELECT product_id, template_id, product_name, sku, quantity_ordered,
               quantity_received, quantity_damaged, unit_cost_cents, unit
        FROM po_items
        WHERE po_id = ?1
        ORDER BY line_no
        "#,
    )
    .bind(&header.id)
    .fetch_all(&mut *conn)
    .await?;

    let receipts = sqlx::query_as::<_, ReceiptRow>(
        r#"
        SELECT id, date_received, invoice_reference, received_by, items_json,
               damaged_items_json
        FROM po_receipts
        WHERE po_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(&header.id)
    .fetch_all(&mut *conn)
    .await?;

    let receiving_history = receipts
        .into_iter()
        .map(ReceiptRow::into_record)
        .collect::<DbResult<Vec<_>>>()?;

    Ok(PurchaseOrder {
        id: header.id,
        po_number: header.po_number,
        status: header.status,
        supplier: header.supplier,
        branch: header.branch,
        date_created: header.date_created,
        created_by: header.created_by,
        prepared_by: header.prepared_by,
        noted_by: header.noted_by,
        items: items.into_iter().map(PoItem::from).collect(),
        notes: header.notes,
        receiving_history,
        version: header.version,
    })
}

pub(crate) async fn po_number_exists(conn: &mut SqliteConnection, po_number: &str) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchase_orders WHERE po_number = ?1")
        .bind(po_number)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

/// Number of PO numbers starting with `prefix`.
pub(crate) async fn count_po_numbers_with_prefix(
    conn: &mut SqliteConnection,
    prefix: &str,
) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM purchase_orders WHERE substr(po_number, 1, length(?1)) = ?1",
    )
    .bind(prefix)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

// =============================================================================
// Writes
// =============================================================================

pub(crate) async fn insert_purchase_order(
    conn: &mut SqliteConnection,
    po: &PurchaseOrder,
) -> DbResult<()> {
    debug!(po_id = %po.id, po_number = %po.po_number, items = po.items.len(), "Inserting purchase order");

    sqlx::query(
        r#"
        INSERT INTO purchase_orders (
            id, po_number, status, supplier, branch, date_created, created_by,
            prepared_by, noted_by, notes, version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)
        "#,
    )
    .bind(&po.id)
    .bind(&po.po_number)
    .bind(po.status)
    .bind(&po.supplier)
    .bind(&po.branch)
    .bind(po.date_created)
    .bind(&po.created_by)
    .bind(&po.prepared_by)
    .bind(&po.noted_by)
    .bind(&po.notes)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => DbError::duplicate("po_number", po.po_number.clone()),
        other => other,
    })?;

    for (line_no, item) in po.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO po_items (
                po_id, line_no, product_id, template_id, product_name, sku,
                quantity_ordered, quantity_received, quantity_damaged,
                unit_cost_cents, unit
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&po.id)
        .bind(line_no as i64)
        .bind(&item.product_id)
        .bind(&item.template_id)
        .bind(&item.product_name)
        .bind(&item.sku)
        .bind(item.quantity_ordered)
        .bind(item.quantity_received)
        .bind(item.quantity_damaged)
        .bind(item.unit_cost_cents)
        .bind(&item.unit)
        .execute(&mut *conn)
        .await?;
    }

    insert_receipts(conn, po).await
}

/// Writes status, item counters and new receipts back under a version check.
pub(crate) async fn update_purchase_order(
    conn: &mut SqliteConnection,
    po: &PurchaseOrder,
) -> DbResult<()> {
    debug!(po_id = %po.id, status = ?po.status, version = po.version, "Updating purchase order");

    let result = sqlx::query(
        r#"
        UPDATE purchase_orders
        SET status = ?1, notes = ?2, version = version + 1
        WHERE id = ?3 AND version = ?4
        "#,
    )
    .bind(po.status)
    .bind(&po.notes)
    .bind(&po.id)
    .bind(po.version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict("purchase order", po.id.clone()));
    }

    for (line_no, item) in po.items.iter().enumerate() {
        sqlx::query(
            r#"
            UPDATE po_items
            SET product_id = ?1, quantity_received = ?2, quantity_damaged = ?3
            WHERE po_id = ?4 AND line_no = ?5
            "#,
        )
        .bind(&item.product_id)
        .bind(item.quantity_received)
        .bind(item.quantity_damaged)
        .bind(&po.id)
        .bind(line_no as i64)
        .execute(&mut *conn)
        .await?;
    }

    insert_receipts(conn, po).await
}

/// Receipts already stored are left untouched.
async fn insert_receipts(conn: &mut SqliteConnection, po: &PurchaseOrder) -> DbResult<()> {
    for record in &po.receiving_history {
        sqlx::query(
            r#"
            INSERT INTO po_receipts (
                id, po_id, date_received, invoice_reference, received_by,
                items_json, damaged_items_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(&po.id)
        .bind(record.date_received)
        .bind(&record.invoice_reference)
        .bind(&record.received_by)
        .bind(serde_json::to_string(&record.items)?)
        .bind(serde_json::to_string(&record.damaged_items)?)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to purchase orders outside a unit of work.
#[derive(Debug, Clone)]
pub struct PurchaseOrderRepository {
    pool: SqlitePool,
}

impl PurchaseOrderRepository {
    /// Creates a new PurchaseOrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseOrderRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PurchaseOrder>> {
        debug!(id = %id, "Getting purchase order by ID");
        let mut conn = self.pool.acquire().await?;
        fetch_purchase_order(&mut conn, id).await
    }

    pub async fn list(&self, branch: Option<&str>) -> DbResult<Vec<PurchaseOrder>> {
        let mut conn = self.pool.acquire().await?;
        fetch_purchase_orders(&mut conn, branch).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::pool::{Database, DbConfig};

    use super::*;

    fn order() -> PurchaseOrder {
        PurchaseOrder {
            id: "po1".to_string(),
            po_number: "PO-20240105-0001".to_string(),
            status: PoStatus::PendingReceipt,
            supplier: "Advance".to_string(),
            branch: "Oslob".to_string(),
            date_created: Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap(),
            created_by: "Ana".to_string(),
            prepared_by: "Ana".to_string(),
            noted_by: "Ben".to_string(),
            items: vec![PoItem {
                product_id: None,
                template_id: Some("t1".to_string()),
                product_name: "Bolt".to_string(),
                sku: "BOLT-1".to_string(),
                quantity_ordered: 10,
                quantity_received: 0,
                quantity_damaged: 0,
                unit_cost_cents: 900,
                unit: "pcs".to_string(),
            }],
            notes: None,
            receiving_history: Vec::new(),
            version: 1,
        }
    }

    #[tokio::test]
    async fn test_round_trip_with_receiving_history() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let mut po = order();
        insert_purchase_order(&mut conn, &po).await.unwrap();
        assert!(po_number_exists(&mut conn, "PO-20240105-0001").await.unwrap());
        assert_eq!(count_po_numbers_with_prefix(&mut conn, "PO-20240105-").await.unwrap(), 1);

        po.items[0].product_id = Some("p1".to_string());
        po.items[0].quantity_received = 6;
        po.status = PoStatus::PartiallyReceived;
        po.receiving_history.push(ReceivingRecord {
            id: "r1".to_string(),
            date_received: Utc.with_ymd_and_hms(2024, 1, 6, 9, 0, 0).unwrap(),
            invoice_reference: Some("SI-77".to_string()),
            received_by: "Ana".to_string(),
            items: vec![ReceivedQuantity {
                product_id: "p1".to_string(),
                quantity: 6,
                reason: None,
            }],
            damaged_items: Vec::new(),
        });
        update_purchase_order(&mut conn, &po).await.unwrap();

        let stored = fetch_purchase_order(&mut conn, "po1").await.unwrap().unwrap();
        assert_eq!(stored.status, PoStatus::PartiallyReceived);
        assert_eq!(stored.version, 2);
        assert_eq!(stored.items[0].product_id.as_deref(), Some("p1"));
        assert_eq!(stored.receiving_history, po.receiving_history);

        // `po` still carries version 1
        let err = update_purchase_order(&mut conn, &po).await.unwrap_err();
        assert!(matches!(err, DbError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_po_number() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        insert_purchase_order(&mut conn, &order()).await.unwrap();

        let mut again = order();
        again.id = "po2".to_string();
        let err = insert_purchase_order(&mut conn, &again).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
