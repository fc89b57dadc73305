//! # Transaction Ledger Repository
//!
//! Append-only storage for IN / OUT / RETURN lines.
//!
//! Lines are only ever inserted, or removed wholesale by invoice number.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use nexus_core::{Transaction, TransactionType};

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    product_id: String,
    product_name: String,
    kind: TransactionType,
    quantity: i64,
    date: DateTime<Utc>,
    user_name: String,
    branch: String,
    unit_cost_cents: i64,
    total_cents: i64,
    price_cents: Option<i64>,
    invoice_number: Option<String>,
    notes: Option<String>,
    payment_method: Option<String>,
    reference_no: Option<String>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Transaction {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            kind: row.kind,
            quantity: row.quantity,
            date: row.date,
            user: row.user_name,
            branch: row.branch,
            unit_cost_cents: row.unit_cost_cents,
            total_cents: row.total_cents,
            price_cents: row.price_cents,
            invoice_number: row.invoice_number,
            notes: row.notes,
            payment_method: row.payment_method,
            reference_no: row.reference_no,
        }
    }
}

const SELECT_TRANSACTION: &str = r#"
    SELECT id, product_id, product_name, kind, quantity, date, user_name, branch,
           unit_cost_cents, total_cents, price_cents, invoice_number, notes,
           payment_method, reference_no
    FROM stock_transactions
"#;

pub(crate) async fn insert_transactions(
    conn: &mut SqliteConnection,
    transactions: &[Transaction],
) -> DbResult<()> {
    for tx in transactions {
        debug!(
            transaction_id = %tx.id,
            kind = tx.kind.as_str(),
            product_id = %tx.product_id,
            quantity = tx.quantity,
            "Appending ledger line"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_transactions (
                id, product_id, product_name, kind, quantity, date, user_name, branch,
                unit_cost_cents, total_cents, price_cents, invoice_number, notes,
                payment_method, reference_no
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&tx.id)
        .bind(&tx.product_id)
        .bind(&tx.product_name)
        .bind(tx.kind)
        .bind(tx.quantity)
        .bind(tx.date)
        .bind(&tx.user)
        .bind(&tx.branch)
        .bind(tx.unit_cost_cents)
        .bind(tx.total_cents)
        .bind(tx.price_cents)
        .bind(&tx.invoice_number)
        .bind(&tx.notes)
        .bind(&tx.payment_method)
        .bind(&tx.reference_no)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Newest first.
pub(crate) async fn fetch_transactions(
    conn: &mut SqliteConnection,
    branch: Option<&str>,
) -> DbResult<Vec<Transaction>> {
    let rows = sqlx::query_as::<_, TransactionRow>(&format!(
        "{SELECT_TRANSACTION} WHERE (?1 IS NULL OR branch = ?1) ORDER BY date DESC, rowid DESC"
    ))
    .bind(branch)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(Transaction::from).collect())
}

/// Lines of one invoice in the order they were written.
pub(crate) async fn fetch_invoice_lines(
    conn: &mut SqliteConnection,
    invoice_number: &str,
) -> DbResult<Vec<Transaction>> {
    let rows = sqlx::query_as::<_, TransactionRow>(&format!(
        "{SELECT_TRANSACTION} WHERE invoice_number = ?1 ORDER BY rowid"
    ))
    .bind(invoice_number)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(Transaction::from).collect())
}

/// Number of OUT lines already written under `invoice_number`.
pub(crate) async fn count_invoice_sales(
    conn: &mut SqliteConnection,
    invoice_number: &str,
) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM stock_transactions WHERE invoice_number = ?1 AND kind = 'OUT'",
    )
    .bind(invoice_number)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

/// Removes every line of an invoice, returning how many went.
pub(crate) async fn delete_invoice(conn: &mut SqliteConnection, invoice_number: &str) -> DbResult<u64> {
    debug!(invoice = %invoice_number, "Deleting invoice lines");

    let result = sqlx::query("DELETE FROM stock_transactions WHERE invoice_number = ?1")
        .bind(invoice_number)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Read access to the ledger outside a unit of work.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Ledger lines, newest first, optionally for one branch.
    pub async fn list(&self, branch: Option<&str>) -> DbResult<Vec<Transaction>> {
        debug!(branch = ?branch, "Listing transactions");
        let mut conn = self.pool.acquire().await?;
        fetch_transactions(&mut conn, branch).await
    }

    /// All lines sharing an invoice number.
    pub async fn invoice_lines(&self, invoice_number: &str) -> DbResult<Vec<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        fetch_invoice_lines(&mut conn, invoice_number).await
    }

    /// Ledger lines recorded against one product, newest first.
    pub async fn for_product(&self, product_id: &str) -> DbResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{SELECT_TRANSACTION} WHERE product_id = ?1 ORDER BY date DESC, rowid DESC"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Transaction::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::pool::{Database, DbConfig};

    use super::*;

    fn line(id: &str, kind: TransactionType, invoice: &str, day: u32) -> Transaction {
        Transaction {
            id: id.to_string(),
            product_id: "p1".to_string(),
            product_name: "Bolt".to_string(),
            kind,
            quantity: 2,
            date: Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap(),
            user: "Jun".to_string(),
            branch: "Oslob".to_string(),
            unit_cost_cents: 1000,
            total_cents: 4000,
            price_cents: Some(2000),
            invoice_number: Some(invoice.to_string()),
            notes: None,
            payment_method: Some("Cash".to_string()),
            reference_no: None,
        }
    }

    #[tokio::test]
    async fn test_invoice_lines_and_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        insert_transactions(
            &mut conn,
            &[
                line("t1", TransactionType::Out, "1001", 1),
                line("t2", TransactionType::Return, "1001", 2),
                line("t3", TransactionType::Out, "1002", 3),
            ],
        )
        .await
        .unwrap();

        assert_eq!(count_invoice_sales(&mut conn, "1001").await.unwrap(), 1);
        let lines = fetch_invoice_lines(&mut conn, "1001").await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].kind, TransactionType::Return);
        assert_eq!(lines[0].user, "Jun");

        let newest = fetch_transactions(&mut conn, Some("Oslob")).await.unwrap();
        assert_eq!(newest[0].id, "t3");

        assert_eq!(delete_invoice(&mut conn, "1001").await.unwrap(), 2);
        assert_eq!(fetch_transactions(&mut conn, None).await.unwrap().len(), 1);
    }
}
