//! # Invoice Sequence Repository
//!
//! The deployment-wide "next invoice number" lives in a single row
//! (`id = 1`) with a version column:
//!
//! ```text
//! ┌─────┬────────────┬─────────┐
//! │ id  │ next_value │ version │
//! ├─────┼────────────┼─────────┤
//! │  1  │ INV-0100   │   42    │
//! └─────┴────────────┴─────────┘
//! ```
//!
//! Before the first checkout the table is empty and callers fall back to a
//! configured seed.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// The stored counter and the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct InvoiceSequence {
    pub next_value: String,
    pub version: i64,
}

pub(crate) async fn fetch_sequence(conn: &mut SqliteConnection) -> DbResult<Option<InvoiceSequence>> {
    let row = sqlx::query_as::<_, InvoiceSequence>(
        "SELECT next_value, version FROM invoice_sequence WHERE id = 1",
    )
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Stores `next_value`.
///
/// `read_version` is the version the caller saw, or `None` if the row did
/// not exist yet. Either way a concurrent writer makes this fail with
/// `VersionConflict`.
pub(crate) async fn store_sequence(
    conn: &mut SqliteConnection,
    next_value: &str,
    read_version: Option<i64>,
) -> DbResult<()> {
    debug!(next_value = %next_value, read_version = ?read_version, "Storing invoice sequence");

    let result = match read_version {
        Some(version) => {
            sqlx::query(
                r#"
                UPDATE invoice_sequence
                SET next_value = ?1, version = version + 1
                WHERE id = 1 AND version = ?2
                "#,
            )
            .bind(next_value)
            .bind(version)
            .execute(&mut *conn)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                INSERT INTO invoice_sequence (id, next_value, version) VALUES (1, ?1, 1)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(next_value)
            .execute(&mut *conn)
            .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(DbError::conflict("invoice sequence", "1"));
    }
    Ok(())
}

/// Read access to the sequence outside a unit of work.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    pub async fn current(&self) -> DbResult<Option<InvoiceSequence>> {
        let mut conn = self.pool.acquire().await?;
        fetch_sequence(&mut conn).await
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};

    use super::*;

    #[tokio::test]
    async fn test_sequence_compare_and_swap() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        assert_eq!(fetch_sequence(&mut conn).await.unwrap(), None);

        store_sequence(&mut conn, "1001", None).await.unwrap();
        let err = store_sequence(&mut conn, "5000", None).await.unwrap_err();
        assert!(matches!(err, DbError::VersionConflict { .. }));

        store_sequence(&mut conn, "1002", Some(1)).await.unwrap();
        let err = store_sequence(&mut conn, "1003", Some(1)).await.unwrap_err();
        assert!(matches!(err, DbError::VersionConflict { .. }));

        // In-memory pools hold one connection
        drop(conn);
        assert_eq!(
            db.invoices().current().await.unwrap(),
            Some(InvoiceSequence {
                next_value: "1002".to_string(),
                version: 2,
            })
        );
    }
}
