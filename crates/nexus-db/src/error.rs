//! # Database Errors
//!
//! ```text
//! sqlx::Error ──► DbError ──► EngineError { code, message }   (nexus-engine)
//!                    │
//!                    ├── UNIQUE constraint failed ──► UniqueViolation
//!                    ├── version CAS missed ────────► VersionConflict
//!                    └── anything else ─────────────► QueryFailed / Internal
//! ```

use thiserror::Error;

/// Everything a repository or unit of work can fail with.
///
/// Constraint failures are classified so the engine can answer `Duplicate`
/// or `Conflict` instead of a generic database error.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the row: (branch, sku) on products, template
    /// SKU, PO number, branch or category name.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A compare-and-swap on `version` matched no row: someone else
    /// committed a newer copy of the aggregate since it was read.
    #[error("{entity} {id} was modified concurrently")]
    VersionConflict { entity: String, id: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Any other statement error (CHECK constraints included).
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// BEGIN, COMMIT or ROLLBACK itself failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::VersionConflict {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// SQLite reports constraint kinds only in the message text, so that is
/// what gets inspected.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("row", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: products.branch, products.sku"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .map(unique_columns)
                        .unwrap_or_else(|| "unknown".to_string());
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// `"products.branch, products.sku"` → `"branch, sku"`
fn unique_columns(columns: &str) -> String {
    columns
        .split(", ")
        .map(|c| c.rsplit('.').next().unwrap_or(c))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Internal(format!("malformed stored JSON: {}", err))
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_columns_strips_table_prefix() {
        assert_eq!(unique_columns("products.branch, products.sku"), "branch, sku");
        assert_eq!(unique_columns("master_products.sku"), "sku");
    }
}
