//! # Engine Error Type
//!
//! The one error type every engine operation returns.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Nexus Inventory                        │
//! │                                                                         │
//! │  engine.record_sale(request)                                           │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Operation                                                       │  │
//! │  │  Result<T, EngineError>                                          │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Rule broken? ─── CoreError::InsufficientStock ────┐            │  │
//! │  │         │                                          │            │  │
//! │  │         ▼                                          ▼            │  │
//! │  │  Stale row? ───── DbError::VersionConflict ──── EngineError ───►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Committed ────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  Either way the unit of work is gone: committed, or dropped and        │
//! │  rolled back. Nothing is retried.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! ```json
//! {
//!   "code": "INSUFFICIENT_STOCK",
//!   "message": "Insufficient stock for BOLT-1: available 3, requested 5"
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use nexus_core::{CoreError, ValidationError};
use nexus_db::DbError;

/// Error returned from engine operations.
#[derive(Debug, Clone, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct EngineError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for engine responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Product, PO, branch, category, template or invoice is missing
    NotFound,

    /// Sale or depletion exceeds the active batch total
    InsufficientStock,

    /// Price below the margin floor without an override
    MarginViolation,

    /// SKU, name, PO number or invoice number already taken
    Duplicate,

    /// PO receipt would exceed the ordered quantity
    OverQuantity,

    /// Input validation failed
    ValidationError,

    /// Actor lacks the required role
    Unauthorized,

    /// A row changed since it was read
    Conflict,

    /// Database operation failed
    DatabaseError,

    /// Configuration could not be loaded
    ConfigError,

    /// Internal error
    Internal,
}

impl EngineError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        EngineError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        EngineError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn duplicate(field: &str, value: &str) -> Self {
        EngineError::new(
            ErrorCode::Duplicate,
            format!("{} '{}' already exists", field, value),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::new(ErrorCode::Internal, message)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Converts core errors to engine errors.
impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::NotFound { .. } => ErrorCode::NotFound,
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::MarginViolation { .. } => ErrorCode::MarginViolation,
            CoreError::Duplicate { .. } => ErrorCode::Duplicate,
            CoreError::OverQuantity { .. } => ErrorCode::OverQuantity,
            CoreError::Unauthorized { .. } => ErrorCode::Unauthorized,
            CoreError::Validation(_) => ErrorCode::ValidationError,
        };
        EngineError::new(code, err.to_string())
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::new(ErrorCode::ValidationError, err.to_string())
    }
}

/// Converts database errors to engine errors.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => EngineError::duplicate(&field, &value),
            DbError::VersionConflict { entity, id } => EngineError::new(
                ErrorCode::Conflict,
                format!("{} {} was modified concurrently; reload and retry", entity, id),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                EngineError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::ConnectionFailed(_) => {
                EngineError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                EngineError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                EngineError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                EngineError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                EngineError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                EngineError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        EngineError::new(ErrorCode::ConfigError, err.to_string())
    }
}
