//! # Error Types
//!
//! Domain-specific error types for nexus-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  nexus-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  nexus-db errors (separate crate)                                      │
//! │  └── DbError          - Database failures, version conflicts           │
//! │                                                                         │
//! │  nexus-engine errors                                                   │
//! │  └── EngineError      - What callers see (code + message)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ─┐                                  │
//! │                           DbError ──┴─► EngineError → caller            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error is terminal for the call that raised it: the engine never
//! retries and never commits part of an operation.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A referenced product, purchase order, branch, category or template
    /// does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Requested quantity exceeds the active batch total.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale line (qty: 5)
    ///      │
    ///      ▼
    /// Σ active batches = 3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "BOLT-1", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole sale rejected, no batch touched
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Sell price is below the margin floor and no override was given.
    #[error("Price {price} for {product} is below the minimum of {min_price}")]
    MarginViolation {
        product: String,
        price: String,
        min_price: String,
    },

    /// Name or SKU collision.
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// A receiving call would push received + damaged over the ordered
    /// quantity for a PO item.
    #[error(
        "Receiving {requested} of {sku} exceeds the order: ordered {ordered}, received {received}, damaged {damaged}"
    )]
    OverQuantity {
        sku: String,
        ordered: i64,
        received: i64,
        damaged: i64,
        requested: i64,
    },

    /// The actor lacks the role the action requires.
    #[error("{actor} is not allowed to {action}")]
    Unauthorized { action: String, actor: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`].
    pub fn not_found(entity: &str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.to_string(),
            id: id.into(),
        }
    }

    /// Shorthand for [`CoreError::Duplicate`].
    pub fn duplicate(field: &str, value: impl Into<String>) -> Self {
        CoreError::Duplicate {
            field: field.to_string(),
            value: value.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any state is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Field cannot be edited in the current state.
    #[error("{field} cannot be changed: {reason}")]
    Immutable { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "BOLT-1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for BOLT-1: available 3, requested 5"
        );

        let err = CoreError::not_found("product", "p-404");
        assert_eq!(err.to_string(), "product not found: p-404");
    }

    #[test]
    fn test_over_quantity_message() {
        let err = CoreError::OverQuantity {
            sku: "PIPE-1".to_string(),
            ordered: 10,
            received: 6,
            damaged: 0,
            requested: 5,
        };
        assert!(err.to_string().contains("ordered 10, received 6"));
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "invoice_number".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
