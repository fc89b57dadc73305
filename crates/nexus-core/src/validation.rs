//! # Field Validation
//!
//! Shape checks on caller input, run before any stock is looked at. Rules
//! that need stock or catalog state (SKU uniqueness, branch existence,
//! over-receipt) live with the operations that own that state; the schema
//! repeats the hard ones as UNIQUE and CHECK constraints.
//!
//! ```rust
//! use nexus_core::validation::{validate_quantity, validate_sku};
//!
//! assert!(validate_sku("PIPE-1-DMG").is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;

pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Text
// =============================================================================

/// 1-64 characters of letters, digits, `-`, `_` and `.`; barcodes and
/// damage-bin SKUs (`<sku>-DMG`) both fit.
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 64,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, underscores and dots"
                .to_string(),
        });
    }

    Ok(())
}

/// Product or template name: non-blank, at most 200 characters.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 200)
}

/// Non-blank free text such as a supplier or a PO signatory.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    validate_text(field, value, 200)
}

/// Invoice numbers are opaque text: any non-blank value up to 64 chars.
pub fn validate_invoice_number(value: &str) -> ValidationResult<()> {
    validate_text("invoice_number", value, 64)
}

fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

// =============================================================================
// Quantities & Amounts
// =============================================================================

/// Sale, return, restock and PO-order quantities are strictly positive.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Receiving lines and opening stock may be zero.
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Zero is a valid price (damage bins, template products before pricing).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    validate_non_negative("price", cents)
}
