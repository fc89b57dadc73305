//! # Engine Operations
//!
//! Every caller-facing operation, grouped by the component that owns it.
//! Each file adds an `impl Engine` block.
//!
//! ## Operation Categories
//! - **Catalog**: branches, categories, master templates, products, restock
//! - **Ledger**: transaction history, invoice lookup and delete
//! - **Sale**: explicit-invoice sales and POS checkout
//! - **Returns**: returns, write-offs and exchanges
//! - **Purchasing**: purchase orders and receiving
//! - **Invoice**: the invoice sequencer
//! - **Reports**: inventory summary and low stock

pub mod catalog;
pub mod invoice;
pub mod ledger;
pub mod purchasing;
pub mod reports;
pub mod returns;
pub mod sale;

use nexus_core::CoreError;
use tracing::warn;

use crate::error::EngineError;

/// Logs a rule violation before it becomes the caller's error.
pub(crate) fn rejected(operation: &'static str) -> impl FnOnce(CoreError) -> EngineError {
    move |err| {
        warn!(operation, error = %err, "Operation rejected");
        err.into()
    }
}
