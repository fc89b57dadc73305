//! # nexus-core: Pure Business Logic for Nexus Inventory
//!
//! This crate is the **heart** of the inventory engine. It contains the
//! ledger and cost-accounting rules as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Nexus Inventory Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    nexus-engine                                 │   │
//! │  │    locks ──► unit of work ──► core algorithm ──► commit         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ nexus-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  ledger   │  │   sale    │  │  returns  │  │ purchase_ │  │   │
//! │  │   │ FIFO/cost │  │  margin   │  │ exchange  │  │  order    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK READS • PURE FUNCTIONS       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    nexus-db (Database Layer)                    │   │
//! │  │        SQLite queries, migrations, versioned write-back         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, StockBatch, Transaction, PurchaseOrder)
//! - [`money`] - Money type with integer arithmetic and the margin floor
//! - [`ledger`] - FIFO batch ledger and the `StockSet` working set
//! - [`sale`] - Multi-line sales
//! - [`returns`] - Returns and exchanges
//! - [`purchase_order`] - PO creation and receiving state machine
//! - [`invoice`] - Invoice/PO number sequencing
//! - [`catalog`] - Product, template, branch and category rules
//! - [`pricing`] / [`access`] - Margin gate and role checks
//! - [`report`] - Dashboard totals
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: callers pass `now`; nothing here reads a clock
//! 2. **All or Nothing**: multi-line operations validate before mutating
//! 3. **Integer Money**: all monetary values are cents (i64)
//! 4. **Explicit Errors**: typed errors, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use nexus_core::ledger::StockSet;
//! use nexus_core::pricing::MarginPolicy;
//! use nexus_core::sale::{apply_sale, SaleLine, SaleRequest};
//! use nexus_core::{Actor, Money, Product};
//!
//! # fn product() -> Product {
//! #     Product {
//! #         id: "p1".into(), name: "Bolt".into(), sku: "BOLT-1".into(),
//! #         category: "Hardware".into(), branch: "Oslob".into(), quantity: 0,
//! #         min_level: 0, price_cents: 2000, cost_cents: 0, supplier: String::new(),
//! #         description: String::new(), last_updated: Utc::now(),
//! #         last_restock_date: None, last_restock_quantity: None, damage_of: None,
//! #         batches: vec![], version: 1,
//! #     }
//! # }
//! let now = Utc::now();
//! let mut bolt = product();
//! bolt.append_batch(10, Money::from_cents(1000), now);
//!
//! let mut stock = StockSet::new(vec![bolt]);
//! let request = SaleRequest {
//!     lines: vec![SaleLine::new("p1", 3, 2000)],
//!     actor: Actor::staff("Jun"),
//!     payment_method: None,
//!     reference_no: None,
//!     date: None,
//! };
//! let receipt = apply_sale(&mut stock, &request, "1001", &MarginPolicy::default(), now).unwrap();
//! assert_eq!(receipt.subtotal_cents, 6000);
//! assert_eq!(stock.get("p1").unwrap().quantity, 7);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod catalog;
pub mod error;
pub mod invoice;
pub mod ledger;
pub mod money;
pub mod pricing;
pub mod purchase_order;
pub mod report;
pub mod returns;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use nexus_core::Money` instead of
// `use nexus_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::{StockChanges, StockSet};
pub use money::Money;
pub use pricing::{MarginPolicy, PriceOverride};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Branches a fresh deployment starts with.
pub const DEFAULT_BRANCHES: &[&str] = &[
    "Oslob",
    "Dalaguete",
    "Toledo",
    "Danao",
    "Kabankalan",
    "Siquijor",
    "Bogo",
];

/// Categories a fresh deployment starts with.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Hardware",
    "Electrical Supplies",
    "Paints & Coatings",
    "Plumbing",
    "Tools",
    "Machinery",
    "Office Supplies",
    "Construction",
    "Safety Gear",
    "Outdoor",
    "Plumbing Supplies",
];
