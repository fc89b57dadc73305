//! # nexus-db: Database Layer for Nexus Inventory
//!
//! SQLite storage for products, batches, the transaction ledger, purchase
//! orders, catalog lists and the invoice sequence, via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Nexus Inventory Data Flow                          │
//! │                                                                         │
//! │  nexus-engine operation (record_sale)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     nexus-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  UnitOfWork   │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │───►│ one SQLite tx │    │  (embedded)  │  │   │
//! │  │   │               │    │ version CAS   │    │              │  │   │
//! │  │   │ SqlitePool    │    └───────┬───────┘    │ 001_init.sql │  │   │
//! │  │   │ Repositories  │            │            └──────────────┘  │   │
//! │  │   └───────┬───────┘            │                               │   │
//! │  │           └──────────┬─────────┘                               │   │
//! │  │                      ▼                                         │   │
//! │  │          repository/* (shared SQL)                              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`unit_of_work`] - Transaction-scoped reads and versioned writes
//! - [`repository`] - SQL per aggregate and pooled read repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nexus_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("nexus.db")).await?;
//!
//! // Reads
//! let low = db.products().list(Some("Oslob")).await?;
//!
//! // Writes
//! let mut uow = db.begin().await?;
//! uow.append_transactions(&lines).await?;
//! uow.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use unit_of_work::UnitOfWork;

// Repository re-exports for convenience
pub use repository::{
    CatalogRepository, InvoiceRepository, InvoiceSequence, LedgerRepository, NameList,
    ProductRepository, PurchaseOrderRepository,
};
