//! # Repository Module
//!
//! Database repository implementations for Nexus Inventory.
//!
//! ## Two Access Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Reads outside an operation          Engine mutations                   │
//! │  ─────────────────────────           ─────────────────                  │
//! │  db.products().list(branch)          let mut uow = db.begin().await?;   │
//! │       │                              uow.load_product(id) ...           │
//! │       │                              uow.save_stock(&changes) ...       │
//! │       │                              uow.commit().await?;               │
//! │       ▼                                   │                             │
//! │  XxxRepository { pool }                   ▼                             │
//! │       │                              UnitOfWork { transaction }         │
//! │       └──────────────┬────────────────────┘                             │
//! │                      ▼                                                  │
//! │        pub(crate) fn fetch_xxx(&mut SqliteConnection, ..)               │
//! │        (one copy of every SQL statement)                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Products with their FIFO batches
//! - [`LedgerRepository`] - IN / OUT / RETURN lines
//! - [`PurchaseOrderRepository`] - Purchase orders and receiving history
//! - [`CatalogRepository`] - Branches, categories, master templates
//! - [`InvoiceRepository`] - The invoice sequence

pub mod catalog;
pub mod invoice;
pub mod ledger;
pub mod product;
pub mod purchase_order;

pub use catalog::{CatalogRepository, NameList};
pub use invoice::{InvoiceRepository, InvoiceSequence};
pub use ledger::LedgerRepository;
pub use product::ProductRepository;
pub use purchase_order::PurchaseOrderRepository;
