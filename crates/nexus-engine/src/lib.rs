//! # Nexus Engine
//!
//! The caller-facing inventory engine: every ledger operation as one async
//! method on [`Engine`].
//!
//! ## Module Organization
//! ```text
//! nexus_engine/
//! ├── lib.rs          ◄─── You are here (Engine, tracing setup)
//! ├── config.rs       ◄─── EngineConfig (defaults → nexus.toml → env)
//! ├── locks.rs        ◄─── Per-aggregate async locks
//! ├── error.rs        ◄─── EngineError { code, message }
//! └── operations/
//!     ├── catalog.rs     ◄─── Branches, categories, templates, products
//!     ├── ledger.rs      ◄─── Transaction history, invoice delete
//!     ├── sale.rs        ◄─── record_sale, checkout
//!     ├── returns.rs     ◄─── process_return (+ exchange)
//!     ├── purchasing.rs  ◄─── Purchase orders and receiving
//!     ├── invoice.rs     ◄─── Invoice sequencer
//!     └── reports.rs     ◄─── Dashboard totals
//! ```
//!
//! ## Anatomy of a Mutation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    engine.record_sale(request)                          │
//! │                                                                         │
//! │  1. Lock ─────────────── product:p1, product:p7, invoice:1042 (sorted) │
//! │  2. Begin ────────────── db.begin() → UnitOfWork                       │
//! │  3. Read ─────────────── uow.load_products_by_id([p1, p7])             │
//! │  4. Apply ────────────── nexus_core::sale::apply_sale (pure)           │
//! │  5. Write ────────────── uow.save_stock (version CAS)                  │
//! │                          uow.append_transactions                       │
//! │  6. Commit ───────────── uow.commit()                                  │
//! │  7. Unlock ───────────── LockSet dropped                               │
//! │                                                                         │
//! │  Any error in 3-6 drops the unit of work: nothing is written.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod locks;
pub mod operations;

#[cfg(test)]
pub(crate) mod testing;

use chrono::{DateTime, Utc};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, EngineResult, ErrorCode};
pub use locks::LockRegistry;

use nexus_core::MarginPolicy;
use nexus_db::{Database, DbConfig};

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,nexus=debug,sqlx=warn";

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides [`DEFAULT_LOG_FILTER`]. Calling it twice is harmless.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

// =============================================================================
// Engine
// =============================================================================

/// Inventory engine handle. Cheap to clone; clones share the pool and locks.
#[derive(Debug, Clone)]
pub struct Engine {
    db: Database,
    locks: LockRegistry,
    config: EngineConfig,
    policy: MarginPolicy,
}

impl Engine {
    /// Opens (creating if needed) the configured database and applies
    /// migrations.
    pub async fn open(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let path = config.database_path()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EngineError::new(
                        ErrorCode::ConfigError,
                        format!("Cannot create {}: {}", parent.display(), e),
                    )
                })?;
            }
        }
        info!(?path, "Opening inventory database");

        let db = Database::new(
            DbConfig::new(path).max_connections(config.database.max_connections),
        )
        .await?;

        Ok(Self::with_database(db, config))
    }

    /// Wraps an already open database (tests use an in-memory one).
    pub fn with_database(db: Database, config: EngineConfig) -> Self {
        let policy = config.margin_policy();
        info!(
            min_margin_bps = policy.min_margin_bps,
            invoice_seed = %config.invoice.seed,
            "Engine ready"
        );
        Engine {
            db,
            locks: LockRegistry::new(),
            config,
            policy,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn margin_policy(&self) -> &MarginPolicy {
        &self.policy
    }

    pub(crate) fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Closes the pool.
    pub async fn close(&self) {
        self.db.close().await;
    }
}
