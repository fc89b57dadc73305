//! # Database Handle
//!
//! Opens the SQLite file the ledger lives in and hands out repositories and
//! units of work over one shared pool.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Database                                      │
//! │                                                                         │
//! │  DbConfig::new(path)  /  DbConfig::in_memory()                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new ─── pragmas ─── SqlitePool ─── embedded migrations      │
//! │       │                                                                 │
//! │       ├──► products() ledger() purchase_orders() catalog() invoices()  │
//! │       │        committed reads, one pooled connection per call         │
//! │       │                                                                 │
//! │       └──► begin() ──► UnitOfWork                                      │
//! │                 every mutation of one engine operation, one commit     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! File databases run in WAL mode so dashboard reads never wait on a sale
//! that is being written.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::{
    CatalogRepository, InvoiceRepository, LedgerRepository, ProductRepository,
    PurchaseOrderRepository,
};
use crate::unit_of_work::UnitOfWork;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Where the ledger lives and how many connections may touch it.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./data/nexus.db").max_connections(8)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Default: 5
    pub max_connections: u32,
    /// How long a writer waits on a locked file (and a caller on a free
    /// connection) before failing.
    pub busy_timeout: Duration,
}

impl DbConfig {
    /// A file database; the file is created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(30),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// A private in-memory database, gone when the pool closes.
    ///
    /// Held on a single connection: every SQLite `:memory:` connection is its
    /// own database.
    pub fn in_memory() -> Self {
        DbConfig {
            path: PathBuf::from(MEMORY_PATH),
            max_connections: 1,
            busy_timeout: Duration::from_secs(5),
        }
    }

    fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let url = format!("sqlite://{}?mode=rwc", self.path.display());
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true)
            // Batches cascade with their product; bins null out with theirs
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout);

        Ok(if self.is_in_memory() {
            options
        } else {
            options.journal_mode(SqliteJournalMode::Wal)
        })
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(1)
            .acquire_timeout(self.busy_timeout);

        if self.is_in_memory() {
            // Closing the last connection would drop the whole database
            options.idle_timeout(None).max_lifetime(None)
        } else {
            options.idle_timeout(Some(Duration::from_secs(600)))
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle over the ledger database. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.path.display(), "Opening ledger database");

        let options = config.connect_options()?;
        debug!(in_memory = config.is_in_memory(), "SQLite options ready");

        let pool = config
            .pool_options()
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        info!(max_connections = config.max_connections, "Ledger database pool open");

        migrations::run_migrations(&pool).await?;
        Ok(Database { pool })
    }

    /// The raw pool, for repository internals and tests.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts a unit of work (one SQLite transaction).
    ///
    /// ```rust,ignore
    /// let mut uow = db.begin().await?;
    /// let product = uow.require_product(&id).await?;
    /// // ...
    /// uow.commit().await?;
    /// ```
    pub async fn begin(&self) -> DbResult<UnitOfWork> {
        UnitOfWork::begin(&self.pool).await
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone())
    }

    pub fn purchase_orders(&self) -> PurchaseOrderRepository {
        PurchaseOrderRepository::new(self.pool.clone())
    }

    /// Branches, categories and master templates.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        info!("Closing ledger database");
        self.pool.close().await;
    }

    /// `true` when a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::migration_status;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        let status = migration_status(db.pool()).await.unwrap();
        assert!(status.known >= 1);
        assert!(status.is_current());
    }

    #[tokio::test]
    async fn test_in_memory_databases_are_isolated() {
        let a = Database::new(DbConfig::in_memory()).await.unwrap();
        let b = Database::new(DbConfig::in_memory()).await.unwrap();

        sqlx::query("INSERT INTO branches (name, created_at) VALUES ('Oslob', '2024-01-01T00:00:00Z')")
            .execute(a.pool())
            .await
            .unwrap();

        assert_eq!(a.catalog().branches().await.unwrap(), ["Oslob"]);
        assert!(b.catalog().branches().await.unwrap().is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/nexus.db")
            .max_connections(10)
            .busy_timeout(Duration::from_secs(2));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.busy_timeout, Duration::from_secs(2));
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
        assert_eq!(DbConfig::in_memory().max_connections, 1);
    }
}
