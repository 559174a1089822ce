//! # Assignment Database
//!
//! SQLite persistence for the assignment engine. The pool-level
//! [`AssignmentDatabase`] owns connections and schema setup, while the store
//! submodules expose two layers:
//!
//! - free functions taking `&mut SqliteConnection`, so they can run inside any
//!   transaction (the orchestrator's own, or one opened by report intake)
//! - small store structs (`CatalogStore`, `ReportStore`, `LedgerStore`) that
//!   acquire a pooled connection for one-off reads and catalog maintenance
//!
//! ## Tables
//!
//! - `cities`, `issue_categories`, `authorities`, `authority_categories`:
//!   the routing catalog, read-only during decisions
//! - `reports`: the nullable `authority_id` column is owned by the orchestrator
//! - `assignment_ledger`: append-only; UPDATE and DELETE are rejected by triggers

pub mod schema;
pub mod catalog_store;
pub mod report_store;
pub mod ledger_store;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, error, info};

use crate::config::AssignmentConfig;
use crate::Result;

pub use catalog_store::CatalogStore;
pub use ledger_store::LedgerStore;
pub use report_store::ReportStore;

/// Pool-backed database handle shared by the stores and the orchestrator
#[derive(Clone, Debug)]
pub struct AssignmentDatabase {
    pool: SqlitePool,
}

impl AssignmentDatabase {
    /// Open (creating if missing) the database named by the configuration
    pub async fn connect(config: &AssignmentConfig) -> Result<Self> {
        info!("🗄️ Opening assignment database at: {}", config.database_url);

        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        let database = Self { pool };
        database.initialize_schema().await?;

        info!("✅ Assignment database ready");
        Ok(database)
    }

    /// Open a database by URL with default pool settings
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::connect(&AssignmentConfig::with_database_url(database_url)).await
    }

    /// Single-connection in-memory database for tests and dry runs
    pub async fn new_in_memory() -> Result<Self> {
        debug!("🗄️ Creating in-memory assignment database");

        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // The database lives and dies with its only connection, so it must never be recycled.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let database = Self { pool };
        database.initialize_schema().await?;
        Ok(database)
    }

    async fn initialize_schema(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        schema::create_all(&mut *conn).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a transaction; dropping it without commit rolls everything back
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Execute a health check query
    pub async fn health_check(&self) -> Result<bool> {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => {
                debug!("💚 Database health check passed");
                Ok(true)
            }
            Err(e) => {
                error!("❌ Database health check failed: {}", e);
                Ok(false)
            }
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
