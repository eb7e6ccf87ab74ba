//! # Storage Backend
//!
//! SQLite connection handling for the cache store.
//!
//! The backing file is exclusively owned by one [`CacheStore`](crate::CacheStore);
//! the pool is capped at a single connection because all operations are
//! serialized anyway and unsynchronized writers against the same file would
//! corrupt state.

use crate::{CacheError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for a cache store instance.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database file path or `:memory:` for an in-memory database
    pub database_url: String,

    /// Maximum time to wait for the connection when opening the store
    pub acquire_timeout: Duration,

    /// Schema version stamped on every write and expected on every read
    pub schema_version: i32,
}

impl StoreConfig {
    /// Create a configuration for the given database file path.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        Self {
            database_url: format!("sqlite:{}", path.display()),
            acquire_timeout: Duration::from_secs(30),
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    /// Create a configuration for an in-memory database (useful for testing).
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            acquire_timeout: Duration::from_secs(30),
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    /// Set the connection acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Override the schema version this store writes and expects.
    pub fn schema_version(mut self, version: i32) -> Self {
        self.schema_version = version;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Schema version stamped by the current writer format.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Open the backing connection for a cache store.
///
/// Applies the SQLite options this store relies on (WAL journal, NORMAL
/// synchronous mode, create-if-missing) and verifies the connection with a
/// health check before handing it out.
pub(crate) async fn create_pool(config: &StoreConfig) -> Result<Pool<Sqlite>> {
    info!(
        database_url = %config.database_url,
        schema_version = config.schema_version,
        "Opening cache store database"
    );

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(CacheError::Storage)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .create_if_missing(true);

    debug!("SQLite connection options configured");

    // Single connection: the store serializes every operation, and in-memory
    // databases would otherwise hand each connection its own empty database.
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to open cache store database");
            CacheError::Storage(e)
        })?;

    health_check(&pool).await?;

    Ok(pool)
}

/// Verify the database is reachable through the pool.
async fn health_check(pool: &Pool<Sqlite>) -> Result<()> {
    debug!("Performing database health check");

    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| {
        warn!(error = %e, "Database health check failed");
        CacheError::Storage(e)
    })?;

    debug!("Database health check passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_in_memory_pool() {
        let config = StoreConfig::in_memory();
        let pool = create_pool(&config).await;
        assert!(pool.is_ok(), "Should create in-memory pool successfully");
    }

    #[tokio::test]
    async fn test_health_check() {
        let pool = create_pool(&StoreConfig::in_memory()).await.unwrap();
        assert!(health_check(&pool).await.is_ok());
    }

    #[test]
    fn test_store_config_builder() {
        let config = StoreConfig::in_memory()
            .acquire_timeout(Duration::from_secs(60))
            .schema_version(3);

        assert_eq!(config.acquire_timeout, Duration::from_secs(60));
        assert_eq!(config.schema_version, 3);
    }
}
