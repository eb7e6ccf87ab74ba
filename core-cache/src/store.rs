//! # Cache Store Manager
//!
//! Public key-value API over the SQLite backend. Owns the backend's
//! lifecycle and serializes every operation through one lock, so concurrent
//! callers never interleave against the same store.
//!
//! ## Semantics
//!
//! - `set` overwrites whole entries, stamping the current time and the
//!   store's schema version
//! - `get` purges expired entries lazily; a version-mismatched entry is
//!   reported but kept, so the caller can decide to overwrite
//! - `remove` is idempotent; `clear` is atomic with respect to concurrent
//!   reads and writes
//!
//! Storage failures are reported, never retried here; retry policy belongs
//! to the caller.

use crate::db::{self, StoreConfig};
use crate::error::{CacheError, Result};
use crate::policy::{self, EntryMeta, Validity};
use bridge_types::time::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One stored cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Opaque identifier, unique within the store
    pub key: String,
    /// Opaque byte payload (caller-defined encoding)
    pub value: Vec<u8>,
    /// Unix timestamp of the write
    pub stored_at: i64,
    /// Expiry window in seconds
    pub ttl_seconds: i64,
    /// Schema version stamped at write time
    pub schema_version: i32,
}

impl CacheEntry {
    /// Metadata view consulted by the validity policy.
    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            stored_at: self.stored_at,
            ttl_seconds: self.ttl_seconds,
            schema_version: self.schema_version,
        }
    }
}

/// Aggregate statistics over the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total entries on disk, live or not
    pub total_entries: u64,
    /// Entries still within their TTL window
    pub live_entries: u64,
    /// Entries past their TTL but not yet purged
    pub expired_entries: u64,
    /// Total payload bytes on disk
    pub total_bytes: u64,
    /// Unix timestamp the snapshot was taken
    pub calculated_at: i64,
}

/// Durable key-value cache with TTL expiration and schema versioning.
///
/// Exclusively owns its backing database. Cloning shares the same store
/// instance, so serialization holds across clones.
#[derive(Clone)]
pub struct CacheStore {
    pool: SqlitePool,
    // Serializes all operations: single writer, single reader at a time.
    op_lock: Arc<Mutex<()>>,
    clock: Arc<dyn Clock>,
    schema_version: i32,
}

impl CacheStore {
    /// Open a cache store, creating the backing database and schema if
    /// needed.
    ///
    /// Must complete before any operation is issued; this is the store's
    /// initialization-order contract with its callers.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Open a cache store with an injected time source.
    pub async fn open_with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let pool = db::create_pool(&config).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL,
                stored_at INTEGER NOT NULL,
                ttl_seconds INTEGER NOT NULL,
                schema_version INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(CacheError::Storage)?;

        info!(
            schema_version = config.schema_version,
            "Cache store initialized"
        );

        Ok(Self {
            pool,
            op_lock: Arc::new(Mutex::new(())),
            clock,
            schema_version: config.schema_version,
        })
    }

    /// Store `value` under `key` with the given TTL window in seconds.
    ///
    /// Overwrites any existing entry for the key, stamping the current time
    /// and the store's schema version. Use
    /// [`TTL_NO_EXPIRY`](crate::TTL_NO_EXPIRY) for entries that must not
    /// expire.
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: i64) -> Result<()> {
        validate_key(key)?;
        if ttl_seconds < 0 {
            return Err(CacheError::InvalidInput {
                field: "ttl_seconds".to_string(),
                message: format!("must be non-negative, got {}", ttl_seconds),
            });
        }

        let _guard = self.op_lock.lock().await;
        let now = self.clock.unix_timestamp();
        let size = value.len();

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, stored_at, ttl_seconds, schema_version)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                stored_at = excluded.stored_at,
                ttl_seconds = excluded.ttl_seconds,
                schema_version = excluded.schema_version
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .bind(ttl_seconds)
        .bind(self.schema_version)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(key = %key, error = %e, "Cache write failed");
            CacheError::Storage(e)
        })?;

        debug!(key = %key, bytes = size, ttl_seconds, "Cache entry stored");
        Ok(())
    }

    /// Retrieve the value stored under `key`, expecting the store's own
    /// schema version.
    ///
    /// Returns `Ok(None)` for an absent key. An expired entry is purged and
    /// reported as [`CacheError::Expired`]; a subsequent `get` sees an
    /// absent key. A version-mismatched entry is reported but retained.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get_versioned(key, self.schema_version).await
    }

    /// Retrieve the value stored under `key`, declaring the schema version
    /// the caller expects.
    pub async fn get_versioned(&self, key: &str, expected_version: i32) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;

        let _guard = self.op_lock.lock().await;

        let row = sqlx::query(
            "SELECT value, stored_at, ttl_seconds, schema_version FROM cache_entries WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(key = %key, error = %e, "Cache read failed");
            CacheError::Retrieval(e)
        })?;

        let Some(row) = row else {
            debug!(key = %key, "Cache miss");
            return Ok(None);
        };

        let entry = CacheEntry {
            key: key.to_string(),
            value: row.get("value"),
            stored_at: row.get("stored_at"),
            ttl_seconds: row.get("ttl_seconds"),
            schema_version: row.get("schema_version"),
        };

        let now = self.clock.unix_timestamp();
        match policy::evaluate(&entry.meta(), now, expected_version) {
            Validity::Valid => {
                debug!(key = %key, bytes = entry.value.len(), "Cache hit");
                Ok(Some(entry.value))
            }
            Validity::Expired => {
                // Lazy purge: expired entries are deleted, not merely hidden.
                self.delete_row(key).await.map_err(|e| match e {
                    CacheError::Storage(inner) => CacheError::Retrieval(inner),
                    other => other,
                })?;

                let expired_for_seconds = now.saturating_sub(entry.meta().deadline());
                debug!(key = %key, expired_for_seconds, "Cache entry expired, purged");
                Err(CacheError::Expired {
                    key: key.to_string(),
                    expired_for_seconds,
                })
            }
            Validity::VersionMismatch => {
                debug!(
                    key = %key,
                    stored = entry.schema_version,
                    expected = expected_version,
                    "Cache entry schema version mismatch"
                );
                Err(CacheError::VersionMismatch {
                    key: key.to_string(),
                    stored: entry.schema_version,
                    expected: expected_version,
                })
            }
        }
    }

    /// Remove the entry stored under `key`.
    ///
    /// Idempotent: removing an absent key succeeds.
    pub async fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        let _guard = self.op_lock.lock().await;
        self.delete_row(key).await?;

        debug!(key = %key, "Cache entry removed");
        Ok(())
    }

    /// Remove every entry.
    ///
    /// Runs as a single statement under the store lock, so no concurrent
    /// operation observes a partially cleared store.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let result = sqlx::query("DELETE FROM cache_entries")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Cache clear failed");
                CacheError::Clear(e)
            })?;

        info!(removed = result.rows_affected(), "Cache cleared");
        Ok(())
    }

    /// Bulk-delete every entry past its TTL window.
    ///
    /// Counterpart of the lazy purge on `get`, for hosts that want to sweep
    /// on a maintenance schedule. Returns the number of entries removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let _guard = self.op_lock.lock().await;
        let now = self.clock.unix_timestamp();

        let result = sqlx::query("DELETE FROM cache_entries WHERE ? > stored_at + ttl_seconds")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(CacheError::Storage)?;

        let purged = result.rows_affected();
        if purged > 0 {
            info!(purged, "Purged expired cache entries");
        }
        Ok(purged)
    }

    /// Snapshot aggregate statistics over the store.
    pub async fn stats(&self) -> Result<CacheStats> {
        let _guard = self.op_lock.lock().await;
        let now = self.clock.unix_timestamp();

        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) as total_entries,
                COALESCE(SUM(CASE WHEN ? > stored_at + ttl_seconds THEN 1 ELSE 0 END), 0) as expired_entries,
                COALESCE(SUM(LENGTH(value)), 0) as total_bytes
            FROM cache_entries
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(CacheError::Retrieval)?;

        let total_entries = row.get::<i64, _>("total_entries") as u64;
        let expired_entries = row.get::<i64, _>("expired_entries") as u64;

        Ok(CacheStats {
            total_entries,
            live_entries: total_entries - expired_entries,
            expired_entries,
            total_bytes: row.get::<i64, _>("total_bytes") as u64,
            calculated_at: now,
        })
    }

    // Callers hold the operation lock.
    async fn delete_row(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(key = %key, error = %e, "Cache delete failed");
                CacheError::Storage(e)
            })?;
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidInput {
            field: "key".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(())
}
