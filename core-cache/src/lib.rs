//! # Durable Cache Store
//!
//! Local key-value cache with TTL expiration, schema versioning, and a
//! serialized access discipline, backed by SQLite.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite-backed persistence for opaque byte values (`db`, `store`)
//! - TTL and schema-version validity decisions (`policy`)
//! - Lazy purge of expired entries on read
//!
//! All operations against one [`CacheStore`] are serialized; results are
//! delivered through ordinary futures, so the invoking thread never blocks.
//!
//! ## Usage
//!
//! ```ignore
//! use core_cache::{CacheStore, StoreConfig};
//!
//! # async fn example() -> core_cache::Result<()> {
//! let store = CacheStore::open(StoreConfig::new("cache.db")).await?;
//!
//! store.set("team:42", b"payload".to_vec(), 60).await?;
//! let value = store.get("team:42").await?;
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod error;
pub mod policy;
pub mod store;

pub use error::{CacheError, Result};
pub use policy::{ttl, EntryMeta, Validity, TTL_NO_EXPIRY};
pub use store::{CacheEntry, CacheStats, CacheStore};
pub use db::StoreConfig;
