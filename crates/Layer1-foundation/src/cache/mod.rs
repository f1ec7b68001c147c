//! # Response cache
//!
//! Bounded in-memory cache for generated code and validation reports.
//!
//! ```text
//! get ──► expired? ──yes──► remove, miss
//!           │ no
//!           ▼
//!         touch LRU tick, hit
//!
//! set ──► oversized? ──yes──► reject
//!           │ no
//!           ▼
//!         evict LRU until (count, bytes) fit, insert
//! ```
//!
//! [`CacheStore`] is the in-process backend. Callers that only need
//! get/set semantics should depend on [`ResponseCache`] so another backend
//! can be substituted without touching them.
//!
//! ## Modules
//!
//! - [`store`] - TTL + LRU store and background sweeper
//! - [`util`] - Hashing and size estimation

pub mod store;
pub mod util;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use store::{CacheEntry, CacheStore, CacheStoreConfig};
pub use util::{compute_hash, serialized_size, ApproxSize, Fingerprint};

/// Point-in-time cache counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    /// Entries removed because they expired
    pub cleanups: u64,
    pub hit_rate: f64,
    pub entries: usize,
    pub bytes: usize,
    pub max_entries: usize,
    pub max_bytes: usize,
}

/// Async cache backend
///
/// Errors from a backend are never fatal to callers; they treat a failed
/// `get` as a miss and a failed `set` as a no-op.
#[async_trait]
pub trait ResponseCache<V>: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<V>>;

    /// A zero `ttl` never expires
    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<bool>;

    async fn clear(&self) -> Result<()>;

    fn stats(&self) -> CacheStats;

    fn backend_name(&self) -> &'static str;
}
