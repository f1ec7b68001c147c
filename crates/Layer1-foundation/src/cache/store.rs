//! In-memory response cache with TTL expiry and LRU + byte-budget eviction
//!
//! All mutation goes through one mutex so eviction bookkeeping and the
//! background sweep never interleave with `get`/`set`. Counters are atomics
//! and can be read without taking the lock.

use super::util::ApproxSize;
use super::{CacheStats, ResponseCache};
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Capacity limits for a [`CacheStore`]
#[derive(Debug, Clone)]
pub struct CacheStoreConfig {
    /// Maximum number of entries
    pub max_entries: usize,
    /// Maximum approximate bytes (0 = unlimited)
    pub max_bytes: usize,
}

impl Default for CacheStoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            max_bytes: 0,
        }
    }
}

impl CacheStoreConfig {
    pub fn with_entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Default::default()
        }
    }

    pub fn with_limits(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            max_entries,
            max_bytes,
        }
    }
}

/// A single cached value
#[derive(Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    /// `None` = never expires
    pub expires_at: Option<Instant>,
    pub last_accessed: Instant,
    pub approx_size: usize,
    /// Monotonic access tick; the smallest tick is the LRU victim
    access_tick: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

#[derive(Debug)]
struct StoreInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    access_counter: u64,
    current_bytes: usize,
}

impl<V> StoreInner<V> {
    fn next_tick(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.current_bytes = self.current_bytes.saturating_sub(entry.approx_size);
        Some(entry)
    }

    fn lru_key(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, e)| e.access_tick)
            .map(|(k, _)| k.clone())
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    evictions: AtomicU64,
    cleanups: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// TTL + LRU cache keyed by string
#[derive(Debug)]
pub struct CacheStore<V> {
    inner: Mutex<StoreInner<V>>,
    counters: Counters,
    config: CacheStoreConfig,
}

impl<V: Clone + ApproxSize> CacheStore<V> {
    pub fn new(max_entries: usize) -> Self {
        Self::with_config(CacheStoreConfig::with_entries(max_entries))
    }

    pub fn with_config(config: CacheStoreConfig) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::with_capacity(config.max_entries.min(1024)),
                access_counter: 0,
                current_bytes: 0,
            }),
            counters: Counters::default(),
            config,
        }
    }

    pub fn config(&self) -> &CacheStoreConfig {
        &self.config
    }

    /// Look up a value, refreshing its LRU position.
    ///
    /// Expired entries are removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(key) {
            None => {
                Counters::bump(&self.counters.misses, 1);
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            inner.remove(key);
            Counters::bump(&self.counters.cleanups, 1);
            Counters::bump(&self.counters.misses, 1);
            debug!(key, "Cache entry expired on read");
            return None;
        }

        let tick = inner.next_tick();
        let entry = inner.entries.get_mut(key)?;
        entry.last_accessed = now;
        entry.access_tick = tick;
        Counters::bump(&self.counters.hits, 1);
        Some(entry.value.clone())
    }

    /// Insert a value. A zero `ttl` never expires.
    ///
    /// Returns `false` when the entry alone exceeds the byte budget and was
    /// rejected.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) -> bool {
        let key = key.into();
        let now = Instant::now();
        let approx_size = value.approx_size();

        if self.config.max_bytes > 0 && approx_size > self.config.max_bytes {
            warn!(
                key = %key,
                size = approx_size,
                max_bytes = self.config.max_bytes,
                "Cache entry larger than the byte budget, not cached"
            );
            return false;
        }

        let mut inner = self.inner.lock();

        // Replacing a key frees its old slot before eviction is considered
        inner.remove(&key);

        let mut evicted = 0u64;
        while !inner.entries.is_empty()
            && (inner.entries.len() >= self.config.max_entries
                || (self.config.max_bytes > 0
                    && inner.current_bytes + approx_size > self.config.max_bytes))
        {
            match inner.lru_key() {
                Some(victim) => {
                    inner.remove(&victim);
                    evicted += 1;
                    debug!(key = %victim, "Cache LRU eviction");
                }
                None => break,
            }
        }

        let tick = inner.next_tick();
        inner.current_bytes += approx_size;
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: (!ttl.is_zero()).then(|| now + ttl),
                last_accessed: now,
                approx_size,
                access_tick: tick,
            },
        );

        Counters::bump(&self.counters.sets, 1);
        if evicted > 0 {
            Counters::bump(&self.counters.evictions, evicted);
        }
        true
    }

    /// Remove a key; returns whether it was present
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.inner.lock().remove(key).is_some();
        if removed {
            Counters::bump(&self.counters.deletes, 1);
        }
        removed
    }

    /// Whether a live (non-expired) entry exists. Does not touch LRU order.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        match inner.entries.get(key).map(|e| e.is_expired(now)) {
            None => false,
            Some(false) => true,
            Some(true) => {
                inner.remove(key);
                Counters::bump(&self.counters.cleanups, 1);
                false
            }
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.current_bytes = 0;
        debug!("Cache cleared");
    }

    /// Remove all expired entries; returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            inner.remove(key);
        }

        if !expired.is_empty() {
            Counters::bump(&self.counters.cleanups, expired.len() as u64);
            debug!(expired_count = expired.len(), "Cache sweep");
        }
        expired.len()
    }

    /// Number of stored entries (expired ones included until swept)
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn current_bytes(&self) -> usize {
        self.inner.lock().current_bytes
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, bytes) = {
            let inner = self.inner.lock();
            (inner.entries.len(), inner.current_bytes)
        };
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);

        let hits = load(&self.counters.hits);
        let misses = load(&self.counters.misses);
        let lookups = hits + misses;

        CacheStats {
            hits,
            misses,
            sets: load(&self.counters.sets),
            deletes: load(&self.counters.deletes),
            evictions: load(&self.counters.evictions),
            cleanups: load(&self.counters.cleanups),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            entries,
            bytes,
            max_entries: self.config.max_entries,
            max_bytes: self.config.max_bytes,
        }
    }
}

impl<V: Clone + ApproxSize + Send + Sync + 'static> CacheStore<V> {
    /// Run [`CacheStore::sweep_expired`] every `interval` on the current
    /// tokio runtime.
    ///
    /// The task holds only a weak reference and ends once the store is
    /// dropped; abort the handle to stop it earlier.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(store) => {
                        store.sweep_expired();
                    }
                    None => break,
                }
            }
            debug!("Cache sweeper stopped");
        })
    }
}

#[async_trait]
impl<V: Clone + ApproxSize + Send + Sync + 'static> ResponseCache<V> for CacheStore<V> {
    async fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(CacheStore::get(self, key))
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        CacheStore::set(self, key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(CacheStore::delete(self, key))
    }

    async fn clear(&self) -> Result<()> {
        CacheStore::clear(self);
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStore::stats(self)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_TTL: Duration = Duration::ZERO;

    #[test]
    fn test_basic_get_set() {
        let cache: CacheStore<String> = CacheStore::new(3);
        assert!(cache.set("a", "1".to_string(), NO_TTL));
        assert_eq!(cache.get("a"), Some("1".to_string()));
        assert_eq!(cache.get("missing"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_lru_eviction_respects_access() {
        let cache: CacheStore<String> = CacheStore::new(2);

        cache.set("a", "A".to_string(), NO_TTL);
        cache.set("b", "B".to_string(), NO_TTL);

        // Access "a" so "b" becomes least recently used
        assert!(cache.get("a").is_some());

        cache.set("c", "C".to_string(), NO_TTL);

        assert!(cache.has("a"));
        assert!(!cache.has("b"));
        assert!(cache.has("c"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_replacing_key_does_not_evict() {
        let cache: CacheStore<String> = CacheStore::new(2);
        cache.set("a", "1".to_string(), NO_TTL);
        cache.set("b", "2".to_string(), NO_TTL);
        cache.set("a", "10".to_string(), NO_TTL);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some("10".to_string()));
        assert_eq!(cache.get("b"), Some("2".to_string()));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_byte_budget_eviction() {
        // "aaaaa" = 10 bytes approx
        let cache: CacheStore<String> =
            CacheStore::with_config(CacheStoreConfig::with_limits(10, 25));

        cache.set("a", "aaaaa".to_string(), NO_TTL);
        cache.set("b", "bbbbb".to_string(), NO_TTL);
        assert_eq!(cache.current_bytes(), 20);

        cache.set("c", "ccccc".to_string(), NO_TTL);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.current_bytes(), 20);
        assert!(!cache.has("a"));
    }

    #[test]
    fn test_oversized_entry_rejected() {
        let cache: CacheStore<String> =
            CacheStore::with_config(CacheStoreConfig::with_limits(10, 8));
        cache.set("small", "ab".to_string(), NO_TTL);
        assert!(!cache.set("large", "abcdefgh".to_string(), NO_TTL));
        assert!(cache.has("small"));
        assert!(!cache.has("large"));
    }

    #[test]
    fn test_delete_and_clear() {
        let cache: CacheStore<String> = CacheStore::new(4);
        cache.set("a", "1".to_string(), NO_TTL);
        cache.set("b", "2".to_string(), NO_TTL);

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.stats().deletes, 1);
        assert_eq!(cache.current_bytes(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.current_bytes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache: CacheStore<String> = CacheStore::new(4);
        cache.set("k", "v".to_string(), Duration::from_secs(1));
        assert!(cache.get("k").is_some());

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().cleanups, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_has_respects_expiry() {
        let cache: CacheStore<String> = CacheStore::new(4);
        cache.set("k", "v".to_string(), Duration::from_secs(1));
        assert!(cache.has("k"));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!cache.has("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_never_expires() {
        let cache: CacheStore<String> = CacheStore::new(4);
        cache.set("k", "v".to_string(), NO_TTL);
        tokio::time::advance(Duration::from_secs(86_400)).await;
        assert!(cache.get("k").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_unread_expired_entries() {
        let cache: CacheStore<String> = CacheStore::new(4);
        cache.set("short", "1".to_string(), Duration::from_secs(1));
        cache.set("long", "2".to_string(), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.has("long"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper() {
        let cache: Arc<CacheStore<String>> = Arc::new(CacheStore::new(4));
        cache.set("k", "v".to_string(), Duration::from_secs(1));

        let handle = cache.spawn_sweeper(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().cleanups, 1);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_when_store_dropped() {
        let cache: Arc<CacheStore<String>> = Arc::new(CacheStore::new(4));
        let handle = cache.spawn_sweeper(Duration::from_secs(1));
        drop(cache);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_response_cache_trait() {
        let cache: CacheStore<String> = CacheStore::new(4);
        let backend: &dyn ResponseCache<String> = &cache;

        backend.set("k", "v".to_string(), NO_TTL).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some("v".to_string()));
        assert!(backend.delete("k").await.unwrap());
        assert_eq!(backend.backend_name(), "memory");
    }
}
