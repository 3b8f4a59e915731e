//! LRU cache for refinement results.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::clock::{Clock, SystemClock};
use crate::types::responses::RefinementResult;

/// Lifetime of a cache entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

const DEFAULT_CAPACITY: usize = 1000;

/// Cache handle shared by every invocation of an engine.
pub type SharedCache = Arc<RwLock<RefinementCache>>;

/// Cached refinement result.
#[derive(Debug, Clone)]
pub struct CachedResult {
    /// Result with its payload stored as JSON.
    pub result: RefinementResult<Value>,

    /// When it was cached.
    pub cached_at: DateTime<Utc>,

    /// Task the result was produced for.
    pub task_key: String,
}

impl CachedResult {
    /// Checks whether the entry has outlived `ttl` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let elapsed = now
            .signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::MAX);
        elapsed >= ttl
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Current number of entries.
    pub size: usize,

    /// Maximum capacity.
    pub capacity: usize,

    /// Stored keys, most recently used first.
    pub keys: Vec<String>,

    /// Number of hits.
    pub hits: u64,

    /// Number of misses (absent, stale or task mismatch).
    pub misses: u64,
}

impl CacheStats {
    /// Computes the hit rate.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded LRU cache of refinement results.
pub struct RefinementCache {
    cache: LruCache<String, CachedResult>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RefinementCache {
    /// Creates a new cache on the system clock.
    ///
    /// # Arguments
    /// - `capacity`: Maximum number of entries (0 falls back to the default)
    /// - `ttl`: Entry time to live
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, Arc::new(SystemClock))
    }

    /// Creates a new cache reading time from `clock`.
    pub fn with_clock(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let cap = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(cap),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates a cache with default capacity and a one hour TTL.
    pub fn default_config() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    /// Wraps the cache for sharing between invocations.
    pub fn shared(self) -> SharedCache {
        Arc::new(RwLock::new(self))
    }

    /// Entry time to live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generates a cache key.
    ///
    /// SHA256 over length-prefixed fields, so moving bytes between fields
    /// never yields the same key. Temperature is hashed by bit pattern.
    pub fn cache_key(task: &str, input: &str, model: &str, temperature: f32) -> String {
        let mut hasher = Sha256::new();
        for field in [task, input, model] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update(temperature.to_bits().to_le_bytes());

        hex::encode(hasher.finalize())
    }

    /// Looks up an entry.
    ///
    /// Returns `None` if absent, produced for a different task, or expired.
    /// Expired entries are removed.
    pub fn get(&mut self, key: &str, task: &str) -> Option<RefinementResult<Value>> {
        let now = self.clock.now();
        // peek first so a stale entry does not get promoted
        let state = self
            .cache
            .peek(key)
            .map(|c| (c.is_expired(now, self.ttl), c.task_key == task));

        match state {
            Some((true, _)) => {
                tracing::debug!(key, "Evicting stale cache entry");
                self.cache.pop(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some((false, false)) => {
                tracing::warn!(key, "Cache key matched an entry for a different task");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some((false, true)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.cache.get(key).map(|c| c.result.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts or overwrites an entry, stamped with the current time.
    pub fn insert(&mut self, key: String, result: RefinementResult<Value>, task: &str) {
        let entry = CachedResult {
            result,
            cached_at: self.clock.now(),
            task_key: task.to_string(),
        };
        if let Some((evicted, _)) = self.cache.push(key.clone(), entry) {
            if evicted != key {
                tracing::debug!(key = %evicted, "Evicted least recently used cache entry");
            }
        }
    }

    /// Invalidates a single entry.
    pub fn invalidate(&mut self, key: &str) {
        self.cache.pop(key);
    }

    /// Clears the whole cache.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.cache.len(),
            capacity: self.cache.cap().get(),
            keys: self.cache.iter().map(|(k, _)| k.clone()).collect(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for RefinementCache {
    fn default() -> Self {
        Self::default_config()
    }
}

impl std::fmt::Debug for RefinementCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefinementCache")
            .field("size", &self.cache.len())
            .field("capacity", &self.cache.cap())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;

    fn create_test_result(text: &str) -> RefinementResult<Value> {
        RefinementResult {
            final_result: Value::String(text.to_string()),
            initial_result: None,
            iterations: 1,
            reasoning: "ok".to_string(),
            confidence: 1.0,
            model_used: "gpt-4o".to_string(),
            processing_time_ms: 12,
        }
    }

    fn manual_cache(capacity: usize) -> (RefinementCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = RefinementCache::with_clock(capacity, DEFAULT_TTL, clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_cache_key_deterministic() {
        let key1 = RefinementCache::cache_key("echo", "x", "gpt-4o", 0.2);
        let key2 = RefinementCache::cache_key("echo", "x", "gpt-4o", 0.2);
        assert_eq!(key1, key2);
        assert_eq!(key1.len(), 64);
    }

    #[test]
    fn test_cache_key_field_sensitivity() {
        let base = RefinementCache::cache_key("echo", "x", "gpt-4o", 0.2);

        assert_ne!(base, RefinementCache::cache_key("echo!", "x", "gpt-4o", 0.2));
        assert_ne!(base, RefinementCache::cache_key("echo", "y", "gpt-4o", 0.2));
        assert_ne!(base, RefinementCache::cache_key("echo", "x", "gpt-4o-mini", 0.2));
        assert_ne!(base, RefinementCache::cache_key("echo", "x", "gpt-4o", 0.3));
    }

    #[test]
    fn test_cache_key_field_boundaries() {
        let a = RefinementCache::cache_key("ab", "c", "m", 0.2);
        let b = RefinementCache::cache_key("a", "bc", "m", 0.2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_cache_hit() {
        let (mut cache, _) = manual_cache(10);
        cache.insert("k".to_string(), create_test_result("x"), "echo");

        let cached = cache.get("k", "echo");
        assert_eq!(cached.unwrap().final_result, Value::String("x".into()));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_cache_miss() {
        let (mut cache, _) = manual_cache(10);
        assert!(cache.get("nonexistent", "echo").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_task_mismatch_is_a_miss() {
        let (mut cache, _) = manual_cache(10);
        cache.insert("k".to_string(), create_test_result("x"), "echo");

        assert!(cache.get("k", "other task").is_none());
        // entry is kept for its own task
        assert!(cache.get("k", "echo").is_some());
    }

    #[test]
    fn test_ttl_boundary() {
        let (mut cache, clock) = manual_cache(10);
        cache.insert("k".to_string(), create_test_result("x"), "echo");

        clock.advance(DEFAULT_TTL - Duration::from_millis(1));
        assert!(cache.get("k", "echo").is_some());

        clock.advance(Duration::from_millis(2));
        assert!(cache.get("k", "echo").is_none());
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_expired_exactly_at_ttl() {
        let (mut cache, clock) = manual_cache(10);
        cache.insert("k".to_string(), create_test_result("x"), "echo");

        clock.advance(DEFAULT_TTL);
        assert!(cache.get("k", "echo").is_none());
    }

    #[test]
    fn test_zero_ttl_always_expired() {
        let mut cache = RefinementCache::new(10, Duration::from_secs(0));
        cache.insert("k".to_string(), create_test_result("x"), "echo");
        assert!(cache.get("k", "echo").is_none());
    }

    #[test]
    fn test_cache_lru_eviction() {
        let (mut cache, _) = manual_cache(2);

        cache.insert("key1".to_string(), create_test_result("1"), "t");
        cache.insert("key2".to_string(), create_test_result("2"), "t");
        cache.insert("key3".to_string(), create_test_result("3"), "t");

        assert!(cache.get("key1", "t").is_none());
        assert!(cache.get("key2", "t").is_some());
        assert!(cache.get("key3", "t").is_some());
    }

    #[test]
    fn test_insert_overwrites_and_restamps() {
        let (mut cache, clock) = manual_cache(10);
        cache.insert("k".to_string(), create_test_result("old"), "t");

        clock.advance(DEFAULT_TTL - Duration::from_secs(1));
        cache.insert("k".to_string(), create_test_result("new"), "t");
        clock.advance(Duration::from_secs(10));

        let cached = cache.get("k", "t").unwrap();
        assert_eq!(cached.final_result, Value::String("new".into()));
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn test_cache_invalidate_and_clear() {
        let (mut cache, _) = manual_cache(10);
        cache.insert("key1".to_string(), create_test_result("1"), "t");
        cache.insert("key2".to_string(), create_test_result("2"), "t");

        cache.invalidate("key1");
        assert!(cache.get("key1", "t").is_none());

        cache.clear();
        assert!(cache.get("key2", "t").is_none());
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_cache_stats() {
        let (mut cache, _) = manual_cache(10);
        cache.insert("key1".to_string(), create_test_result("1"), "t");
        cache.insert("key2".to_string(), create_test_result("2"), "t");

        cache.get("key1", "t"); // Hit
        cache.get("key3", "t"); // Miss
        cache.get("key1", "t"); // Hit

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.capacity, 10);
        assert_eq!(stats.keys, vec!["key1".to_string(), "key2".to_string()]);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_zero_capacity_uses_default() {
        let cache = RefinementCache::new(0, DEFAULT_TTL);
        assert_eq!(cache.stats().capacity, DEFAULT_CAPACITY);
    }
}
