//! Source Result Cache
//!
//! The orchestrator consults a [`ResultCache`] before calling a provider
//! and stores successful results afterwards. The cache is an injected
//! collaborator with a plain `get`/`put(key, value, ttl)` contract, so a
//! persistent store can replace the in-memory one without touching the
//! orchestrator.
//!
//! # Cache Key Strategy
//!
//! Keys are SHA-256 digests of `source + normalized query text`. Content is
//! deterministic per key within a session, so writes are idempotent upserts
//! and last-writer-wins is acceptable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::{Query, SourceId, SourceResult};
use crate::utils::digest_key;

// ============================================================================
// Cache Types
// ============================================================================

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of entries in cache
    pub entry_count: usize,
    /// Number of evictions due to capacity
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Configuration for the in-memory result cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached results (default: 512)
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Default TTL for cache entries (None = no expiry)
    #[serde(default)]
    pub default_ttl: Option<Duration>,

    /// Whether the cache is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_max_entries() -> usize {
    512
}

fn default_enabled() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            default_ttl: None,
            enabled: default_enabled(),
        }
    }
}

// ============================================================================
// Cache Trait
// ============================================================================

/// Storage collaborator for per-source results.
pub trait ResultCache: Send + Sync {
    /// Get a cached result
    fn get(&self, key: &str) -> Option<SourceResult>;

    /// Store a result with optional TTL (idempotent upsert)
    fn put(&self, key: &str, value: SourceResult, ttl: Option<Duration>);

    /// Get cache statistics
    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }

    /// Compute the cache key for a source and query
    fn compute_key(&self, source: SourceId, query: &Query) -> String {
        digest_key(&[source.as_str(), &query.normalized()])
    }
}

// ============================================================================
// In-Memory Cache
// ============================================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    value: SourceResult,
    last_accessed: Instant,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: SourceResult, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            value,
            last_accessed: now,
            expires_at: ttl.map(|d| now + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() > exp)
            .unwrap_or(false)
    }
}

/// Bounded in-memory cache with least-recently-used eviction.
///
/// Thread-safe via `parking_lot::RwLock`; reads dominate, so lookups take
/// the read lock and only upgrade to a write lock to refresh recency.
pub struct InMemoryResultCache {
    cache: RwLock<HashMap<String, CacheEntry>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl InMemoryResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Remove expired entries from the cache
    pub fn cleanup_expired(&self) {
        self.cache.write().retain(|_, entry| !entry.is_expired());
    }

    fn evict_lru(&self, cache: &mut HashMap<String, CacheEntry>) {
        while cache.len() >= self.config.max_entries.max(1) {
            let lru_key = cache
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(key, _)| key.clone());

            match lru_key {
                Some(key) => {
                    cache.remove(&key);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }
    }
}

impl ResultCache for InMemoryResultCache {
    fn get(&self, key: &str) -> Option<SourceResult> {
        if !self.config.enabled {
            return None;
        }

        {
            let cache = self.cache.read();
            match cache.get(key) {
                Some(entry) if !entry.is_expired() => {}
                _ => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        let mut cache = self.cache.write();
        match cache.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.last_accessed = Instant::now();
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                cache.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn put(&self, key: &str, value: SourceResult, ttl: Option<Duration>) {
        if !self.config.enabled {
            return;
        }

        let entry = CacheEntry::new(value, ttl.or(self.config.default_ttl));
        let mut cache = self.cache.write();
        if !cache.contains_key(key) {
            self.evict_lru(&mut cache);
        }
        cache.insert(key.to_string(), entry);
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.cache.read().len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
