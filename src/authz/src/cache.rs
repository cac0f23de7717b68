//! In-process TTL cache for serialized identity contexts

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use warden_core::{CacheError, ContextCache};

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

/// Cached entry with its own deadline
#[derive(Clone)]
struct CachedEntry {
    payload: Vec<u8>,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// DashMap-backed TTL cache
///
/// The TTL is supplied per `set` call. Time comes from `tokio::time`, so
/// paused-clock tests can expire entries deterministically.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, CachedEntry>>,
    config: CacheConfig,
    hits: Arc<AtomicUsize>,
    misses: Arc<AtomicUsize>,
    expirations: Arc<AtomicUsize>,
}

impl MemoryCache {
    /// Create a cache
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            config,
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
            expirations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a cache with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(CacheConfig { capacity })
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.entries.len(),
            max_entries: self.config.capacity,
        }
    }

    /// Drop expired entries, then the soonest-expiring ones until a slot frees
    fn evict(&self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        self.expirations
            .fetch_add(before.saturating_sub(self.entries.len()), Ordering::Relaxed);

        if self.entries.len() < self.config.capacity {
            return;
        }

        // Remove up to 10% of entries, nearest deadline first
        let to_remove = (self.config.capacity / 10).max(1);
        let mut deadlines: Vec<(Instant, String)> = self
            .entries
            .iter()
            .map(|entry| (entry.expires_at, entry.key().clone()))
            .collect();
        deadlines.sort();

        for (_, key) in deadlines.into_iter().take(to_remove) {
            self.entries.remove(&key);
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[async_trait]
impl ContextCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(entry.payload.clone()));
            }
        }

        // Only drop the entry if it is still expired; a concurrent set may have replaced it
        if self.entries.remove_if(key, |_, entry| entry.is_expired()).is_some() {
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        if self.config.capacity == 0 {
            return Err(CacheError::Backend("cache capacity is zero".to_string()));
        }

        if !self.entries.contains_key(key) && self.entries.len() >= self.config.capacity {
            self.evict();
        }

        self.entries.insert(
            key.to_string(),
            CachedEntry {
                payload: value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub entries: usize,
    pub max_entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
