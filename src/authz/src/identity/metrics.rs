//! Resolver counters
//!
//! Plain atomics: recording never takes a lock shared between requests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live resolver counters
#[derive(Debug, Default)]
pub struct ResolverMetrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    store_loads: AtomicU64,
    cache_read_failures: AtomicU64,
    cache_write_failures: AtomicU64,
    coalesced_waits: AtomicU64,
    timeouts: AtomicU64,
}

impl ResolverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_store_load(&self) {
        self.store_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_read_failure(&self) {
        self.cache_read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_write_failure(&self) {
        self.cache_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_coalesced(&self) {
        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            store_loads: self.store_loads.load(Ordering::Relaxed),
            cache_read_failures: self.cache_read_failures.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Resolver metrics at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Identity-graph loads issued to the store
    pub store_loads: u64,
    /// Cache reads that errored or returned an undecodable payload
    pub cache_read_failures: u64,
    pub cache_write_failures: u64,
    /// Misses served by another caller's in-flight load
    pub coalesced_waits: u64,
    pub timeouts: u64,
}

impl MetricsSnapshot {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}
