// src/cache/policy.rs

//! Pluggable capacity management for subform caches.

use std::fmt::Debug;

use tracing::debug;

use crate::cache::fingerprint::CacheKey;
use crate::cache::result_cache::SubformResultCache;
use crate::cache::snapshot::Snapshot;

/// Decides when a cache holds too much.
pub trait CapacityPolicy: Send + Sync + Debug {
    fn over_capacity(&self, total_bytes: usize, entries: usize) -> bool;
}

/// Never evicts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl CapacityPolicy for Unbounded {
    fn over_capacity(&self, _total_bytes: usize, _entries: usize) -> bool {
        false
    }
}

/// Bounds the tracked size of each cache.
#[derive(Debug, Clone, Copy)]
pub struct MaxBytes(pub usize);

impl CapacityPolicy for MaxBytes {
    fn over_capacity(&self, total_bytes: usize, _entries: usize) -> bool {
        total_bytes > self.0
    }
}

/// Evict least-recently-inserted entries until `policy` is satisfied.
///
/// Evictions are recorded in the cache's eviction ledger. Returns the evicted
/// keys in eviction order.
pub fn enforce<S: Snapshot>(
    cache: &mut SubformResultCache<S>,
    policy: &dyn CapacityPolicy,
) -> Vec<CacheKey> {
    let mut evicted = Vec::new();
    while policy.over_capacity(cache.total_size(), cache.len()) {
        let Some(key) = cache.select_least_recently_inserted() else {
            break;
        };
        cache.remove_from_cache(key, true);
        evicted.push(key);
    }
    if !evicted.is_empty() {
        debug!(?evicted, total = cache.total_size(), "capacity policy evicted entries");
    }
    evicted
}
