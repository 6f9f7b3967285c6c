// src/cache/result_cache.rs

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::cache::fingerprint::CacheKey;
use crate::cache::snapshot::Snapshot;
use crate::types::TaskMode;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A cached snapshot plus its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<S> {
    snapshot: S,
    inserted_at_millis: u64,
    /// Tie-breaker for entries inserted within the same millisecond.
    insert_seq: u64,
    mode: TaskMode,
    size_bytes: usize,
}

impl<S: Snapshot> CacheEntry<S> {
    pub fn inserted_at_millis(&self) -> u64 {
        self.inserted_at_millis
    }

    pub fn mode(&self) -> TaskMode {
        self.mode
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn first_record_marker(&self) -> Option<u64> {
        self.snapshot.first_record_marker()
    }
}

/// Size-tracked table of previously fetched subform views.
///
/// Invariants:
/// - the live key set and the eviction ledger are disjoint;
/// - `total_size()` equals the sum of `record_count * record_size` over the
///   live entries.
#[derive(Debug, Clone)]
pub struct SubformResultCache<S> {
    entries: BTreeMap<CacheKey, CacheEntry<S>>,
    deleted: Vec<CacheKey>,
    total_size: usize,
    seq: u64,
}

impl<S> Default for SubformResultCache<S> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            deleted: Vec::new(),
            total_size: 0,
            seq: 0,
        }
    }
}

impl<S: Snapshot> SubformResultCache<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn contains(&self, key: CacheKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = CacheKey> + '_ {
        self.entries.keys().copied()
    }

    /// Read-only view of an entry's bookkeeping.
    pub fn entry(&self, key: CacheKey) -> Option<&CacheEntry<S>> {
        self.entries.get(&key)
    }

    /// Insert `snapshot` under its own position key, stamped with the current
    /// wall-clock time.
    pub fn put_in_cache(&mut self, snapshot: S, mode: TaskMode) -> bool {
        self.put_in_cache_at(snapshot, mode, now_millis())
    }

    /// [`put_in_cache`](Self::put_in_cache) with an explicit timestamp.
    ///
    /// An existing entry under the same key is replaced silently: it is not
    /// recorded as evicted. The key is dropped from the eviction ledger if an
    /// earlier eviction left it there.
    pub fn put_in_cache_at(&mut self, snapshot: S, mode: TaskMode, now: u64) -> bool {
        let key = snapshot.position_key();
        if self.entries.contains_key(&key) {
            self.remove_from_cache(key, false);
        }

        let size_bytes = snapshot.size_bytes();
        self.seq += 1;
        self.entries.insert(
            key,
            CacheEntry {
                snapshot,
                inserted_at_millis: now,
                insert_seq: self.seq,
                mode,
                size_bytes,
            },
        );
        self.deleted.retain(|k| *k != key);
        self.total_size += size_bytes;

        debug!(%key, size_bytes, total = self.total_size, "cached subform view");
        true
    }

    /// Drop the entry under `key`.
    ///
    /// With `record_eviction`, the key is appended to the eviction ledger so
    /// the server can be told the view is gone.
    pub fn remove_from_cache(&mut self, key: CacheKey, record_eviction: bool) -> bool {
        let Some(entry) = self.entries.remove(&key) else {
            return false;
        };
        self.total_size -= entry.size_bytes;
        if record_eviction && !self.deleted.contains(&key) {
            self.deleted.push(key);
        }
        debug!(%key, record_eviction, total = self.total_size, "removed cached subform view");
        true
    }

    /// An independent copy of the snapshot cached under `key`.
    pub fn get_cached_snapshot(&self, key: CacheKey) -> Option<S> {
        self.entries.get(&key).map(|e| e.snapshot.clone())
    }

    /// Key of the oldest insertion, measured against the current time.
    pub fn select_least_recently_inserted(&self) -> Option<CacheKey> {
        self.select_least_recently_inserted_at(now_millis())
    }

    pub fn select_least_recently_inserted_at(&self, now: u64) -> Option<CacheKey> {
        self.entries
            .iter()
            .max_by(|(_, a), (_, b)| {
                let gap_a = now.saturating_sub(a.inserted_at_millis);
                let gap_b = now.saturating_sub(b.inserted_at_millis);
                gap_a
                    .cmp(&gap_b)
                    .then_with(|| b.insert_seq.cmp(&a.insert_seq))
            })
            .map(|(k, _)| *k)
    }

    /// Evict every live entry, recording each eviction.
    pub fn evict_all(&mut self) -> Vec<CacheKey> {
        let keys: Vec<CacheKey> = self.entries.keys().copied().collect();
        for key in &keys {
            self.remove_from_cache(*key, true);
        }
        keys
    }

    pub fn deleted_list(&self) -> &[CacheKey] {
        &self.deleted
    }

    /// Comma-joined decimal list of evicted keys for the next outbound request.
    pub fn deleted_list_to_wire(&self) -> String {
        self.deleted
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Forget reported evictions once the server acknowledged them.
    pub fn clear_deleted_list(&mut self) {
        self.deleted.clear();
    }
}
