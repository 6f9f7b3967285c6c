// src/cache/snapshot.rs

use crate::cache::fingerprint::CacheKey;

/// A captured copy of a data view.
///
/// The cache only needs sizing and identity information; the content is
/// opaque. `Clone` must produce an independent deep copy: the cache accepts
/// snapshots by value and hands out clones, so a caller never holds an alias
/// into a cached entry.
pub trait Snapshot: Clone + std::fmt::Debug {
    /// Fingerprint of the position this view was fetched for.
    fn position_key(&self) -> CacheKey;
    fn record_count(&self) -> usize;
    fn record_size(&self) -> usize;
    /// Whether the view contains the first record of its range.
    fn includes_first(&self) -> bool;
    /// Marker of the first record, compared by incremental locate.
    fn first_record_marker(&self) -> Option<u64>;

    fn size_bytes(&self) -> usize {
        self.record_count() * self.record_size()
    }
}

/// Concrete snapshot used by the in-memory data layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewSnapshot {
    pub position: Option<CacheKey>,
    pub records: Vec<Vec<String>>,
    pub record_size: usize,
    pub includes_first: bool,
    pub first_record_marker: Option<u64>,
}

impl ViewSnapshot {
    pub fn new(position: CacheKey, records: Vec<Vec<String>>, record_size: usize) -> Self {
        Self {
            position: Some(position),
            records,
            record_size,
            includes_first: true,
            first_record_marker: None,
        }
    }
}

impl Snapshot for ViewSnapshot {
    fn position_key(&self) -> CacheKey {
        self.position.unwrap_or(CacheKey(0))
    }

    fn record_count(&self) -> usize {
        self.records.len()
    }

    fn record_size(&self) -> usize {
        self.record_size
    }

    fn includes_first(&self) -> bool {
        self.includes_first
    }

    fn first_record_marker(&self) -> Option<u64> {
        self.first_record_marker
    }
}
