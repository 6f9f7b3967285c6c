// src/cache/mod.rs

//! Subform result caching.
//!
//! - [`fingerprint`] derives the content-addressed cache key from ancestor
//!   field values.
//! - [`snapshot`] is the contract a captured data view must satisfy.
//! - [`result_cache`] is the size-tracked key → snapshot table plus its
//!   eviction ledger.
//! - [`policy`] decides when the cache is too large.

pub mod fingerprint;
pub mod policy;
pub mod result_cache;
pub mod snapshot;

pub use fingerprint::{CacheKey, DescriptorPart, FieldKind, FieldValue};
pub use policy::{CapacityPolicy, MaxBytes, Unbounded};
pub use result_cache::{CacheEntry, SubformResultCache};
pub use snapshot::{Snapshot, ViewSnapshot};
