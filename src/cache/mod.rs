//! File-backed caching layer with time-based freshness.
//!
//! This module provides a domain-agnostic caching mechanism that:
//! - Stores one JSON file per entity key
//! - Treats entries older than the configured TTL as misses
//! - Degrades storage failures to cache misses or skipped writes

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{CacheStorage, CachedEntity, FsStorage};
pub use traits::{CacheResult, CacheSource, CacheStats, Cacheable};
