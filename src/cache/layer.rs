//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::storage::{CacheStorage, CachedEntity};
use super::traits::{CacheResult, CacheStats, Cacheable};

/// Cache layer that manages freshness and write-back around a fetcher.
///
/// Storage failures never escape this layer: unreadable entries are treated
/// as misses and failed writes are skipped.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  /// How long an entry stays fresh after it was written
  ttl: Duration,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      ttl: Duration::hours(24),
    }
  }

  /// Set how long entries stay fresh.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  /// Check if cached data is stale based on cached_at timestamp.
  fn is_stale(&self, cached_at: DateTime<Utc>) -> bool {
    Utc::now() - cached_at > self.ttl
  }

  /// Fresh entry for `key`, if any.
  pub fn get<T: Cacheable>(&self, key: &str) -> Option<CachedEntity<T>> {
    match self.storage.get_entity::<T>(key) {
      Ok(Some(cached)) if self.is_stale(cached.cached_at) => {
        debug!(key, "Cache entry expired, will refetch");
        None
      }
      Ok(Some(cached)) => {
        debug!(key, "Loaded from cache");
        Some(cached)
      }
      Ok(None) => None,
      Err(e) => {
        warn!(key, "Error reading cache: {}", e);
        None
      }
    }
  }

  /// Persist `entity`, overwriting any previous entry.
  pub fn put<T: Cacheable>(&self, entity: &T) {
    let key = entity.cache_key();
    match self.storage.store_entity(entity) {
      Ok(()) => debug!(key, "Saved to cache"),
      Err(e) => warn!(key, "Error saving cache: {}", e),
    }
  }

  /// Fetch a single entity with caching.
  ///
  /// 1. Check cache - if fresh, return it unchanged
  /// 2. If expired or missing, resolve through the fetcher
  /// 3. Write the resolved value back
  pub async fn fetch_one<T, F, Fut>(&self, key: &str, fetcher: F) -> CacheResult<T>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
  {
    if let Some(cached) = self.get::<T>(key) {
      return CacheResult::from_cache(cached.entity, cached.cached_at);
    }

    let data = fetcher().await;
    self.put(&data);
    CacheResult::from_network(data)
  }

  /// Count entries by freshness.
  pub fn stats<T: Cacheable>(&self) -> CacheStats {
    let times = match self.storage.cached_times::<T>() {
      Ok(times) => times,
      Err(e) => {
        warn!("Error reading cache stats: {}", e);
        return CacheStats::default();
      }
    };

    let fresh = times.iter().filter(|t| !self.is_stale(**t)).count();
    CacheStats {
      total: times.len(),
      fresh,
      expired: times.len() - fresh,
    }
  }

  /// Delete every entry of type `T`.
  pub fn purge_all<T: Cacheable>(&self) -> Result<usize> {
    let removed = self.storage.clear::<T>()?;
    debug!(removed, "Purged cache entries");
    Ok(removed)
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      ttl: self.ttl,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::FsStorage;
  use serde::{Deserialize, Serialize};
  use std::fs::File;
  use std::path::Path;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::SystemTime;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Lake {
    id: String,
    depth: u32,
  }

  impl Cacheable for Lake {
    fn cache_key(&self) -> String {
      self.id.clone()
    }

    fn entity_type() -> &'static str {
      "lake"
    }
  }

  fn lake(depth: u32) -> Lake {
    Lake {
      id: "27000100".to_string(),
      depth,
    }
  }

  fn age_entry(path: &Path, hours: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file
      .set_modified(SystemTime::now() - std::time::Duration::from_secs(hours * 3600))
      .unwrap();
  }

  #[tokio::test]
  async fn test_fetch_one_uses_fresh_entry() {
    let dir = tempfile::tempdir().unwrap();
    let layer = CacheLayer::new(FsStorage::new(dir.path()));
    let calls = AtomicUsize::new(0);

    let first = layer
      .fetch_one("27000100", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        lake(10)
      })
      .await;
    let second = layer
      .fetch_one("27000100", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        lake(99)
      })
      .await;

    assert_eq!(first.source, crate::cache::CacheSource::Network);
    assert_eq!(second.source, crate::cache::CacheSource::Cache);
    assert_eq!(second.data, lake(10));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_expired_entry_is_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let layer = CacheLayer::new(FsStorage::new(dir.path()));
    layer.put(&lake(10));
    age_entry(&dir.path().join("lake_27000100.json"), 25);

    assert!(layer.get::<Lake>("27000100").is_none());

    let result = layer.fetch_one("27000100", || async { lake(11) }).await;
    assert_eq!(result.source, crate::cache::CacheSource::Network);
    assert_eq!(layer.get::<Lake>("27000100").unwrap().entity, lake(11));
  }

  #[test]
  fn test_corrupt_entry_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let layer = CacheLayer::new(FsStorage::new(dir.path()));
    std::fs::write(dir.path().join("lake_27000100.json"), "[truncated").unwrap();

    assert!(layer.get::<Lake>("27000100").is_none());
  }

  #[test]
  fn test_failed_write_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "a file, not a directory").unwrap();
    let layer = CacheLayer::new(FsStorage::new(&blocker));

    layer.put(&lake(10));
    assert!(layer.get::<Lake>("27000100").is_none());
  }

  #[test]
  fn test_stats_and_purge() {
    let dir = tempfile::tempdir().unwrap();
    let layer = CacheLayer::new(FsStorage::new(dir.path())).with_ttl(Duration::hours(24));
    layer.put(&lake(10));
    layer.put(&Lake {
      id: "18030800".to_string(),
      depth: 3,
    });
    age_entry(&dir.path().join("lake_18030800.json"), 48);

    let stats = layer.stats::<Lake>();
    assert_eq!(
      stats,
      CacheStats {
        total: 2,
        fresh: 1,
        expired: 1
      }
    );

    assert_eq!(layer.purge_all::<Lake>().unwrap(), 2);
    assert_eq!(layer.stats::<Lake>(), CacheStats::default());
  }
}
