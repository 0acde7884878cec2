//! Cache storage trait and filesystem implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::traits::Cacheable;

/// A single cached entity.
#[derive(Debug, Clone)]
pub struct CachedEntity<T> {
  /// The cached entity
  pub entity: T,
  /// When the entity was cached
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Get a single entity by key.
  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>>;

  /// Store a single entity, replacing any previous entry.
  fn store_entity<T: Cacheable>(&self, entity: &T) -> Result<()>;

  /// Write times of every stored entity of type `T`.
  fn cached_times<T: Cacheable>(&self) -> Result<Vec<DateTime<Utc>>>;

  /// Remove every stored entity of type `T`, returning how many were removed.
  fn clear<T: Cacheable>(&self) -> Result<usize>;
}

/// One JSON file per entity, named `<entity_type>_<key>.json`.
///
/// The write time of an entry is the file's modification time.
pub struct FsStorage {
  dir: PathBuf,
}

impl FsStorage {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  fn entry_path<T: Cacheable>(&self, entity_key: &str) -> PathBuf {
    self
      .dir
      .join(format!("{}_{}.json", T::entity_type(), entity_key))
  }

  fn ensure_dir(&self) -> Result<()> {
    fs::create_dir_all(&self.dir).map_err(|e| {
      eyre!(
        "Failed to create cache directory {}: {}",
        self.dir.display(),
        e
      )
    })
  }

  /// Paths of every entry file for `T`. A missing directory has no entries.
  fn entry_paths<T: Cacheable>(&self) -> Result<Vec<PathBuf>> {
    if !self.dir.exists() {
      return Ok(Vec::new());
    }

    let prefix = format!("{}_", T::entity_type());
    let entries = fs::read_dir(&self.dir)
      .map_err(|e| eyre!("Failed to list cache directory {}: {}", self.dir.display(), e))?;

    let paths = entries
      .filter_map(|entry| entry.ok())
      .map(|entry| entry.path())
      .filter(|path| {
        path
          .file_name()
          .and_then(|name| name.to_str())
          .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(".json"))
      })
      .collect();

    Ok(paths)
  }
}

fn modified_at(path: &Path) -> Result<DateTime<Utc>> {
  let modified = fs::metadata(path)
    .and_then(|meta| meta.modified())
    .map_err(|e| eyre!("Failed to read modification time of {}: {}", path.display(), e))?;
  Ok(DateTime::<Utc>::from(modified))
}

impl CacheStorage for FsStorage {
  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    let path = self.entry_path::<T>(entity_key);
    if !path.exists() {
      return Ok(None);
    }

    let cached_at = modified_at(&path)?;
    let data = fs::read(&path)
      .map_err(|e| eyre!("Failed to read cache entry {}: {}", path.display(), e))?;
    let entity: T = serde_json::from_slice(&data)
      .map_err(|e| eyre!("Failed to deserialize cache entry {}: {}", path.display(), e))?;

    Ok(Some(CachedEntity { entity, cached_at }))
  }

  fn store_entity<T: Cacheable>(&self, entity: &T) -> Result<()> {
    self.ensure_dir()?;

    let path = self.entry_path::<T>(&entity.cache_key());
    let data =
      serde_json::to_vec_pretty(entity).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;

    // Write then rename so readers never see a half-written entry
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)
      .map_err(|e| eyre!("Failed to write cache entry {}: {}", tmp.display(), e))?;
    fs::rename(&tmp, &path)
      .map_err(|e| eyre!("Failed to replace cache entry {}: {}", path.display(), e))?;

    Ok(())
  }

  fn cached_times<T: Cacheable>(&self) -> Result<Vec<DateTime<Utc>>> {
    self
      .entry_paths::<T>()?
      .iter()
      .map(|path| modified_at(path))
      .collect()
  }

  fn clear<T: Cacheable>(&self) -> Result<usize> {
    let mut removed = 0;
    for path in self.entry_paths::<T>()? {
      match fs::remove_file(&path) {
        Ok(()) => removed += 1,
        Err(e) => warn!("Error deleting cache file {}: {}", path.display(), e),
      }
    }
    Ok(removed)
  }
}
