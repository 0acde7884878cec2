use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://maps.dnr.state.mn.us/cgi-bin/lakefinder/detail.cgi";

/// Runtime settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// LakeFinder detail endpoint
  pub endpoint: String,
  /// Value of the `type` query parameter
  pub survey_type: String,
  pub user_agent: String,
  pub request_timeout_secs: u64,
  /// Total attempts per lake, including the first
  pub max_retries: u32,
  pub retry_backoff_ms: u64,
  pub timeout_backoff_ms: u64,
  /// Worker pool size for batch fetches
  pub concurrency: usize,
  /// Sequential batches: pause between lakes. Concurrent: pause before each network request
  pub request_delay_ms: u64,
  pub cache_ttl_hours: u32,
  pub cache_dir: PathBuf,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      endpoint: DEFAULT_ENDPOINT.to_string(),
      survey_type: "lake_survey".to_string(),
      user_agent: format!(
        "lakesurvey/{} (Minnesota DNR Lake Data Processing Tool)",
        env!("CARGO_PKG_VERSION")
      ),
      request_timeout_secs: 30,
      max_retries: 3,
      retry_backoff_ms: 1_000,
      timeout_backoff_ms: 2_000,
      concurrency: 10,
      request_delay_ms: 100,
      cache_ttl_hours: 24,
      cache_dir: PathBuf::from("cache"),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./lakesurvey.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/lakesurvey/config.yaml
  ///
  /// Falls back to defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("lakesurvey.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("lakesurvey").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    // An empty document deserializes to null rather than an empty mapping
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }

    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  pub fn request_delay(&self) -> Duration {
    Duration::from_millis(self.request_delay_ms)
  }

  pub fn cache_ttl(&self) -> chrono::Duration {
    chrono::Duration::hours(i64::from(self.cache_ttl_hours))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_file_uses_defaults() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.concurrency, 10);
    assert_eq!(config.cache_ttl(), chrono::Duration::hours(24));
  }

  #[test]
  fn test_partial_override() {
    let config = Config::from_yaml(
      "concurrency: 4\nrequest_delay_ms: 250\ncache_dir: /tmp/lakesurvey\n",
    )
    .unwrap();
    assert_eq!(config.concurrency, 4);
    assert_eq!(config.request_delay(), Duration::from_millis(250));
    assert_eq!(config.cache_dir, PathBuf::from("/tmp/lakesurvey"));
    assert_eq!(config.survey_type, "lake_survey");
  }

  #[test]
  fn test_wrong_type_is_error() {
    assert!(Config::from_yaml("max_retries: lots\n").is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    assert!(Config::load(Some(Path::new("/definitely/not/here.yaml"))).is_err());
  }

  #[test]
  fn test_load_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lakesurvey.yaml");
    std::fs::write(&path, "max_retries: 5\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.max_retries, 5);
  }
}
