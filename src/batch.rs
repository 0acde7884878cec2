//! Batch retrieval of fish surveys for many lakes.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::cache::{CacheResult, CacheSource};
use crate::config::Config;
use crate::survey::{CachedSurveyClient, SurveySummary};

/// Log progress every this many lakes.
const PROGRESS_EVERY: usize = 50;

/// How a batch is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
  /// Worker pool size; 1 runs the batch sequentially
  pub concurrency: usize,
  /// Sequential: pause between lakes. Concurrent: pause before each network request.
  pub request_delay: Duration,
  pub use_cache: bool,
}

impl BatchOptions {
  pub fn from_config(config: &Config) -> Self {
    Self {
      concurrency: config.concurrency,
      request_delay: config.request_delay(),
      use_cache: true,
    }
  }
}

/// Aggregate counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
  pub attempted: usize,
  /// Resolved to a summary parsed from a payload
  pub succeeded: usize,
  /// Resolved to a no-data sentinel
  pub absent: usize,
  /// No result at all (the unit of work failed)
  pub failed: usize,
  pub from_cache: usize,
}

/// One entry per distinct requested lake; `None` when its unit of work failed.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
  pub surveys: BTreeMap<String, Option<SurveySummary>>,
  pub stats: BatchStats,
}

impl BatchResult {
  fn seeded(keys: &[String]) -> Self {
    Self {
      surveys: keys.iter().map(|k| (k.clone(), None)).collect(),
      stats: BatchStats {
        attempted: keys.len(),
        ..BatchStats::default()
      },
    }
  }

  fn record(&mut self, key: String, result: CacheResult<SurveySummary>) {
    if result.source == CacheSource::Cache {
      self.stats.from_cache += 1;
    }
    self.surveys.insert(key, Some(result.data));
  }

  fn finish(mut self) -> Self {
    for summary in self.surveys.values() {
      match summary {
        Some(s) if s.no_data_available => self.stats.absent += 1,
        Some(_) => self.stats.succeeded += 1,
        None => self.stats.failed += 1,
      }
    }
    self
  }

  pub fn get(&self, key: &str) -> Option<&SurveySummary> {
    self.surveys.get(key).and_then(Option::as_ref)
  }
}

/// Resolves surveys for many lakes, sequentially or over a bounded worker pool.
#[derive(Clone)]
pub struct SurveyBatch {
  client: CachedSurveyClient,
}

impl SurveyBatch {
  pub fn new(client: CachedSurveyClient) -> Self {
    Self { client }
  }

  /// Resolve every key. Never fails; duplicate keys are resolved once.
  pub async fn fetch_many(&self, keys: &[String], options: &BatchOptions) -> BatchResult {
    let mut seen = HashSet::new();
    let keys: Vec<String> = keys
      .iter()
      .filter(|k| seen.insert(*k))
      .cloned()
      .collect();

    if options.use_cache {
      let stats = self.client.cache_stats();
      info!(
        fresh = stats.fresh,
        expired = stats.expired,
        "Cache stats before fetch"
      );
    }

    let result = if options.concurrency > 1 && keys.len() > 1 {
      info!(
        lakes = keys.len(),
        workers = options.concurrency,
        "Fetching fish survey data in parallel"
      );
      self.fetch_concurrent(keys, options).await
    } else {
      info!(lakes = keys.len(), "Fetching fish survey data");
      self.fetch_sequential(keys, options).await
    };

    let result = result.finish();
    let stats = &result.stats;
    info!(
      attempted = stats.attempted,
      succeeded = stats.succeeded,
      absent = stats.absent,
      failed = stats.failed,
      from_cache = stats.from_cache,
      "Fish survey fetch complete: {}/{} with data",
      stats.succeeded,
      stats.attempted
    );
    result
  }

  async fn fetch_sequential(&self, keys: Vec<String>, options: &BatchOptions) -> BatchResult {
    let mut result = BatchResult::seeded(&keys);
    let total = keys.len();

    for (i, key) in keys.into_iter().enumerate() {
      let summary = self
        .client
        .get_survey(&key, options.use_cache, Duration::ZERO)
        .await;
      result.record(key, summary);

      if (i + 1) % PROGRESS_EVERY == 0 {
        info!("Fetched fish survey data for {}/{} lakes...", i + 1, total);
      }

      // No pause after the last lake
      if i + 1 < total && !options.request_delay.is_zero() {
        tokio::time::sleep(options.request_delay).await;
      }
    }

    result
  }

  async fn fetch_concurrent(&self, keys: Vec<String>, options: &BatchOptions) -> BatchResult {
    let mut result = BatchResult::seeded(&keys);
    let total = keys.len();

    let semaphore = Arc::new(Semaphore::new(options.concurrency));
    let mut join_set: JoinSet<Option<(String, CacheResult<SurveySummary>)>> = JoinSet::new();

    for key in keys {
      let client = self.client.clone();
      let semaphore = Arc::clone(&semaphore);
      let use_cache = options.use_cache;
      let delay = options.request_delay;

      join_set.spawn(async move {
        let _permit = semaphore.acquire_owned().await.ok()?;
        let summary = client.get_survey(&key, use_cache, delay).await;
        Some((key, summary))
      });
    }

    let mut completed = 0;
    while let Some(joined) = join_set.join_next().await {
      match joined {
        Ok(Some((key, summary))) => result.record(key, summary),
        Ok(None) => error!("Worker pool closed before a lake was fetched"),
        // The key keeps its seeded `None`
        Err(e) => error!("Fish survey task failed: {}", e),
      }

      completed += 1;
      if completed % PROGRESS_EVERY == 0 {
        info!("Completed {}/{} lakes...", completed, total);
      }
    }

    result
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::survey::transport::stub::{ok, status, StubTransport};
  use crate::survey::transport::{Reply, Transport, TransportError};
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tokio::time::Instant;

  const WALLEYE: &str = r#"{"status":"SUCCESS","result":{"surveys":[
    {"surveyType":"Standard Survey","surveyDate":"2022-06-15",
     "fishCatchSummaries":[{"species":"Walleye","totalCatch":12}]}
  ]}}"#;

  fn keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{:08}", 27000100 + i)).collect()
  }

  fn batch(transport: Arc<dyn Transport>, dir: &std::path::Path) -> SurveyBatch {
    let config = Config {
      cache_dir: dir.to_path_buf(),
      ..Config::default()
    };
    SurveyBatch::new(CachedSurveyClient::with_transport(transport, &config))
  }

  fn options(concurrency: usize) -> BatchOptions {
    BatchOptions {
      concurrency,
      request_delay: Duration::ZERO,
      use_cache: true,
    }
  }

  /// Even lake ids have surveys, odd ones are unknown to the endpoint.
  fn even_found(key: &str) -> Result<Reply, TransportError> {
    let n: u64 = key.parse().unwrap();
    if n % 2 == 0 {
      ok(WALLEYE)
    } else {
      status(404)
    }
  }

  #[tokio::test]
  async fn test_concurrent_batch_has_one_entry_per_key() {
    let dir = tempfile::tempdir().unwrap();
    let stub = Arc::new(StubTransport::new(even_found));
    let lakes = keys(50);

    let result = batch(stub.clone(), dir.path())
      .fetch_many(&lakes, &options(10))
      .await;

    assert_eq!(result.surveys.len(), 50);
    assert!(lakes.iter().all(|k| result.surveys.contains_key(k)));
    let with_data = result
      .surveys
      .values()
      .filter(|s| s.as_ref().is_some_and(|s| !s.no_data_available))
      .count();
    assert_eq!(with_data, 25);
    assert_eq!(result.stats.succeeded, 25);
    assert_eq!(result.stats.absent, 25);
    assert_eq!(result.stats.failed, 0);
    assert_eq!(stub.calls(), 50);
  }

  #[tokio::test]
  async fn test_sequential_and_concurrent_agree() {
    let lakes = keys(12);

    let seq_dir = tempfile::tempdir().unwrap();
    let sequential = batch(Arc::new(StubTransport::new(even_found)), seq_dir.path())
      .fetch_many(&lakes, &options(1))
      .await;

    let par_dir = tempfile::tempdir().unwrap();
    let concurrent = batch(Arc::new(StubTransport::new(even_found)), par_dir.path())
      .fetch_many(&lakes, &options(4))
      .await;

    assert_eq!(sequential.stats, concurrent.stats);
    for key in &lakes {
      let a = sequential.get(key).unwrap();
      let b = concurrent.get(key).unwrap();
      assert_eq!(a.survey_date, b.survey_date);
      assert_eq!(a.total_fish_caught, b.total_fish_caught);
      assert_eq!(a.absence, b.absence);
    }
  }

  #[tokio::test]
  async fn test_sequential_batch_survives_huge_counts() {
    const HUGE: &str = r#"{"status":"SUCCESS","result":{"surveys":[
      {"surveyType":"Standard Survey","surveyDate":"2022-06-15",
       "fishCatchSummaries":[{"species":"Walleye","totalCatch":1e30},{"species":"Bluegill","totalCatch":1}]}
    ]}}"#;
    let dir = tempfile::tempdir().unwrap();
    let stub = Arc::new(StubTransport::new(|_| ok(HUGE)));
    let lakes = keys(3);

    let result = batch(stub, dir.path())
      .fetch_many(&lakes, &options(1))
      .await;

    assert_eq!(result.stats.succeeded, 3);
    for key in &lakes {
      assert_eq!(result.get(key).unwrap().total_fish_caught, u64::MAX);
    }
  }

  #[tokio::test]
  async fn test_second_batch_makes_no_requests() {
    let dir = tempfile::tempdir().unwrap();
    let stub = Arc::new(StubTransport::new(even_found));
    let batch = batch(stub.clone(), dir.path());
    let lakes = keys(8);

    let first = batch.fetch_many(&lakes, &options(4)).await;
    let second = batch.fetch_many(&lakes, &options(4)).await;

    assert_eq!(stub.calls(), 8);
    assert_eq!(second.stats.from_cache, 8);
    assert_eq!(first.surveys, second.surveys);
  }

  #[tokio::test]
  async fn test_panicking_unit_degrades_to_none() {
    let dir = tempfile::tempdir().unwrap();
    let lakes = keys(6);
    let doomed = lakes[3].clone();
    let stub = Arc::new(StubTransport::new(move |key| {
      if key == doomed {
        panic!("transport blew up");
      }
      ok(WALLEYE)
    }));

    let result = batch(stub, dir.path()).fetch_many(&lakes, &options(3)).await;

    assert_eq!(result.surveys.len(), 6);
    assert_eq!(result.surveys[&lakes[3]], None);
    assert_eq!(result.stats.failed, 1);
    assert_eq!(result.stats.succeeded, 5);
  }

  #[tokio::test]
  async fn test_duplicate_keys_resolved_once() {
    let dir = tempfile::tempdir().unwrap();
    let stub = Arc::new(StubTransport::new(even_found));
    let lakes = vec![
      "27000100".to_string(),
      "27000100".to_string(),
      "27000102".to_string(),
    ];

    let result = batch(stub.clone(), dir.path())
      .fetch_many(&lakes, &options(4))
      .await;

    assert_eq!(result.surveys.len(), 2);
    assert_eq!(result.stats.attempted, 2);
    assert_eq!(stub.calls_for("27000100"), 1);
  }

  #[tokio::test]
  async fn test_empty_batch() {
    let dir = tempfile::tempdir().unwrap();
    let stub = Arc::new(StubTransport::new(even_found));

    let result = batch(stub.clone(), dir.path())
      .fetch_many(&[], &options(4))
      .await;

    assert!(result.surveys.is_empty());
    assert_eq!(result.stats, BatchStats::default());
    assert_eq!(stub.calls(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_sequential_delay_skips_last_lake() {
    let dir = tempfile::tempdir().unwrap();
    let stub = Arc::new(StubTransport::new(even_found));
    let opts = BatchOptions {
      concurrency: 1,
      request_delay: Duration::from_millis(500),
      use_cache: false,
    };

    let started = Instant::now();
    batch(stub, dir.path()).fetch_many(&keys(3), &opts).await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1000) && elapsed < Duration::from_millis(1500));
  }

  /// Tracks how many requests are in flight at once.
  struct SlowTransport {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
  }

  #[async_trait]
  impl Transport for SlowTransport {
    async fn get(&self, _key: &str) -> Result<Reply, TransportError> {
      let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
      self.peak.fetch_max(now, Ordering::SeqCst);
      tokio::time::sleep(Duration::from_millis(20)).await;
      self.in_flight.fetch_sub(1, Ordering::SeqCst);
      ok(WALLEYE)
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_worker_pool_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(SlowTransport {
      in_flight: AtomicUsize::new(0),
      peak: AtomicUsize::new(0),
    });

    let result = batch(transport.clone(), dir.path())
      .fetch_many(&keys(30), &options(5))
      .await;

    assert_eq!(result.stats.succeeded, 30);
    assert!(transport.peak.load(Ordering::SeqCst) <= 5);
    assert!(transport.peak.load(Ordering::SeqCst) > 1);
  }
}
