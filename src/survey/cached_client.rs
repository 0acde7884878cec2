//! Survey client that wraps SurveyClient with transparent caching.

use chrono::Utc;
use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::{CacheLayer, CacheResult, CacheStats, FsStorage};
use crate::config::Config;

use super::client::{FetchOutcome, SurveyClient};
use super::parser::parse_survey;
use super::retry::RetryPolicy;
use super::transport::{HttpTransport, Transport};
use super::types::SurveySummary;

/// Survey client with transparent caching support.
///
/// Resolves one lake at a time: a fresh cache entry is returned unchanged,
/// otherwise the lake is fetched, parsed (or turned into a no-data sentinel)
/// and written back.
#[derive(Clone)]
pub struct CachedSurveyClient {
  inner: SurveyClient,
  cache: CacheLayer<FsStorage>,
}

impl CachedSurveyClient {
  /// Create a client talking to the configured endpoint.
  pub fn new(config: &Config) -> Result<Self> {
    let transport = HttpTransport::new(config)?;
    Ok(Self::with_transport(Arc::new(transport), config))
  }

  /// Create a client over any transport.
  pub fn with_transport(transport: Arc<dyn Transport>, config: &Config) -> Self {
    let inner = SurveyClient::new(transport, RetryPolicy::from_config(config));
    let cache = CacheLayer::new(FsStorage::new(&config.cache_dir)).with_ttl(config.cache_ttl());

    Self { inner, cache }
  }

  pub fn cache_stats(&self) -> CacheStats {
    self.cache.stats::<SurveySummary>()
  }

  /// Delete every cached survey.
  pub fn clear_cache(&self) -> Result<usize> {
    self.cache.purge_all::<SurveySummary>()
  }

  /// Resolve the survey summary for one lake.
  ///
  /// `pacing` is slept before any network request, never on a cache hit.
  pub async fn get_survey(
    &self,
    key: &str,
    use_cache: bool,
    pacing: Duration,
  ) -> CacheResult<SurveySummary> {
    if use_cache {
      self
        .cache
        .fetch_one(key, || self.fetch_summary(key, pacing))
        .await
    } else {
      CacheResult::from_network(self.fetch_summary(key, pacing).await)
    }
  }

  async fn fetch_summary(&self, key: &str, pacing: Duration) -> SurveySummary {
    if !pacing.is_zero() {
      tokio::time::sleep(pacing).await;
    }

    match self.inner.fetch(key).await {
      FetchOutcome::Found(payload) => {
        let mut summary = parse_survey(key, &payload);
        summary.fetched_at = Some(Utc::now());
        summary
      }
      FetchOutcome::Absent(reason) => {
        debug!(key, %reason, "No survey data, recording sentinel");
        SurveySummary::no_data(key, reason)
      }
    }
  }
}
