use std::time::Duration;

use crate::config::Config;

use super::transport::TransportError;

/// How many times to try a request and how long to wait between attempts.
///
/// Timeouts get a longer pause than other transient failures; the endpoint
/// tends to time out when it is under load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, including the first one
  pub max_attempts: u32,
  pub error_backoff: Duration,
  pub timeout_backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      error_backoff: Duration::from_secs(1),
      timeout_backoff: Duration::from_secs(2),
    }
  }
}

impl RetryPolicy {
  pub fn from_config(config: &Config) -> Self {
    Self {
      max_attempts: config.max_retries.max(1),
      error_backoff: Duration::from_millis(config.retry_backoff_ms),
      timeout_backoff: Duration::from_millis(config.timeout_backoff_ms),
    }
  }

  /// Backoff after a transport failure.
  pub fn backoff_for(&self, error: &TransportError) -> Duration {
    if error.is_timeout() {
      self.timeout_backoff
    } else {
      self.error_backoff
    }
  }

  /// Whether another attempt is allowed after `attempt` (1-based) failed.
  pub fn should_retry(&self, attempt: u32) -> bool {
    attempt < self.max_attempts
  }
}
