use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::retry::RetryPolicy;
use super::transport::Transport;
use super::types::AbsenceReason;

/// Outcome of fetching one lake.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
  Found(Value),
  Absent(AbsenceReason),
}

/// Fetches raw survey payloads, classifying failures and retrying transient ones.
#[derive(Clone)]
pub struct SurveyClient {
  transport: Arc<dyn Transport>,
  policy: RetryPolicy,
}

impl SurveyClient {
  pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
    Self { transport, policy }
  }

  /// Fetch the payload for one lake.
  ///
  /// 404 and undecodable 200 bodies are final. Other statuses, timeouts and
  /// connection errors are retried until the attempt budget runs out.
  pub async fn fetch(&self, key: &str) -> FetchOutcome {
    debug!(key, "Fetching fish survey data");

    let mut attempt = 0;
    loop {
      attempt += 1;

      let backoff = match self.transport.get(key).await {
        Ok(reply) if reply.status == 200 => {
          return match serde_json::from_slice::<Value>(&reply.body) {
            Ok(payload) => {
              debug!(key, attempt, "Fetched fish survey data");
              FetchOutcome::Found(payload)
            }
            Err(e) => {
              warn!(key, "Invalid JSON response: {}", e);
              FetchOutcome::Absent(AbsenceReason::Undecodable)
            }
          };
        }
        Ok(reply) if reply.status == 404 => {
          debug!(key, "No fish survey data available");
          return FetchOutcome::Absent(AbsenceReason::NotFound);
        }
        Ok(reply) => {
          warn!(key, attempt, status = reply.status, "Unexpected HTTP status");
          self.policy.error_backoff
        }
        Err(e) => {
          warn!(key, attempt, "Request failed: {}", e);
          self.policy.backoff_for(&e)
        }
      };

      if !self.policy.should_retry(attempt) {
        error!(key, attempts = attempt, "Giving up on fish survey fetch");
        return FetchOutcome::Absent(AbsenceReason::RetriesExhausted);
      }

      tokio::time::sleep(backoff).await;
    }
  }
}
