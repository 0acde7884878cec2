//! HTTP transport for the LakeFinder endpoint.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::Config;

/// Raw reply from the endpoint, before any classification.
#[derive(Debug, Clone)]
pub struct Reply {
  pub status: u16,
  pub body: Vec<u8>,
}

/// Failures that happen before a status code is available.
#[derive(Debug, Error)]
pub enum TransportError {
  #[error("request timed out")]
  Timeout,

  #[error("connection failed: {0}")]
  Connect(String),

  #[error("request failed: {0}")]
  Http(String),
}

impl TransportError {
  pub fn is_timeout(&self) -> bool {
    matches!(self, Self::Timeout)
  }
}

impl From<reqwest::Error> for TransportError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      Self::Timeout
    } else if err.is_connect() {
      Self::Connect(err.to_string())
    } else {
      Self::Http(err.to_string())
    }
  }
}

/// Issues one request for one lake.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn get(&self, key: &str) -> std::result::Result<Reply, TransportError>;
}

/// reqwest-backed transport with a fixed timeout and user agent.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  endpoint: Url,
  survey_type: String,
}

impl HttpTransport {
  pub fn new(config: &Config) -> Result<Self> {
    let endpoint = Url::parse(&config.endpoint)
      .map_err(|e| eyre!("Invalid endpoint URL {}: {}", config.endpoint, e))?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.request_timeout_secs))
      .user_agent(&config.user_agent)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      endpoint,
      survey_type: config.survey_type.clone(),
    })
  }

  /// Full request URL for a lake.
  pub fn request_url(&self, key: &str) -> Url {
    let mut url = self.endpoint.clone();
    url
      .query_pairs_mut()
      .append_pair("type", &self.survey_type)
      .append_pair("id", key);
    url
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn get(&self, key: &str) -> std::result::Result<Reply, TransportError> {
    let response = self.client.get(self.request_url(key)).send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?;

    Ok(Reply {
      status,
      body: body.to_vec(),
    })
  }
}
