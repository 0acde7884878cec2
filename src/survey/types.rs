use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical fish survey summary for one lake.
///
/// This is the only shape that is persisted to the cache and handed back to
/// callers. Lakes without usable survey data get a sentinel with
/// `no_data_available` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveySummary {
  /// Lake identifier (DOWLKNUM)
  pub key: String,
  pub survey_date: Option<String>,
  pub survey_method: Option<String>,
  pub survey_type: Option<String>,
  #[serde(default)]
  pub fish_species: Vec<SpeciesCatch>,
  #[serde(default)]
  pub total_fish_caught: u64,
  /// When the summary was produced from a network response
  pub fetched_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub no_data_available: bool,
  /// Why no data is available, when it isn't
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub absence: Option<AbsenceReason>,
}

impl SurveySummary {
  /// Zero-value summary: no survey selected, nothing caught.
  pub fn empty(key: &str) -> Self {
    Self {
      key: key.to_string(),
      survey_date: None,
      survey_method: None,
      survey_type: None,
      fish_species: Vec::new(),
      total_fish_caught: 0,
      fetched_at: None,
      no_data_available: false,
      absence: None,
    }
  }

  /// Sentinel persisted for lakes the endpoint could not give us data for.
  pub fn no_data(key: &str, reason: AbsenceReason) -> Self {
    Self {
      fetched_at: Some(Utc::now()),
      no_data_available: true,
      absence: Some(reason),
      ..Self::empty(key)
    }
  }
}

/// Per-species catch line of the selected survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesCatch {
  pub species_name: String,
  pub count: u64,
  pub weight_stats: WeightStats,
  pub gear: String,
  /// Catch per unit effort
  pub cpue: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightStats {
  pub average: Option<f64>,
  pub total: Option<f64>,
  pub quartile: Option<f64>,
}

/// Why a fetch produced no payload.
///
/// `NotFound` and `Undecodable` are permanent for the call; `RetriesExhausted`
/// means every attempt failed transiently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceReason {
  NotFound,
  Undecodable,
  RetriesExhausted,
}

impl std::fmt::Display for AbsenceReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Self::NotFound => "not found",
      Self::Undecodable => "undecodable response",
      Self::RetriesExhausted => "retries exhausted",
    };
    f.write_str(s)
  }
}
