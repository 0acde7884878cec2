//! Lenient views over the LakeFinder `detail.cgi` response.
//!
//! The endpoint returns `{"status": ..., "result": {...}}` where `result` may
//! be an object, a string, or null depending on the lake. Nothing here fails
//! on shape defects: wrong-typed fields collapse to their default.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Deserialize a field, falling back to `T::default()` if it has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned + Default,
{
  let value = Value::deserialize(deserializer)?;
  Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Deserialize a list, keeping only the elements that have the expected shape.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned,
{
  let value = Value::deserialize(deserializer)?;
  let items = match value {
    Value::Array(items) => items,
    _ => return Ok(Vec::new()),
  };
  Ok(
    items
      .into_iter()
      .filter(Value::is_object)
      .filter_map(|item| serde_json::from_value(item).ok())
      .collect(),
  )
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiResponse {
  #[serde(default, deserialize_with = "lenient")]
  pub status: Option<String>,
  #[serde(default, deserialize_with = "lenient")]
  pub result: Option<ApiResult>,
}

impl ApiResponse {
  /// Read a payload without ever failing; anything unrecognisable is empty.
  pub fn from_value(payload: &Value) -> Self {
    if !payload.is_object() {
      return Self::default();
    }
    Self::deserialize(payload).unwrap_or_default()
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiResult {
  #[serde(default, deserialize_with = "lenient_list")]
  pub surveys: Vec<ApiSurvey>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ApiSurvey {
  #[serde(rename = "surveyType", default, deserialize_with = "lenient")]
  pub survey_type: Option<String>,
  #[serde(rename = "surveyDate", default, deserialize_with = "lenient")]
  pub survey_date: Option<String>,
  #[serde(rename = "surveyMethod", default, deserialize_with = "lenient")]
  pub survey_method: Option<String>,
  #[serde(rename = "fishCatchSummaries", default, deserialize_with = "lenient_list")]
  pub fish_catch_summaries: Vec<ApiCatchSummary>,
}

impl ApiSurvey {
  pub fn has_catch(&self) -> bool {
    !self.fish_catch_summaries.is_empty()
  }

  pub fn is_type(&self, survey_type: &str) -> bool {
    self.survey_type.as_deref() == Some(survey_type)
  }
}

/// One catch line. Numeric fields are kept raw; the endpoint mixes numbers
/// and numeric strings, so coercion happens in the parser.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ApiCatchSummary {
  #[serde(default, deserialize_with = "lenient")]
  pub species: Option<String>,
  #[serde(rename = "totalCatch", default)]
  pub total_catch: Value,
  #[serde(rename = "averageWeight", default)]
  pub average_weight: Value,
  #[serde(rename = "totalWeight", default)]
  pub total_weight: Value,
  #[serde(rename = "quartileWeight", default)]
  pub quartile_weight: Value,
  #[serde(default, deserialize_with = "lenient")]
  pub gear: Option<String>,
  #[serde(rename = "CPUE", default)]
  pub cpue: Value,
}
