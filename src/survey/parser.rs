//! Selects one canonical survey out of a LakeFinder payload.

use serde_json::Value;
use tracing::debug;

use super::api_types::{ApiCatchSummary, ApiResponse, ApiSurvey};
use super::types::{SpeciesCatch, SurveySummary, WeightStats};

pub const STANDARD_SURVEY: &str = "Standard Survey";
pub const TARGETED_SURVEY: &str = "Targeted Survey";

const UNKNOWN: &str = "Unknown";

/// Parse a raw payload into a summary for `key`.
///
/// Never fails: a payload without usable surveys yields an empty summary.
pub fn parse_survey(key: &str, payload: &Value) -> SurveySummary {
  let mut summary = SurveySummary::empty(key);

  let surveys = match ApiResponse::from_value(payload).result {
    Some(result) => result.surveys,
    None => {
      debug!(key, "No usable 'result' object in response");
      return summary;
    }
  };

  let Some(selected) = select_survey(&surveys) else {
    debug!(key, surveys = surveys.len(), "No surveys with fish data");
    return summary;
  };

  debug!(
    key,
    survey_type = selected.survey_type.as_deref().unwrap_or(""),
    survey_date = selected.survey_date.as_deref().unwrap_or(""),
    "Selected survey"
  );

  summary.survey_date = selected.survey_date.clone();
  summary.survey_method = selected.survey_method.clone();
  summary.survey_type = selected.survey_type.clone();
  summary.fish_species = selected
    .fish_catch_summaries
    .iter()
    .map(species_catch)
    .collect();
  // Counts clamp at u64::MAX, so a plain sum could overflow
  summary.total_fish_caught = summary
    .fish_species
    .iter()
    .fold(0u64, |total, s| total.saturating_add(s.count));

  summary
}

/// Pick the survey to report.
///
/// Priority: most recent standard survey with catch data, then most recent
/// targeted survey with catch data, then the first survey with any catch data.
pub fn select_survey(surveys: &[ApiSurvey]) -> Option<&ApiSurvey> {
  most_recent_of_type(surveys, STANDARD_SURVEY)
    .or_else(|| most_recent_of_type(surveys, TARGETED_SURVEY))
    .or_else(|| surveys.iter().find(|s| s.has_catch()))
}

fn most_recent_of_type<'a>(surveys: &'a [ApiSurvey], survey_type: &str) -> Option<&'a ApiSurvey> {
  // Dates are ISO-like, so string order is date order. `max_by` keeps the
  // last maximum, so reduce by hand to keep the first one on ties.
  surveys
    .iter()
    .filter(|s| s.is_type(survey_type) && s.has_catch())
    .fold(None, |best, s| match best {
      Some(b) if date_of(s) <= date_of(b) => Some(b),
      _ => Some(s),
    })
}

fn date_of(survey: &ApiSurvey) -> &str {
  survey.survey_date.as_deref().unwrap_or("")
}

fn species_catch(raw: &ApiCatchSummary) -> SpeciesCatch {
  SpeciesCatch {
    species_name: raw.species.clone().unwrap_or_else(|| UNKNOWN.to_string()),
    count: coerce_count(&raw.total_catch),
    weight_stats: WeightStats {
      average: coerce_f64(&raw.average_weight),
      total: coerce_f64(&raw.total_weight),
      quartile: coerce_f64(&raw.quartile_weight),
    },
    gear: raw.gear.clone().unwrap_or_else(|| UNKNOWN.to_string()),
    cpue: coerce_f64(&raw.cpue),
  }
}

/// Numbers and numeric strings become `f64`; anything else is `None`.
pub fn coerce_f64(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
    _ => None,
  }
}

fn coerce_count(value: &Value) -> u64 {
  match value {
    Value::Number(n) => n
      .as_u64()
      .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
      .unwrap_or(0),
    Value::String(s) => s.trim().parse::<u64>().unwrap_or(0),
    _ => 0,
  }
}
