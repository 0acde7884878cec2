//! Caching implementations for survey types.

use crate::cache::Cacheable;

use super::types::SurveySummary;

impl Cacheable for SurveySummary {
  fn cache_key(&self) -> String {
    self.key.clone()
  }

  fn entity_type() -> &'static str {
    "fish_survey"
  }
}
