//! Fish survey retrieval from the Minnesota DNR LakeFinder service.

pub mod api_types;
mod cache;
pub mod cached_client;
pub mod client;
pub mod parser;
pub mod retry;
pub mod transport;
pub mod types;

pub use cached_client::CachedSurveyClient;
pub use client::{FetchOutcome, SurveyClient};
pub use parser::parse_survey;
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, Reply, Transport, TransportError};
pub use types::{AbsenceReason, SpeciesCatch, SurveySummary, WeightStats};
