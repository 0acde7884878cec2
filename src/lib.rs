//! Fish survey enrichment for Minnesota lakes.
//!
//! Given lake identifiers (DOWLKNUM), fetch the fish survey record for each
//! lake from the DNR LakeFinder service, cache it on disk, and return one
//! canonical [`SurveySummary`] per lake.

pub mod batch;
pub mod cache;
pub mod config;
pub mod logging;
pub mod survey;

pub use batch::{BatchOptions, BatchResult, BatchStats, SurveyBatch};
pub use config::Config;
pub use survey::{CachedSurveyClient, SurveySummary};
