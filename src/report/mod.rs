//! Report Aggregator
//!
//! Priority ranking, cross-cutting issue detection and run summaries over
//! collected page results.

pub(crate) mod aggregator;
pub(crate) mod summary;

pub mod api;
