//! Result Collector
//!
//! Merges per-plugin audit results into validated page results.

#[allow(clippy::module_inception)]
pub(crate) mod collector;
pub(crate) mod types;

pub mod api;
