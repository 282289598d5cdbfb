//! Audit Data Model and Contexts
//!
//! Value types exchanged between analyzers and the engine, plus the
//! per-(page, device) execution context with its shared data store.

pub(crate) mod context;
pub(crate) mod error;
pub(crate) mod types;

pub mod api;
