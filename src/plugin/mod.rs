//! Plugin System Module
//!
//! Trait-based interface for audit analyzers, plus the registry that
//! resolves their execution order and checks that a selection of plugins
//! can run together.

// Internal modules - all access should go through api module
pub(crate) mod config;
pub(crate) mod dependency;
pub(crate) mod error;
pub(crate) mod registry;
pub(crate) mod traits;
pub(crate) mod types;

// Public API module - the only public interface for the plugin system
pub mod api;

#[cfg(test)]
pub(crate) mod tests;
