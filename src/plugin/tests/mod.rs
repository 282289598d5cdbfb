//! Test modules for the plugin system
//!
//! Registry unit tests live next to the registry; these suites cover
//! execution ordering, compatibility checks and error reporting.

pub(crate) mod utils;
