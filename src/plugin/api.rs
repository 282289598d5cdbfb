//! Public API for the plugin system
//!
//! External modules should import from here rather than directly from
//! internal modules.

// Plugin registry
pub use crate::plugin::registry::PluginRegistry;

// Error handling
pub use crate::plugin::error::{PluginError, PluginResult};

// Plugin metadata and capabilities
pub use crate::plugin::traits::AuditPlugin;
pub use crate::plugin::types::PluginInfo;

// Plugin configuration
pub use crate::plugin::config::PluginConfig;
