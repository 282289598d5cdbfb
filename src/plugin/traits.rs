//! Plugin Trait System
//!
//! The analyzer boundary. An analyzer is any value implementing
//! [`AuditPlugin`]; the engine never looks at how findings are obtained.
//!
//! Plugins are shared between concurrently running tasks (one task per
//! audit context), so every capability takes `&self`. Plugins that keep
//! configuration state use interior mutability.

use crate::audit::context::AuditContext;
use crate::audit::types::AuditResult;
use crate::plugin::config::PluginConfig;
use crate::plugin::error::PluginResult;
use crate::plugin::types::PluginInfo;

/// Capabilities every analyzer must provide
#[async_trait::async_trait]
pub trait AuditPlugin: Send + Sync {
    /// Get plugin metadata
    fn plugin_info(&self) -> PluginInfo;

    /// Apply configuration; called after `validate` accepted it
    fn configure(&self, config: &PluginConfig) -> PluginResult<()>;

    /// Audit one (page, device) context
    ///
    /// Consumed shared data keys may be absent, in which case the plugin
    /// falls back to its own defaults rather than failing.
    async fn audit(&self, context: &AuditContext) -> PluginResult<AuditResult>;

    /// Release any resources held by the plugin
    async fn cleanup(&self) -> PluginResult<()>;

    /// Check whether `config` is acceptable without applying it
    fn validate(&self, config: &PluginConfig) -> bool;
}
