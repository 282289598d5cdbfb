//! Plugin Error Handling
//!
//! Error types for plugin registration, dependency resolution, configuration
//! and analyzer execution.

use crate::core::error_handling::ContextualError;

/// Result type alias for plugin operations
pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Errors raised by the plugin registry and by plugin capabilities
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PluginError {
    /// A plugin with the same name is already registered or listed twice
    #[error("Plugin '{plugin_name}' is already registered")]
    DuplicatePlugin { plugin_name: String },

    /// A dependency is not registered, or missing from the requested set
    #[error("Plugin '{plugin_name}' depends on '{dependency}' which is not available")]
    UnresolvedDependency {
        plugin_name: String,
        dependency: String,
    },

    /// Dependency or data-flow cycle between plugins
    #[error("Dependency cycle detected: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    /// A plugin depends on a plugin that runs in a later phase
    #[error(
        "Plugin '{plugin_name}' (phase {phase}) depends on '{dependency}' from later phase {dependency_phase}"
    )]
    PhaseOrderViolation {
        plugin_name: String,
        phase: u8,
        dependency: String,
        dependency_phase: u8,
    },

    /// A plugin consumes a shared data key only produced in a later phase
    #[error(
        "Plugin '{plugin_name}' (phase {phase}) consumes '{key}' produced by '{producer}' in later phase {producer_phase}"
    )]
    SharedKeyPhaseViolation {
        plugin_name: String,
        phase: u8,
        key: String,
        producer: String,
        producer_phase: u8,
    },

    /// Plugin not found in registry
    #[error("Plugin not found: {plugin_name}")]
    PluginNotFound { plugin_name: String },

    #[error("Invalid plugin name '{plugin_name}': {reason}")]
    InvalidPluginName { plugin_name: String, reason: String },

    #[error("Plugin '{plugin_name}' declares invalid phase {phase} (expected 1, 2 or 3)")]
    InvalidPhase { plugin_name: String, phase: u8 },

    /// Plugin rejected its configuration
    #[error("Invalid configuration for plugin '{plugin_name}': {reason}")]
    InvalidConfiguration { plugin_name: String, reason: String },

    /// Plugin capability failed at runtime
    #[error("Plugin '{plugin_name}' failed during '{operation}': {cause}")]
    ExecutionError {
        plugin_name: String,
        operation: String,
        cause: String,
    },

    /// Plugin did not finish within its time allowance
    #[error("Plugin '{plugin_name}' timed out after {timeout_ms}ms")]
    Timeout { plugin_name: String, timeout_ms: u64 },
}

impl PluginError {
    /// Convenience constructor for runtime failures
    pub fn execution(
        plugin_name: impl Into<String>,
        operation: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        PluginError::ExecutionError {
            plugin_name: plugin_name.into(),
            operation: operation.into(),
            cause: cause.into(),
        }
    }

    /// True for failures that happen while an analyzer runs
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            PluginError::ExecutionError { .. } | PluginError::Timeout { .. }
        )
    }
}

impl ContextualError for PluginError {
    fn is_user_actionable(&self) -> bool {
        !self.is_execution_failure()
    }

    fn user_message(&self) -> Option<String> {
        if self.is_user_actionable() {
            Some(self.to_string())
        } else {
            None
        }
    }
}
