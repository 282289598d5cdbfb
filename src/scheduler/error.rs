//! Scheduler error types

use crate::audit::error::AuditError;
use crate::core::error_handling::ContextualError;
use crate::plugin::error::PluginError;

/// Result type alias for scheduling operations
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

/// Errors that prevent a plan from being built or a batch from starting
///
/// Failures of individual tasks are never reported here; they are recorded
/// in the batch result instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulerError {
    /// Scheduling options cannot be satisfied
    #[error("Invalid scheduling options: {message}")]
    InvalidOptions { message: String },

    /// Plugin selection cannot be ordered or run together
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// Page configuration cannot be expanded into audit contexts
    #[error(transparent)]
    Context(#[from] AuditError),
}

impl SchedulerError {
    pub fn invalid_options(message: impl Into<String>) -> Self {
        SchedulerError::InvalidOptions {
            message: message.into(),
        }
    }
}

impl ContextualError for SchedulerError {
    fn is_user_actionable(&self) -> bool {
        match self {
            SchedulerError::InvalidOptions { .. } => true,
            SchedulerError::Plugin(e) => e.is_user_actionable(),
            SchedulerError::Context(e) => e.is_user_actionable(),
        }
    }

    fn user_message(&self) -> Option<String> {
        if self.is_user_actionable() {
            Some(self.to_string())
        } else {
            None
        }
    }
}
