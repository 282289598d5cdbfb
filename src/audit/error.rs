//! Audit context error types

use crate::core::error_handling::ContextualError;

/// Errors raised while building audit contexts or touching their shared data
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuditError {
    /// Page configuration cannot be expanded into contexts
    #[error("Invalid page '{path}': {reason}")]
    InvalidPage { path: String, reason: String },

    /// Two page configs expand to the same (page, device) context
    #[error("Duplicate audit context '{key}'")]
    DuplicateContext { key: String },

    /// Shared data store lock was poisoned by a panicking task
    #[error("Shared data unavailable: {message}")]
    SharedDataPoisoned { message: String },
}

impl ContextualError for AuditError {
    fn is_user_actionable(&self) -> bool {
        !matches!(self, AuditError::SharedDataPoisoned { .. })
    }

    fn user_message(&self) -> Option<String> {
        if self.is_user_actionable() {
            Some(self.to_string())
        } else {
            None
        }
    }
}

/// Result type for audit context operations
pub type ContextResult<T> = Result<T, AuditError>;
