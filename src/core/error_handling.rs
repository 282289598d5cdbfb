//! Generic error handling utilities
//!
//! Every error type in the engine implements [`ContextualError`] so that a
//! calling layer can log it consistently without knowing which component
//! produced it.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// Configuration mistakes (duplicate plugin names, dependency cycles, zero
/// parallelism) are user-actionable: the caller fixes the configuration and
/// retries. Failures raised while running an analyzer are system errors.
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(message)`; otherwise it returns `None`.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error carries a message the user can act on directly
    fn is_user_actionable(&self) -> bool;

    /// Returns the specific user message if this is a user-actionable error
    fn user_message(&self) -> Option<String>;
}

/// Log errors with appropriate detail level based on error specificity
///
/// User-actionable errors log their own message; system errors log the
/// operation context. Full details always go to debug level.
///
/// # Examples
/// ```rust
/// use pageaudit::core::error_handling::log_error_with_context;
/// use pageaudit::plugin::api::PluginError;
///
/// let error = PluginError::DuplicatePlugin {
///     plugin_name: "lighthouse".to_string(),
/// };
/// log_error_with_context(&error, "Plugin registration");
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => {
            log::error!("{}: {}", operation_context, user_msg);
        }
        _ => {
            log::error!("{} failed", operation_context);
        }
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
