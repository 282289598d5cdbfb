//! Validation utilities for configuration values
//!
//! Shared checks used by plugin registration, scheduling options and page
//! configuration. Each returns a human-readable message on failure; callers
//! wrap it in their own error type.

use once_cell::sync::Lazy;
use regex::Regex;

/// Smallest timeout the scheduler accepts, in milliseconds
pub const MIN_TIMEOUT_MS: u64 = 1000;

static PLUGIN_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("plugin name pattern is valid")
});

/// Validate that a limit is greater than zero
pub fn validate_positive_limit(name: &str, value: usize) -> Result<usize, String> {
    if value == 0 {
        return Err(format!("{} must be greater than 0", name));
    }
    Ok(value)
}

/// Validate a timeout expressed in milliseconds
pub fn validate_timeout_ms(name: &str, value: u64) -> Result<u64, String> {
    if value < MIN_TIMEOUT_MS {
        return Err(format!(
            "{} must be at least {}ms (got {}ms)",
            name, MIN_TIMEOUT_MS, value
        ));
    }
    Ok(value)
}

/// Validate plugin name syntax
pub fn validate_plugin_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Plugin name cannot be empty".to_string());
    }
    if !PLUGIN_NAME_PATTERN.is_match(name) {
        return Err(format!(
            "Invalid plugin name '{}': use letters, digits, '-', '_' or '.'",
            name
        ));
    }
    Ok(())
}

/// Validate and normalise a page path so that it always starts with '/'
pub fn validate_page_path(path: &str) -> Result<String, String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err("Page path cannot be empty".to_string());
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(format!("Page path '{}' cannot contain whitespace", trimmed));
    }
    if trimmed.starts_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("/{}", trimmed))
    }
}
