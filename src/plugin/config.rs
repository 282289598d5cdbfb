//! Plugin Configuration
//!
//! Per-plugin settings supplied by the caller. Applying a configuration again
//! replaces the previous one for that plugin.

use crate::audit::types::Severity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Configuration passed to a plugin's `validate` and `configure`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Plugin-specific settings
    #[serde(default)]
    pub settings: HashMap<String, Value>,
    /// Per-task time limit; the scheduler's `taskTimeoutMs` still applies
    /// when it is shorter. Also used as the planning estimate when the
    /// plugin declares none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Minimum impact per severity below which a plugin may drop findings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_thresholds: Option<BTreeMap<Severity, u8>>,
}

fn default_enabled() -> bool {
    true
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settings: HashMap::new(),
            timeout_ms: None,
            severity_thresholds: None,
        }
    }
}

impl PluginConfig {
    pub fn enabled() -> Self {
        Self::default()
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_severity_threshold(mut self, severity: Severity, min_impact: u8) -> Self {
        self.severity_thresholds
            .get_or_insert_with(BTreeMap::new)
            .insert(severity, min_impact);
        self
    }

    /// Get a string configuration value with default
    pub fn get_string(&self, key: &str, default: &str) -> String {
        if let Some(Value::String(s)) = self.settings.get(key) {
            s.clone()
        } else {
            default.to_string()
        }
    }

    /// Get a boolean configuration value with default
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        if let Some(Value::Bool(b)) = self.settings.get(key) {
            *b
        } else {
            default
        }
    }

    /// Get an unsigned integer configuration value with default
    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.settings
            .get(key)
            .and_then(Value::as_u64)
            .unwrap_or(default)
    }

    /// Minimum impact configured for `severity`, if any
    pub fn severity_threshold(&self, severity: Severity) -> Option<u8> {
        self.severity_thresholds
            .as_ref()
            .and_then(|thresholds| thresholds.get(&severity).copied())
    }
}
