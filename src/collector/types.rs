//! Collected page result types

use crate::audit::types::{AuditResult, Device, Issue};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Bookkeeping about the run that produced a page's results
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
    /// Sum of plugin execution times for this page
    pub total_execution_time_ms: u64,
}

/// Everything the collector needs for one (page, device) context
#[derive(Debug, Clone, Default)]
pub struct PageResultInput {
    pub page: String,
    pub device: Option<Device>,
    pub url: String,
    /// Plugins expected to have reported, in execution order
    pub plugins: Vec<String>,
    pub plugin_results: HashMap<String, AuditResult>,
    pub execution_meta: ExecutionMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ValidationReport {
    pub(crate) fn error(&mut self, message: String) {
        self.is_valid = false;
        self.errors.push(message);
    }

    pub(crate) fn warning(&mut self, message: String) {
        self.warnings.push(message);
    }
}

/// Merged, validated results of every plugin for one context
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedPageResult {
    pub page: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    pub url: String,
    /// Present results of the listed plugins
    pub plugin_results: BTreeMap<String, AuditResult>,
    /// Issues of every present result, in plugin order
    pub all_issues: Vec<Issue>,
    /// One summary entry per present result, keyed by plugin name
    pub combined_metrics: BTreeMap<String, Value>,
    pub execution_meta: ExecutionMeta,
    pub validation: ValidationReport,
}

impl CollectedPageResult {
    /// Metadata reported by `plugin`, unchanged
    pub fn plugin_metadata(&self, plugin: &str) -> Option<&HashMap<String, Value>> {
        self.plugin_results.get(plugin).map(|r| &r.metadata)
    }

    pub fn successful_plugins(&self) -> usize {
        self.plugin_results.values().filter(|r| r.success).count()
    }

    pub fn failed_plugins(&self) -> usize {
        self.plugin_results.values().filter(|r| !r.success).count()
    }
}
