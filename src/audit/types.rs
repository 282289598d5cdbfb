//! Audit data model
//!
//! Value types shared by plugins, the scheduler, the result collector and
//! the report aggregator. Everything here is plain data and serialises with
//! camelCase field names so the reporting layer can consume it directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Audit dimension an analyzer covers
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AuditType {
    Performance,
    Security,
    Accessibility,
    CodeQuality,
    Ux,
}

impl AuditType {
    /// Typical wall-clock time for one analyzer run of this type, in milliseconds
    ///
    /// Used by the planner when neither the plugin metadata nor its
    /// configuration provide an estimate.
    pub fn default_estimated_time_ms(&self) -> u64 {
        match self {
            AuditType::Performance => 15_000,
            AuditType::Accessibility => 8_000,
            AuditType::Ux => 6_000,
            AuditType::Security => 5_000,
            AuditType::CodeQuality => 3_000,
        }
    }
}

/// Coarse execution phase; every phase-1 plugin runs before any phase-2 plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Phase {
    First = 1,
    Second = 2,
    Third = 3,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::First, Phase::Second, Phase::Third];

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Phase {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Phase::First),
            2 => Ok(Phase::Second),
            3 => Ok(Phase::Third),
            other => Err(format!("phase must be 1, 2 or 3 (got {})", other)),
        }
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> Self {
        phase.as_u8()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Issue severity, ordered from least to most severe
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Weight used by issue prioritisation
    pub fn weight(&self) -> u32 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
        }
    }
}

/// Device profile a page is audited under
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Device {
    Mobile,
    Desktop,
}

/// A page to audit and the devices to audit it under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    pub path: String,
    pub label: String,
    pub devices: Vec<Device>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl PageConfig {
    pub fn new(path: impl Into<String>, label: impl Into<String>, devices: Vec<Device>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
            devices,
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Devices in configuration order with duplicates removed
    pub fn unique_devices(&self) -> Vec<Device> {
        let mut devices = Vec::with_capacity(self.devices.len());
        for device in &self.devices {
            if !devices.contains(device) {
                devices.push(*device);
            }
        }
        devices
    }
}

/// A single finding reported by an analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Analyzer-defined identifier; the same id may be reported by several analyzers
    pub id: String,
    pub audit_type: AuditType,
    pub severity: Severity,
    /// Estimated impact, 1..=100
    pub impact: u8,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub affected_pages: Vec<String>,
    #[serde(default)]
    pub fix_guidance: String,
}

impl Issue {
    pub fn new(
        id: impl Into<String>,
        audit_type: AuditType,
        severity: Severity,
        impact: u8,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            audit_type,
            severity,
            impact,
            title: title.into(),
            description: String::new(),
            affected_pages: Vec::new(),
            fix_guidance: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_affected_page(mut self, page: impl Into<String>) -> Self {
        self.affected_pages.push(page.into());
        self
    }

    pub fn with_fix_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.fix_guidance = guidance.into();
        self
    }

    pub fn has_valid_impact(&self) -> bool {
        (1..=100).contains(&self.impact)
    }
}

/// Output of one analyzer run against one audit context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub plugin_name: String,
    pub audit_type: AuditType,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub metrics: HashMap<String, Value>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub execution_time_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditResult {
    /// Create an empty successful result
    pub fn success(plugin_name: impl Into<String>, audit_type: AuditType) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            audit_type,
            issues: Vec::new(),
            metrics: HashMap::new(),
            metadata: HashMap::new(),
            execution_time_ms: 0,
            success: true,
            error: None,
        }
    }

    /// Create a failed result carrying the error message
    pub fn failure(
        plugin_name: impl Into<String>,
        audit_type: AuditType,
        error: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            audit_type,
            issues: Vec::new(),
            metrics: HashMap::new(),
            metadata: HashMap::new(),
            execution_time_ms,
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn with_issue(mut self, issue: Issue) -> Self {
        self.issues.push(issue);
        self
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_execution_time_ms(mut self, execution_time_ms: u64) -> Self {
        self.execution_time_ms = execution_time_ms;
        self
    }
}
