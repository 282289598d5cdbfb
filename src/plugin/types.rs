//! Type definitions for the plugin system
//!
//! Metadata an analyzer declares about itself. The registry captures it once
//! at registration; later changes in what a plugin reports are not observed.

use crate::audit::types::{AuditType, Phase};
use crate::plugin::error::{PluginError, PluginResult};
use serde::{Deserialize, Serialize};

/// Plugin metadata information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub audit_type: AuditType,
    pub phase: Phase,
    /// Plugins that must run before this one
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Shared data keys this plugin writes on success
    #[serde(default)]
    pub produces: Vec<String>,
    /// Shared data keys this plugin reads when present
    #[serde(default)]
    pub consumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_ms: Option<u64>,
}

impl PluginInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        audit_type: AuditType,
        phase: Phase,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            audit_type,
            phase,
            dependencies: Vec::new(),
            produces: Vec::new(),
            consumes: Vec::new(),
            estimated_time_ms: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the phase from its numeric form
    pub fn with_phase_number(mut self, phase: u8) -> PluginResult<Self> {
        self.phase = Phase::try_from(phase).map_err(|_| PluginError::InvalidPhase {
            plugin_name: self.name.clone(),
            phase,
        })?;
        Ok(self)
    }

    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        push_unique(&mut self.dependencies, name.into());
        self
    }

    pub fn with_produces(mut self, key: impl Into<String>) -> Self {
        push_unique(&mut self.produces, key.into());
        self
    }

    pub fn with_consumes(mut self, key: impl Into<String>) -> Self {
        push_unique(&mut self.consumes, key.into());
        self
    }

    pub fn with_estimated_time_ms(mut self, estimated_time_ms: u64) -> Self {
        self.estimated_time_ms = Some(estimated_time_ms);
        self
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name)
    }
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}
