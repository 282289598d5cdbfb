//! Engine configuration
//!
//! An [`EngineConfig`] is parsed from an in-memory TOML document. Keys are
//! camelCase to match the JSON shape of the same types:
//!
//! ```toml
//! baseUrl = "https://example.com"
//! plugins = ["lighthouse", "axe"]
//!
//! [[pages]]
//! path = "/"
//! label = "Home"
//! devices = ["mobile", "desktop"]
//!
//! [scheduling]
//! maxParallelPages = 2
//!
//! [pluginConfigs.lighthouse]
//! timeoutMs = 45000
//! settings = { runs = 3 }
//! ```

use crate::audit::types::PageConfig;
use crate::core::error_handling::ContextualError;
use crate::core::logging::init_logging;
use crate::core::validation::{validate_page_path, validate_plugin_name};
use crate::plugin::config::PluginConfig;
use crate::scheduler::options::SchedulingOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashSet;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<String> {
        Some(self.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Logger settings applied by [`LoggingConfig::apply`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text`, `ext` or `json`
    pub format: String,
    pub file: Option<String>,
    pub color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
            color: true,
        }
    }
}

impl LoggingConfig {
    pub fn apply(&self) -> Result<(), Box<dyn std::error::Error>> {
        init_logging(
            Some(&self.level),
            Some(&self.format),
            self.file.as_deref(),
            self.color,
        )
    }
}

/// Everything needed to set up an audit run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub base_url: String,
    #[serde(default)]
    pub pages: Vec<PageConfig>,
    /// Plugins to run; empty means every registered plugin
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub plugin_configs: BTreeMap<String, PluginConfig>,
    #[serde(default)]
    pub scheduling: SchedulingOptions,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            pages: Vec::new(),
            plugins: Vec::new(),
            plugin_configs: BTreeMap::new(),
            scheduling: SchedulingOptions::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::invalid("baseUrl cannot be empty"));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::invalid(format!(
                "baseUrl '{}' must start with http:// or https://",
                base_url
            )));
        }

        let mut paths = HashSet::new();
        for page in &self.pages {
            let path = validate_page_path(&page.path).map_err(ConfigError::invalid)?;
            if page.devices.is_empty() {
                return Err(ConfigError::invalid(format!(
                    "Page '{}' must list at least one device",
                    path
                )));
            }
            if !paths.insert(path.clone()) {
                return Err(ConfigError::invalid(format!(
                    "Page '{}' is configured more than once",
                    path
                )));
            }
        }

        for name in self.plugins.iter().chain(self.plugin_configs.keys()) {
            validate_plugin_name(name).map_err(ConfigError::invalid)?;
        }

        self.scheduling
            .validate()
            .map_err(|e| ConfigError::invalid(e.to_string()))
    }

    pub fn with_page(mut self, page: PageConfig) -> Self {
        self.pages.push(page);
        self
    }

    pub fn with_plugin_config(mut self, name: impl Into<String>, config: PluginConfig) -> Self {
        self.plugin_configs.insert(name.into(), config);
        self
    }

    pub fn with_scheduling(mut self, scheduling: SchedulingOptions) -> Self {
        self.scheduling = scheduling;
        self
    }
}
