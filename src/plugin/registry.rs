//! Plugin Registry
//!
//! Holds the registered analyzers, their captured metadata and their most
//! recently applied configuration. Registration and configuration happen in
//! a setup phase; the scheduler then reads the registry through an `Arc`
//! and never mutates it.

use crate::audit::types::{AuditType, Phase};
use crate::core::validation::validate_plugin_name;
use crate::plugin::config::PluginConfig;
use crate::plugin::dependency::DependencyGraph;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::traits::AuditPlugin;
use crate::plugin::types::PluginInfo;
use log::{debug, error};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Clone)]
struct RegisteredPlugin {
    info: PluginInfo,
    plugin: Arc<dyn AuditPlugin>,
    registration_index: usize,
}

/// Plugin registry for managing analyzers
///
/// Cloning a registry is cheap: plugins are shared, metadata and
/// configuration are copied.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, RegisteredPlugin>,
    /// Plugin names in registration order
    order: Vec<String>,
    configs: HashMap<String, PluginConfig>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.order)
            .field("configs", &self.configs)
            .finish()
    }
}

impl PluginRegistry {
    /// Create a new empty plugin registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin
    ///
    /// Dependencies must already be registered, so a registry can never
    /// hold a forward reference.
    pub fn register(&mut self, plugin: Arc<dyn AuditPlugin>) -> PluginResult<()> {
        let info = plugin.plugin_info();

        validate_plugin_name(&info.name).map_err(|reason| PluginError::InvalidPluginName {
            plugin_name: info.name.clone(),
            reason,
        })?;

        if self.plugins.contains_key(&info.name) {
            return Err(PluginError::DuplicatePlugin {
                plugin_name: info.name,
            });
        }

        if let Some(missing) = info
            .dependencies
            .iter()
            .find(|dep| !self.plugins.contains_key(dep.as_str()))
        {
            return Err(PluginError::UnresolvedDependency {
                plugin_name: info.name.clone(),
                dependency: missing.clone(),
            });
        }

        debug!(
            "Registered plugin '{}' v{} ({}, phase {})",
            info.name, info.version, info.audit_type, info.phase
        );

        let name = info.name.clone();
        self.plugins.insert(
            name.clone(),
            RegisteredPlugin {
                info,
                plugin,
                registration_index: self.order.len(),
            },
        );
        self.order.push(name);
        Ok(())
    }

    /// Get a plugin by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn AuditPlugin>> {
        self.plugins.get(name).map(|p| Arc::clone(&p.plugin))
    }

    /// Metadata captured when the plugin was registered
    pub fn info(&self, name: &str) -> Option<&PluginInfo> {
        self.plugins.get(name).map(|p| &p.info)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// All plugins in registration order
    pub fn list(&self) -> Vec<&PluginInfo> {
        self.order
            .iter()
            .filter_map(|name| self.info(name))
            .collect()
    }

    /// Plugin names in registration order
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn get_by_type(&self, audit_type: AuditType) -> Vec<&PluginInfo> {
        self.list()
            .into_iter()
            .filter(|info| info.audit_type == audit_type)
            .collect()
    }

    pub fn get_by_phase(&self, phase: Phase) -> Vec<&PluginInfo> {
        self.list()
            .into_iter()
            .filter(|info| info.phase == phase)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    fn lookup(&self, name: &str) -> PluginResult<&RegisteredPlugin> {
        self.plugins
            .get(name)
            .ok_or_else(|| PluginError::PluginNotFound {
                plugin_name: name.to_string(),
            })
    }

    /// Order `names` for execution
    ///
    /// Plugins are ordered by phase, then so that every plugin follows the
    /// plugins it depends on, then by registration order. Dependencies
    /// outside `names` are ignored. Repeated names are resolved once.
    /// Depending on, or consuming a key produced by, a later-phase plugin
    /// is an error.
    pub fn resolve_execution_order<S: AsRef<str>>(&self, names: &[S]) -> PluginResult<Vec<String>> {
        let mut seen = HashSet::new();
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let registered = self.lookup(name)?;
            if seen.insert(name) {
                selected.push(registered);
            }
        }
        selected.sort_by_key(|p| (p.info.phase, p.registration_index));

        for plugin in &selected {
            for dep in &plugin.info.dependencies {
                if !seen.contains(dep.as_str()) {
                    continue;
                }
                let dep_info = &self.lookup(dep)?.info;
                if dep_info.phase > plugin.info.phase {
                    return Err(PluginError::PhaseOrderViolation {
                        plugin_name: plugin.info.name.clone(),
                        phase: plugin.info.phase.as_u8(),
                        dependency: dep.clone(),
                        dependency_phase: dep_info.phase.as_u8(),
                    });
                }
            }
        }

        for consumer in &selected {
            for key in &consumer.info.consumes {
                let late_producer = selected.iter().find(|p| {
                    p.info.phase > consumer.info.phase && p.info.produces.contains(key)
                });
                if let Some(producer) = late_producer {
                    return Err(PluginError::SharedKeyPhaseViolation {
                        plugin_name: consumer.info.name.clone(),
                        phase: consumer.info.phase.as_u8(),
                        key: key.clone(),
                        producer: producer.info.name.clone(),
                        producer_phase: producer.info.phase.as_u8(),
                    });
                }
            }
        }

        let mut graph = DependencyGraph::new();
        for plugin in &selected {
            graph.add_node(&plugin.info.name);
        }
        for plugin in &selected {
            for dep in &plugin.info.dependencies {
                graph.add_edge(dep, &plugin.info.name);
            }
        }

        let order = graph
            .topological_order()
            .map_err(|cycle| PluginError::DependencyCycle { cycle })?;
        debug!("Resolved plugin execution order: {:?}", order);
        Ok(order)
    }

    /// Check that `names` can run together
    ///
    /// Fails when a name is listed twice, is not registered, or depends on a
    /// plugin missing from `names`.
    pub fn validate_compatibility<S: AsRef<str>>(&self, names: &[S]) -> PluginResult<()> {
        let mut set = HashSet::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            self.lookup(name)?;
            if !set.insert(name) {
                return Err(PluginError::DuplicatePlugin {
                    plugin_name: name.to_string(),
                });
            }
        }

        for name in names {
            let info = &self.lookup(name.as_ref())?.info;
            if let Some(missing) = info
                .dependencies
                .iter()
                .find(|dep| !set.contains(dep.as_str()))
            {
                return Err(PluginError::UnresolvedDependency {
                    plugin_name: info.name.clone(),
                    dependency: missing.clone(),
                });
            }
        }
        Ok(())
    }

    /// Validate and apply `config` to plugin `name`, replacing any earlier config
    pub fn configure(&mut self, name: &str, config: PluginConfig) -> PluginResult<()> {
        let plugin = Arc::clone(&self.lookup(name)?.plugin);

        if config.timeout_ms == Some(0) {
            return Err(PluginError::InvalidConfiguration {
                plugin_name: name.to_string(),
                reason: "timeoutMs must be greater than zero".to_string(),
            });
        }
        if !plugin.validate(&config) {
            return Err(PluginError::InvalidConfiguration {
                plugin_name: name.to_string(),
                reason: "configuration rejected by plugin".to_string(),
            });
        }
        plugin.configure(&config)?;

        debug!(
            "Configured plugin '{}' (enabled: {})",
            name, config.enabled
        );
        self.configs.insert(name.to_string(), config);
        Ok(())
    }

    /// Most recently applied configuration
    pub fn config(&self, name: &str) -> Option<&PluginConfig> {
        self.configs.get(name)
    }

    /// False until a configuration enabling the plugin has been applied
    pub fn is_enabled(&self, name: &str) -> bool {
        self.configs.get(name).map(|c| c.enabled).unwrap_or(false)
    }

    /// Keep the enabled plugins of `names`, preserving order
    pub fn enabled_subset<S: AsRef<str>>(&self, names: &[S]) -> PluginResult<Vec<String>> {
        let mut enabled = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            self.lookup(name)?;
            if self.is_enabled(name) {
                enabled.push(name.to_string());
            }
        }
        Ok(enabled)
    }

    /// Run every plugin's cleanup concurrently
    ///
    /// Failures are logged and counted, never propagated.
    pub async fn cleanup_all(&self) -> usize {
        let cleanups = self.order.iter().filter_map(|name| {
            self.plugins.get(name).map(|registered| {
                let plugin = Arc::clone(&registered.plugin);
                let name = name.clone();
                async move { (name, plugin.cleanup().await) }
            })
        });

        let mut failures = 0;
        for (name, result) in futures::future::join_all(cleanups).await {
            if let Err(e) = result {
                error!("Cleanup failed for plugin '{}': {}", name, e);
                failures += 1;
            }
        }
        failures
    }
}
