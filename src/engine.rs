//! Audit Engine
//!
//! Facade wiring the pieces of a run together: the plugin registry feeds
//! the batch scheduler, whose results go through the collector and end in
//! an aggregated report. The registry is mutable only between runs; each
//! run executes against a snapshot of it.

use crate::audit::context::ContextSet;
use crate::audit::types::PageConfig;
use crate::collector::collector::ResultCollector;
use crate::config::{ConfigError, EngineConfig};
use crate::core::error_handling::ContextualError;
use crate::plugin::config::PluginConfig;
use crate::plugin::error::PluginError;
use crate::plugin::registry::PluginRegistry;
use crate::plugin::traits::AuditPlugin;
use crate::report::aggregator::{aggregate, AuditReport};
use crate::scheduler::error::SchedulerError;
use crate::scheduler::events::SchedulerEvent;
use crate::scheduler::executor::{BatchScheduler, PlanExecutionResult};
use crate::scheduler::options::SchedulingOptions;
use crate::scheduler::plan::ExecutionPlan;
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl ContextualError for EngineError {
    fn is_user_actionable(&self) -> bool {
        match self {
            EngineError::Config(e) => e.is_user_actionable(),
            EngineError::Plugin(e) => e.is_user_actionable(),
            EngineError::Scheduler(e) => e.is_user_actionable(),
        }
    }

    fn user_message(&self) -> Option<String> {
        match self {
            EngineError::Config(e) => e.user_message(),
            EngineError::Plugin(e) => e.user_message(),
            EngineError::Scheduler(e) => e.user_message(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct AuditRun {
    pub plan: ExecutionPlan,
    pub execution: PlanExecutionResult,
    pub report: AuditReport,
}

pub struct AuditEngine {
    base_url: String,
    pages: Vec<PageConfig>,
    selection: Vec<String>,
    registry: PluginRegistry,
    options: SchedulingOptions,
    collector: ResultCollector,
    events: Option<UnboundedSender<SchedulerEvent>>,
}

impl AuditEngine {
    pub fn new(base_url: impl Into<String>, options: SchedulingOptions) -> EngineResult<Self> {
        options.validate()?;
        Ok(Self {
            base_url: base_url.into(),
            pages: Vec::new(),
            selection: Vec::new(),
            registry: PluginRegistry::new(),
            options,
            collector: ResultCollector::new(),
            events: None,
        })
    }

    /// Build an engine from a validated configuration
    ///
    /// `plugins` are registered in the given order. Plugins without an entry
    /// in `pluginConfigs` receive the default (enabled) configuration.
    pub fn from_config(
        config: EngineConfig,
        plugins: Vec<Arc<dyn AuditPlugin>>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let EngineConfig {
            base_url,
            pages,
            plugins: selection,
            plugin_configs,
            scheduling,
            ..
        } = config;

        let mut engine = Self::new(base_url, scheduling)?;
        engine.pages = pages;
        engine.selection = selection;

        for plugin in plugins {
            let name = plugin.plugin_info().name;
            engine.registry.register(plugin)?;
            let plugin_config = plugin_configs.get(&name).cloned().unwrap_or_default();
            engine.registry.configure(&name, plugin_config)?;
        }

        for name in plugin_configs.keys() {
            if !engine.registry.contains(name) {
                return Err(PluginError::PluginNotFound {
                    plugin_name: name.clone(),
                }
                .into());
            }
        }

        info!(
            "Engine configured with {} plugins and {} pages",
            engine.registry.len(),
            engine.pages.len()
        );
        Ok(engine)
    }

    pub fn with_event_sender(mut self, sender: UnboundedSender<SchedulerEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Register a plugin and enable it with the default configuration
    pub fn register_plugin(&mut self, plugin: Arc<dyn AuditPlugin>) -> EngineResult<()> {
        let name = plugin.plugin_info().name;
        self.registry.register(plugin)?;
        self.registry.configure(&name, PluginConfig::default())?;
        Ok(())
    }

    pub fn configure_plugin(&mut self, name: &str, config: PluginConfig) -> EngineResult<()> {
        self.registry.configure(name, config)?;
        Ok(())
    }

    pub fn add_page(&mut self, page: PageConfig) {
        self.pages.push(page);
    }

    /// Restrict runs to `names`; an empty selection runs every registered plugin
    pub fn select_plugins<S: AsRef<str>>(&mut self, names: &[S]) {
        self.selection = names.iter().map(|n| n.as_ref().to_string()).collect();
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn options(&self) -> &SchedulingOptions {
        &self.options
    }

    pub fn pages(&self) -> &[PageConfig] {
        &self.pages
    }

    fn selected_plugins(&self) -> Vec<String> {
        if self.selection.is_empty() {
            self.registry.names()
        } else {
            self.selection.clone()
        }
    }

    fn scheduler(&self) -> EngineResult<BatchScheduler> {
        let scheduler = BatchScheduler::new(Arc::new(self.registry.clone()), self.options.clone())?;
        Ok(match &self.events {
            Some(sender) => scheduler.with_event_sender(sender.clone()),
            None => scheduler,
        })
    }

    fn contexts(&self) -> EngineResult<ContextSet> {
        ContextSet::from_pages(&self.base_url, &self.pages)
            .map_err(|e| EngineError::Scheduler(e.into()))
    }

    /// Build the plan a run would execute, without executing it
    pub fn plan(&self) -> EngineResult<ExecutionPlan> {
        let contexts = self.contexts()?;
        let plan = self
            .scheduler()?
            .create_execution_plan(&contexts, &self.selected_plugins())?;
        Ok(plan)
    }

    /// Plan, execute, collect and aggregate one run
    pub async fn run(&self) -> EngineResult<AuditRun> {
        let contexts = self.contexts()?;
        let scheduler = self.scheduler()?;
        let selected = self.selected_plugins();

        let plan = scheduler.create_execution_plan(&contexts, &selected)?;
        info!(
            "Running {} with {} steps in {} batches",
            plan.id,
            plan.total_steps,
            plan.batches.len()
        );
        let execution = scheduler.execute_plan(&plan, &contexts).await;

        let enabled = self.registry.enabled_subset(&selected)?;
        let order = self.registry.resolve_execution_order(&enabled)?;
        let pages = self.collector.collect_from_plan(&contexts, &order, &execution);
        let report = aggregate(pages);

        debug!(
            "Run {} produced {} issues across {} pages",
            plan.id, report.summary.total_issues, report.summary.pages_audited
        );
        Ok(AuditRun {
            plan,
            execution,
            report,
        })
    }

    /// Release plugin resources; returns the number of failed cleanups
    pub async fn shutdown(&self) -> usize {
        self.registry.cleanup_all().await
    }
}
