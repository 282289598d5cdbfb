//! Common test utilities and helpers
//!
//! Scripted plugins whose behaviour (delay, failure, panic, produced
//! metrics) is chosen per test, plus small fixtures for pages and options.

#![allow(dead_code)]

use async_trait::async_trait;
use pageaudit::audit::api::{
    AuditContext, AuditResult, AuditType, ContextKey, Device, Issue, PageConfig, Phase,
};
use pageaudit::plugin::api::{
    AuditPlugin, PluginConfig, PluginError, PluginInfo, PluginRegistry, PluginResult,
};
use pageaudit::scheduler::api::SchedulingOptions;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeed,
    /// `audit` returns an error
    Error,
    /// `audit` returns a result with `success = false`
    Unsuccessful,
    Panic,
}

/// Plugin driven entirely by its builder settings
#[derive(Debug)]
pub struct ScriptedPlugin {
    info: PluginInfo,
    outcome: Outcome,
    delay: Duration,
    blocking: Duration,
    issues: Vec<Issue>,
    metrics: Vec<(String, Value)>,
    seen: Mutex<Vec<(ContextKey, HashMap<String, Value>)>>,
    calls: AtomicUsize,
}

impl ScriptedPlugin {
    pub fn new(name: &str, audit_type: AuditType, phase: Phase) -> Self {
        Self {
            info: PluginInfo::new(name, "1.0.0", audit_type, phase),
            outcome: Outcome::Succeed,
            delay: Duration::ZERO,
            blocking: Duration::ZERO,
            issues: Vec::new(),
            metrics: Vec::new(),
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }

    /// Block the worker thread instead of yielding; only the batch deadline can stop it
    pub fn with_blocking_ms(mut self, blocking_ms: u64) -> Self {
        self.blocking = Duration::from_millis(blocking_ms);
        self
    }

    pub fn with_estimate_ms(mut self, estimate_ms: u64) -> Self {
        self.info = self.info.with_estimated_time_ms(estimate_ms);
        self
    }

    pub fn with_dependency(mut self, name: &str) -> Self {
        self.info = self.info.with_dependency(name);
        self
    }

    pub fn producing(mut self, key: &str, value: Value) -> Self {
        self.info = self.info.with_produces(key);
        self.metrics.push((key.to_string(), value));
        self
    }

    pub fn consuming(mut self, key: &str) -> Self {
        self.info = self.info.with_consumes(key);
        self
    }

    pub fn with_issue(mut self, issue: Issue) -> Self {
        self.issues.push(issue);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared data visible at the start of each audit, per context
    pub fn seen(&self) -> Vec<(ContextKey, HashMap<String, Value>)> {
        self.seen.lock().unwrap().clone()
    }

    pub fn seen_for(&self, key: &ContextKey) -> Option<HashMap<String, Value>> {
        self.seen()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, data)| data)
    }
}

#[async_trait]
impl AuditPlugin for ScriptedPlugin {
    fn plugin_info(&self) -> PluginInfo {
        self.info.clone()
    }

    fn configure(&self, _config: &PluginConfig) -> PluginResult<()> {
        Ok(())
    }

    async fn audit(&self, context: &AuditContext) -> PluginResult<AuditResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let snapshot = context.shared_data.snapshot().unwrap_or_default();
        self.seen.lock().unwrap().push((context.key(), snapshot));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if !self.blocking.is_zero() {
            std::thread::sleep(self.blocking);
        }

        match self.outcome {
            Outcome::Succeed => {}
            Outcome::Error => {
                return Err(PluginError::execution(&self.info.name, "audit", "scripted failure"))
            }
            Outcome::Unsuccessful => {
                return Ok(AuditResult::failure(
                    &self.info.name,
                    self.info.audit_type,
                    "scripted unsuccessful audit",
                    1,
                ))
            }
            Outcome::Panic => panic!("scripted panic in {}", self.info.name),
        }

        let mut result = AuditResult::success(&self.info.name, self.info.audit_type);
        for issue in &self.issues {
            result = result.with_issue(issue.clone());
        }
        for (key, value) in &self.metrics {
            result = result.with_metric(key.clone(), value.clone());
        }
        Ok(result)
    }

    async fn cleanup(&self) -> PluginResult<()> {
        Ok(())
    }

    fn validate(&self, _config: &PluginConfig) -> bool {
        true
    }
}

pub fn plugin(name: &str, audit_type: AuditType, phase: Phase) -> ScriptedPlugin {
    ScriptedPlugin::new(name, audit_type, phase)
}

pub fn home_page() -> PageConfig {
    PageConfig::new("/", "Home", vec![Device::Mobile, Device::Desktop])
}

pub fn pages(count: usize) -> Vec<PageConfig> {
    (0..count)
        .map(|i| PageConfig::new(format!("/page-{}", i), format!("Page {}", i), vec![Device::Desktop]))
        .collect()
}

/// Options with the shortest timeouts the scheduler accepts
pub fn fast_options() -> SchedulingOptions {
    SchedulingOptions::default().with_timeouts(1000, 1500)
}

pub fn shared<T>(plugin: T) -> (Arc<T>, Arc<dyn AuditPlugin>)
where
    T: AuditPlugin + 'static,
{
    let typed = Arc::new(plugin);
    let erased: Arc<dyn AuditPlugin> = typed.clone();
    (typed, erased)
}

/// Register and enable `plugins` in order
pub fn registry_with(plugins: Vec<Arc<dyn AuditPlugin>>) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    for plugin in plugins {
        let name = plugin.plugin_info().name;
        registry.register(plugin).unwrap();
        registry.configure(&name, PluginConfig::default()).unwrap();
    }
    registry
}
