//! Plugin Test Utilities
//!
//! Common mock plugins and test helpers shared by the plugin test modules.

use crate::audit::context::AuditContext;
use crate::audit::types::{AuditResult, AuditType, Phase};
use crate::plugin::config::PluginConfig;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::traits::AuditPlugin;
use crate::plugin::types::PluginInfo;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Configurable mock plugin for registry and ordering tests
#[derive(Debug)]
pub struct MockPlugin {
    pub info: PluginInfo,
    pub should_reject_config: bool,
    pub should_fail_audit: bool,
    pub should_fail_cleanup: bool,
    pub configured: Mutex<Option<PluginConfig>>,
    pub audit_calls: AtomicUsize,
    pub cleaned_up: AtomicBool,
}

impl MockPlugin {
    pub fn new(name: &str) -> Self {
        Self {
            info: PluginInfo::new(name, "1.0.0", AuditType::Performance, Phase::First)
                .with_description("Mock plugin for testing"),
            should_reject_config: false,
            should_fail_audit: false,
            should_fail_cleanup: false,
            configured: Mutex::new(None),
            audit_calls: AtomicUsize::new(0),
            cleaned_up: AtomicBool::new(false),
        }
    }

    pub fn with_audit_type(mut self, audit_type: AuditType) -> Self {
        self.info.audit_type = audit_type;
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.info.phase = phase;
        self
    }

    pub fn with_dependency(mut self, name: &str) -> Self {
        self.info = self.info.with_dependency(name);
        self
    }

    pub fn with_produces(mut self, key: &str) -> Self {
        self.info = self.info.with_produces(key);
        self
    }

    pub fn with_consumes(mut self, key: &str) -> Self {
        self.info = self.info.with_consumes(key);
        self
    }

    pub fn rejecting_config(mut self) -> Self {
        self.should_reject_config = true;
        self
    }

    pub fn failing_audit(mut self) -> Self {
        self.should_fail_audit = true;
        self
    }

    pub fn failing_cleanup(mut self) -> Self {
        self.should_fail_cleanup = true;
        self
    }

    pub fn was_cleaned_up(&self) -> bool {
        self.cleaned_up.load(Ordering::SeqCst)
    }

    pub fn last_config(&self) -> Option<PluginConfig> {
        self.configured.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AuditPlugin for MockPlugin {
    fn plugin_info(&self) -> PluginInfo {
        self.info.clone()
    }

    fn configure(&self, config: &PluginConfig) -> PluginResult<()> {
        *self.configured.lock().unwrap() = Some(config.clone());
        Ok(())
    }

    async fn audit(&self, _context: &AuditContext) -> PluginResult<AuditResult> {
        self.audit_calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail_audit {
            return Err(PluginError::execution(
                &self.info.name,
                "audit",
                "Mock audit failure",
            ));
        }
        Ok(AuditResult::success(&self.info.name, self.info.audit_type))
    }

    async fn cleanup(&self) -> PluginResult<()> {
        if self.should_fail_cleanup {
            return Err(PluginError::execution(
                &self.info.name,
                "cleanup",
                "Mock cleanup failure",
            ));
        }
        self.cleaned_up.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn validate(&self, _config: &PluginConfig) -> bool {
        !self.should_reject_config
    }
}
