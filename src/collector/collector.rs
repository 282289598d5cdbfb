//! Result Collection
//!
//! Merges the per-plugin results of one (page, device) context into a
//! single page result. Collection never fails: problems are reported in the
//! page result's validation report and whatever data is present is kept.

use crate::audit::context::ContextSet;
use crate::audit::types::AuditResult;
use crate::collector::types::{
    CollectedPageResult, ExecutionMeta, PageResultInput, ValidationReport,
};
use crate::scheduler::executor::PlanExecutionResult;
use chrono::Utc;
use log::{debug, warn};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};

/// Merges plugin results into page results
#[derive(Debug, Clone, Default)]
pub struct ResultCollector;

impl ResultCollector {
    pub fn new() -> Self {
        Self
    }

    /// Merge the results of one context
    ///
    /// - a listed plugin without a result is a validation error
    /// - an issue with impact outside 1..=100 is a validation error
    /// - an unsuccessful result is a warning
    /// - a result from an unlisted plugin is a warning and is ignored
    pub fn collect_page_result(&self, input: PageResultInput) -> CollectedPageResult {
        let PageResultInput {
            page,
            device,
            url,
            plugins,
            mut plugin_results,
            mut execution_meta,
        } = input;

        let mut validation = ValidationReport::default();
        let mut collected: BTreeMap<String, AuditResult> = BTreeMap::new();
        let mut all_issues = Vec::new();
        let mut combined_metrics = BTreeMap::new();
        let mut seen = HashSet::new();

        for plugin in &plugins {
            if !seen.insert(plugin.as_str()) {
                validation.warning(format!("Plugin '{}' listed more than once", plugin));
                continue;
            }

            let Some(result) = plugin_results.remove(plugin) else {
                validation.error(format!("Missing result for plugin '{}'", plugin));
                continue;
            };

            if !result.success {
                validation.warning(format!(
                    "Plugin '{}' did not complete: {}",
                    plugin,
                    result.error.as_deref().unwrap_or("no error reported")
                ));
            }
            for issue in result.issues.iter().filter(|i| !i.has_valid_impact()) {
                validation.error(format!(
                    "Issue '{}' from plugin '{}' has impact {} outside 1..=100",
                    issue.id, plugin, issue.impact
                ));
            }

            all_issues.extend(result.issues.iter().cloned());
            combined_metrics.insert(plugin.clone(), metrics_entry(&result));
            collected.insert(plugin.clone(), result);
        }

        let mut unlisted: Vec<&String> = plugin_results.keys().collect();
        unlisted.sort();
        for plugin in unlisted {
            validation.warning(format!("Ignoring result from unlisted plugin '{}'", plugin));
        }

        if execution_meta.total_execution_time_ms == 0 {
            execution_meta.total_execution_time_ms =
                collected.values().map(|r| r.execution_time_ms).sum();
        }
        if execution_meta.collected_at.is_none() {
            execution_meta.collected_at = Some(Utc::now());
        }

        if validation.is_valid {
            debug!(
                "Collected {} plugin results for {} ({} issues)",
                collected.len(),
                page,
                all_issues.len()
            );
        } else {
            warn!(
                "Page result for {} is incomplete: {}",
                page,
                validation.errors.join("; ")
            );
        }

        CollectedPageResult {
            page,
            device,
            url,
            plugin_results: collected,
            all_issues,
            combined_metrics,
            execution_meta,
            validation,
        }
    }

    /// One page result per context, from a finished plan
    pub fn collect_from_plan<S: AsRef<str>>(
        &self,
        contexts: &ContextSet,
        plugins: &[S],
        plan_result: &PlanExecutionResult,
    ) -> Vec<CollectedPageResult> {
        let plugins: Vec<String> = plugins.iter().map(|p| p.as_ref().to_string()).collect();

        contexts
            .iter()
            .map(|context| {
                let plugin_results = plan_result
                    .results_for(&context.key())
                    .map(|results| {
                        results
                            .iter()
                            .map(|(name, result)| (name.clone(), result.clone()))
                            .collect()
                    })
                    .unwrap_or_default();

                self.collect_page_result(PageResultInput {
                    page: context.page_path().to_string(),
                    device: Some(context.device),
                    url: context.url.clone(),
                    plugins: plugins.clone(),
                    plugin_results,
                    execution_meta: ExecutionMeta {
                        plan_id: Some(plan_result.plan_id.clone()),
                        ..ExecutionMeta::default()
                    },
                })
            })
            .collect()
    }
}

/// Namespaced summary of one plugin result
fn metrics_entry(result: &AuditResult) -> Value {
    json!({
        "auditType": result.audit_type,
        "success": result.success,
        "executionTimeMs": result.execution_time_ms,
        "issueCount": result.issues.len(),
        "metrics": result.metrics,
    })
}
