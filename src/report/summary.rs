//! Run summary

use crate::audit::types::{AuditType, Issue, Severity};
use crate::collector::types::CollectedPageResult;
use serde::Serialize;
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

/// Headline counts for a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub pages_audited: usize,
    pub invalid_pages: usize,
    pub total_issues: usize,
    /// Every severity is present, zero when unused
    pub issues_by_severity: BTreeMap<Severity, usize>,
    pub issues_by_type: BTreeMap<AuditType, usize>,
    pub successful_plugin_runs: usize,
    pub failed_plugin_runs: usize,
}

impl AuditSummary {
    pub fn has_critical_issues(&self) -> bool {
        self.issues_by_severity
            .get(&Severity::Critical)
            .is_some_and(|&n| n > 0)
    }
}

/// Count pages, plugin runs and `issues`
pub fn summarize(pages: &[CollectedPageResult], issues: &[Issue]) -> AuditSummary {
    let mut issues_by_severity: BTreeMap<Severity, usize> =
        Severity::iter().map(|s| (s, 0)).collect();
    let mut issues_by_type: BTreeMap<AuditType, usize> = BTreeMap::new();
    for issue in issues {
        *issues_by_severity.entry(issue.severity).or_insert(0) += 1;
        *issues_by_type.entry(issue.audit_type).or_insert(0) += 1;
    }

    AuditSummary {
        pages_audited: pages.len(),
        invalid_pages: pages.iter().filter(|p| !p.validation.is_valid).count(),
        total_issues: issues.len(),
        issues_by_severity,
        issues_by_type,
        successful_plugin_runs: pages.iter().map(|p| p.successful_plugins()).sum(),
        failed_plugin_runs: pages.iter().map(|p| p.failed_plugins()).sum(),
    }
}
