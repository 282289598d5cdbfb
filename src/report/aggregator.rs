//! Report Aggregation
//!
//! Ranks issues by priority, detects issues reported under several audit
//! types and merges duplicates. Every function here is deterministic and
//! independent of input order.

use crate::audit::types::{AuditType, Issue};
use crate::collector::types::CollectedPageResult;
use crate::report::summary::{summarize, AuditSummary};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// An issue with its priority score
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizedIssue {
    pub issue: Issue,
    pub priority_score: u32,
}

/// An issue id reported under two or more audit types
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossCuttingIssue {
    pub id: String,
    pub types: BTreeSet<AuditType>,
}

/// Full aggregation output for a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,
    pub summary: AuditSummary,
    pub prioritized_issues: Vec<PrioritizedIssue>,
    pub cross_cutting_issues: Vec<CrossCuttingIssue>,
    pub pages: Vec<CollectedPageResult>,
}

/// Severity weight x 1000 + impact
pub fn priority_score(issue: &Issue) -> u32 {
    issue.severity.weight() * 1000 + u32::from(issue.impact)
}

/// Highest score first; ties by id, then audit type, then the remaining fields
fn compare_priority(a: &PrioritizedIssue, b: &PrioritizedIssue) -> Ordering {
    b.priority_score
        .cmp(&a.priority_score)
        .then_with(|| a.issue.id.cmp(&b.issue.id))
        .then_with(|| a.issue.audit_type.cmp(&b.issue.audit_type))
        .then_with(|| a.issue.title.cmp(&b.issue.title))
        .then_with(|| a.issue.description.cmp(&b.issue.description))
        .then_with(|| a.issue.affected_pages.cmp(&b.issue.affected_pages))
        .then_with(|| a.issue.fix_guidance.cmp(&b.issue.fix_guidance))
}

/// Score and order issues, most important first
pub fn prioritize_issues(issues: &[Issue]) -> Vec<PrioritizedIssue> {
    let mut prioritized: Vec<PrioritizedIssue> = issues
        .iter()
        .map(|issue| PrioritizedIssue {
            priority_score: priority_score(issue),
            issue: issue.clone(),
        })
        .collect();
    prioritized.sort_by(compare_priority);
    prioritized
}

/// Ids reported under at least two distinct audit types, sorted by id
pub fn identify_cross_cutting_issues(issues: &[Issue]) -> Vec<CrossCuttingIssue> {
    let mut by_id: BTreeMap<&str, BTreeSet<AuditType>> = BTreeMap::new();
    for issue in issues {
        by_id
            .entry(issue.id.as_str())
            .or_default()
            .insert(issue.audit_type);
    }

    by_id
        .into_iter()
        .filter(|(_, types)| types.len() >= 2)
        .map(|(id, types)| CrossCuttingIssue {
            id: id.to_string(),
            types,
        })
        .collect()
}

/// Merge issues sharing `(id, audit_type)`
///
/// The merged issue keeps the first occurrence's text, the union of
/// affected pages in first-seen order, the most severe severity and the
/// highest impact. Output follows first-seen order.
pub fn deduplicate_issues(issues: &[Issue]) -> Vec<Issue> {
    let mut merged: Vec<Issue> = Vec::new();
    let mut index: HashMap<(String, AuditType), usize> = HashMap::new();

    for issue in issues {
        let key = (issue.id.clone(), issue.audit_type);
        match index.get(&key) {
            Some(&i) => {
                let existing = &mut merged[i];
                existing.severity = existing.severity.max(issue.severity);
                existing.impact = existing.impact.max(issue.impact);
                for page in &issue.affected_pages {
                    if !existing.affected_pages.contains(page) {
                        existing.affected_pages.push(page.clone());
                    }
                }
            }
            None => {
                index.insert(key, merged.len());
                let mut first = issue.clone();
                let mut pages = Vec::with_capacity(first.affected_pages.len());
                for page in first.affected_pages.drain(..) {
                    if !pages.contains(&page) {
                        pages.push(page);
                    }
                }
                first.affected_pages = pages;
                merged.push(first);
            }
        }
    }

    merged
}

/// Build the report for a set of page results
///
/// Issues without affected pages are attributed to the page that reported
/// them before duplicates are merged across pages.
pub fn aggregate(pages: Vec<CollectedPageResult>) -> AuditReport {
    let mut issues = Vec::new();
    for page in &pages {
        for issue in &page.all_issues {
            let mut issue = issue.clone();
            if issue.affected_pages.is_empty() {
                issue.affected_pages.push(page.page.clone());
            }
            issues.push(issue);
        }
    }

    let unique = deduplicate_issues(&issues);
    let prioritized_issues = prioritize_issues(&unique);
    let cross_cutting_issues = identify_cross_cutting_issues(&unique);
    let summary = summarize(&pages, &unique);

    debug!(
        "Aggregated {} issues into {} unique ({} cross-cutting)",
        issues.len(),
        unique.len(),
        cross_cutting_issues.len()
    );

    AuditReport {
        generated_at: Utc::now(),
        summary,
        prioritized_issues,
        cross_cutting_issues,
        pages,
    }
}
