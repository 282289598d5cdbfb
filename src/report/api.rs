//! Public API for report aggregation

pub use crate::report::aggregator::{
    aggregate, deduplicate_issues, identify_cross_cutting_issues, prioritize_issues,
    priority_score, AuditReport, CrossCuttingIssue, PrioritizedIssue,
};
pub use crate::report::summary::{summarize, AuditSummary};
