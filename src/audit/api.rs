//! Public API for audit data and contexts

pub use crate::audit::context::{
    AuditContext, ContextKey, ContextMetadata, ContextSet, SharedData, SHARED_METRICS_KEY,
};
pub use crate::audit::error::{AuditError, ContextResult};
pub use crate::audit::types::{
    AuditResult, AuditType, Device, Issue, PageConfig, Phase, Severity,
};
