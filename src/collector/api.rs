//! Public API for result collection

pub use crate::collector::collector::ResultCollector;
pub use crate::collector::types::{
    CollectedPageResult, ExecutionMeta, PageResultInput, ValidationReport,
};
