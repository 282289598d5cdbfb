//! Execution plan types

use crate::audit::context::ContextKey;
use crate::audit::types::{AuditType, Device, Phase};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One (page, device, plugin) unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub page: String,
    pub device: Device,
    pub plugin: String,
    pub audit_type: AuditType,
    pub phase: Phase,
    pub produces: Vec<String>,
    pub consumes: Vec<String>,
    pub estimated_time_ms: u64,
}

impl Task {
    pub fn task_id(page: &str, device: Device, plugin: &str) -> String {
        format!("{}::{}::{}", page, device, plugin)
    }

    pub fn context_key(&self) -> ContextKey {
        ContextKey::new(self.page.clone(), self.device)
    }
}

/// Tasks that may run concurrently as one synchronisation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionBatch {
    pub id: String,
    pub tasks: Vec<Task>,
    /// Longest task estimate in the batch
    pub estimated_time_ms: u64,
}

impl ExecutionBatch {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task_ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.id.as_str()).collect()
    }
}

/// Peak concurrency the plan actually uses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    pub max_concurrent_pages: usize,
    pub max_concurrent_plugins: usize,
    #[serde(rename = "estimatedMemoryMB")]
    pub estimated_memory_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// Fingerprint of the scheduled task ids
    pub id: String,
    /// Number of (page, device, plugin) triples, independent of batching
    pub total_steps: usize,
    pub batches: Vec<ExecutionBatch>,
    pub resource_requirements: ResourceRequirements,
    /// Sum of batch estimates
    pub estimated_time_ms: u64,
}

impl ExecutionPlan {
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.batches.iter().flat_map(|b| b.tasks.iter())
    }

    pub fn task_count(&self) -> usize {
        self.batches.iter().map(ExecutionBatch::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Index of the batch holding `task_id`
    pub fn batch_index_of(&self, task_id: &str) -> Option<usize> {
        self.batches
            .iter()
            .position(|b| b.tasks.iter().any(|t| t.id == task_id))
    }
}

/// Plan lifecycle: `Planned -> Executing(i) -> ... -> Completed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanStatus {
    Planned,
    /// Running the batch at this index
    Executing(usize),
    Completed,
}

impl PlanStatus {
    /// Next state after finishing the current step of a plan with `batch_count` batches
    pub fn advance(self, batch_count: usize) -> Self {
        let next = match self {
            PlanStatus::Planned => 0,
            PlanStatus::Executing(i) => i + 1,
            PlanStatus::Completed => return PlanStatus::Completed,
        };
        if next < batch_count {
            PlanStatus::Executing(next)
        } else {
            PlanStatus::Completed
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Planned => write!(f, "planned"),
            PlanStatus::Executing(i) => write!(f, "executing batch {}", i + 1),
            PlanStatus::Completed => write!(f, "completed"),
        }
    }
}
