//! Scheduling options
//!
//! Limits and timeouts for plan construction and batch execution. Options
//! deserialize from camelCase keys; missing keys take the default values.

use crate::core::validation::{validate_positive_limit, validate_timeout_ms};
use crate::scheduler::error::{SchedulerError, SchedulerResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Memory budget assumed for one running task, in megabytes
pub const TASK_MEMORY_MB: u64 = 128;

/// Upper bounds on concurrently running work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceLimits {
    #[serde(rename = "maxMemoryMB", alias = "maxMemoryMb")]
    pub max_memory_mb: u64,
    pub max_concurrent_tasks: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_mb: 2048,
            max_concurrent_tasks: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeouts {
    pub task_timeout_ms: u64,
    pub batch_timeout_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            task_timeout_ms: 30_000,
            batch_timeout_ms: 120_000,
        }
    }
}

impl Timeouts {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulingOptions {
    /// Distinct (page, device) contexts per batch
    pub max_parallel_pages: usize,
    /// Tasks per context per batch
    pub max_parallel_plugins: usize,
    pub enable_data_sharing: bool,
    pub resource_limits: ResourceLimits,
    pub timeouts: Timeouts,
}

impl Default for SchedulingOptions {
    fn default() -> Self {
        Self {
            max_parallel_pages: 3,
            max_parallel_plugins: 4,
            enable_data_sharing: true,
            resource_limits: ResourceLimits::default(),
            timeouts: Timeouts::default(),
        }
    }
}

impl SchedulingOptions {
    /// One task at a time
    pub fn sequential() -> Self {
        Self {
            max_parallel_pages: 1,
            max_parallel_plugins: 1,
            resource_limits: ResourceLimits {
                max_concurrent_tasks: 1,
                ..ResourceLimits::default()
            },
            ..Self::default()
        }
    }

    pub fn with_data_sharing(mut self, enabled: bool) -> Self {
        self.enable_data_sharing = enabled;
        self
    }

    pub fn with_timeouts(mut self, task_timeout_ms: u64, batch_timeout_ms: u64) -> Self {
        self.timeouts = Timeouts {
            task_timeout_ms,
            batch_timeout_ms,
        };
        self
    }

    /// Check that the options describe a schedulable configuration
    pub fn validate(&self) -> SchedulerResult<()> {
        let check = |result: Result<usize, String>| result.map_err(SchedulerError::invalid_options);

        check(validate_positive_limit(
            "maxParallelPages",
            self.max_parallel_pages,
        ))?;
        check(validate_positive_limit(
            "maxParallelPlugins",
            self.max_parallel_plugins,
        ))?;
        check(validate_positive_limit(
            "maxConcurrentTasks",
            self.resource_limits.max_concurrent_tasks,
        ))?;

        if self.resource_limits.max_memory_mb < TASK_MEMORY_MB {
            return Err(SchedulerError::invalid_options(format!(
                "maxMemoryMB must be at least {} to run a single task (got {})",
                TASK_MEMORY_MB, self.resource_limits.max_memory_mb
            )));
        }

        validate_timeout_ms("taskTimeoutMs", self.timeouts.task_timeout_ms)
            .map_err(SchedulerError::invalid_options)?;
        validate_timeout_ms("batchTimeoutMs", self.timeouts.batch_timeout_ms)
            .map_err(SchedulerError::invalid_options)?;

        if self.timeouts.batch_timeout_ms < self.timeouts.task_timeout_ms {
            return Err(SchedulerError::invalid_options(format!(
                "batchTimeoutMs ({}) must not be shorter than taskTimeoutMs ({})",
                self.timeouts.batch_timeout_ms, self.timeouts.task_timeout_ms
            )));
        }
        Ok(())
    }

    /// Tasks allowed in one batch, after applying the memory budget
    pub fn effective_task_limit(&self) -> usize {
        let by_memory = (self.resource_limits.max_memory_mb / TASK_MEMORY_MB) as usize;
        self.resource_limits.max_concurrent_tasks.min(by_memory).max(1)
    }
}
