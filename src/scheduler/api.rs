//! Public API for planning and executing audit batches

pub use crate::scheduler::error::{SchedulerError, SchedulerResult};
pub use crate::scheduler::events::{SchedulerEvent, SchedulerEventType};
pub use crate::scheduler::executor::{
    BatchExecutionResult, BatchMetadata, BatchScheduler, PlanExecutionResult, TaskStatus,
};
pub use crate::scheduler::options::{ResourceLimits, SchedulingOptions, Timeouts, TASK_MEMORY_MB};
pub use crate::scheduler::plan::{
    ExecutionBatch, ExecutionPlan, PlanStatus, ResourceRequirements, Task,
};
pub use crate::scheduler::planner::{create_execution_plan, estimate_task_time};
