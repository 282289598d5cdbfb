//! Batch Execution
//!
//! Runs the tasks of a batch concurrently on a `JoinSet`, gated by a
//! semaphore sized `maxConcurrentTasks`. Every task is bounded by the task
//! timeout (or its plugin's `timeoutMs`, if shorter) and the batch as a
//! whole by the batch deadline. A failing,
//! panicking or timed-out task is recorded and never aborts its batch.
//!
//! Batches of a plan run strictly one after another.

use crate::audit::context::{AuditContext, ContextKey, ContextSet};
use crate::audit::types::AuditResult;
use crate::plugin::error::PluginError;
use crate::plugin::registry::PluginRegistry;
use crate::plugin::traits::AuditPlugin;
use crate::scheduler::error::SchedulerResult;
use crate::scheduler::events::{publish, SchedulerEvent, SchedulerEventType};
use crate::scheduler::options::SchedulingOptions;
use crate::scheduler::plan::{ExecutionBatch, ExecutionPlan, PlanStatus, Task};
use crate::scheduler::planner;
use futures::FutureExt;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Per-task state: `Pending -> Running -> {Succeeded | TimedOut | Failed}`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum_macros::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    TimedOut,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::TimedOut | TaskStatus::Failed
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::TimedOut | TaskStatus::Failed)
    }
}

/// Batch counters; `failed_tasks` includes timed-out tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetadata {
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub timed_out_tasks: usize,
    pub duration_ms: u64,
    /// True when the batch deadline expired before every task finished
    pub batch_timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchExecutionResult {
    pub batch_id: String,
    pub task_results: BTreeMap<String, AuditResult>,
    pub task_status: BTreeMap<String, TaskStatus>,
    /// Keys written to shared data during this batch; first writer in batch order wins
    pub shared_data: BTreeMap<String, Value>,
    pub metadata: BatchMetadata,
}

impl BatchExecutionResult {
    fn new(batch_id: &str) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            task_results: BTreeMap::new(),
            task_status: BTreeMap::new(),
            shared_data: BTreeMap::new(),
            metadata: BatchMetadata::default(),
        }
    }

    fn record(&mut self, outcome: &TaskOutcome) {
        if outcome.status.is_failure() {
            warn!(
                "Task {} {}: {}",
                outcome.task_id,
                outcome.status,
                outcome.result.error.as_deref().unwrap_or("unknown error")
            );
        } else {
            debug!("Task {} {}", outcome.task_id, outcome.status);
        }
        self.task_status
            .insert(outcome.task_id.clone(), outcome.status);
        self.task_results
            .insert(outcome.task_id.clone(), outcome.result.clone());
    }

    fn count(&mut self) {
        let statuses = self.task_status.values();
        let (mut ok, mut failed, mut timed_out) = (0, 0, 0);
        for status in statuses {
            match status {
                TaskStatus::Succeeded => ok += 1,
                TaskStatus::TimedOut => {
                    failed += 1;
                    timed_out += 1;
                }
                _ => failed += 1,
            }
        }
        self.metadata.successful_tasks = ok;
        self.metadata.failed_tasks = failed;
        self.metadata.timed_out_tasks = timed_out;
    }
}

/// Outcome of a whole plan run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanExecutionResult {
    pub plan_id: String,
    pub status: PlanStatus,
    pub batch_results: Vec<BatchExecutionResult>,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub duration_ms: u64,
    #[serde(skip)]
    context_results: BTreeMap<ContextKey, BTreeMap<String, AuditResult>>,
}

impl PlanExecutionResult {
    /// Results of one context keyed by plugin name
    pub fn results_for(&self, key: &ContextKey) -> Option<&BTreeMap<String, AuditResult>> {
        self.context_results.get(key)
    }

    pub fn task_result(&self, task_id: &str) -> Option<&AuditResult> {
        self.batch_results
            .iter()
            .find_map(|b| b.task_results.get(task_id))
    }

    pub fn task_status(&self, task_id: &str) -> Option<TaskStatus> {
        self.batch_results
            .iter()
            .find_map(|b| b.task_status.get(task_id).copied())
    }
}

struct TaskOutcome {
    task_id: String,
    status: TaskStatus,
    result: AuditResult,
    written: Vec<(String, Value)>,
}

impl TaskOutcome {
    fn failed(task: &Task, status: TaskStatus, error: String, elapsed_ms: u64) -> Self {
        Self {
            task_id: task.id.clone(),
            status,
            result: AuditResult::failure(&task.plugin, task.audit_type, error, elapsed_ms),
            written: Vec::new(),
        }
    }
}

/// Plans and runs audit batches against a registry snapshot
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    registry: Arc<PluginRegistry>,
    options: SchedulingOptions,
    events: Option<UnboundedSender<SchedulerEvent>>,
}

impl BatchScheduler {
    /// Create a scheduler; fails if `options` are not schedulable
    pub fn new(registry: Arc<PluginRegistry>, options: SchedulingOptions) -> SchedulerResult<Self> {
        options.validate()?;
        Ok(Self {
            registry,
            options,
            events: None,
        })
    }

    /// Publish progress events to `sender`
    pub fn with_event_sender(mut self, sender: UnboundedSender<SchedulerEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn options(&self) -> &SchedulingOptions {
        &self.options
    }

    pub fn create_execution_plan<S: AsRef<str>>(
        &self,
        contexts: &ContextSet,
        plugin_names: &[S],
    ) -> SchedulerResult<ExecutionPlan> {
        planner::create_execution_plan(&self.registry, contexts, plugin_names, &self.options)
    }

    /// Run one batch to completion or until its deadline
    pub async fn execute_batch(
        &self,
        batch: &ExecutionBatch,
        contexts: &ContextSet,
    ) -> BatchExecutionResult {
        self.run_batch(batch, contexts, None).await
    }

    /// Run every batch of `plan` in order
    pub async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        contexts: &ContextSet,
    ) -> PlanExecutionResult {
        let started = Instant::now();
        let batch_count = plan.batches.len();
        let mut status = PlanStatus::Planned;

        info!(
            "Executing plan {} ({} steps in {} batches)",
            plan.id, plan.total_steps, batch_count
        );
        self.publish(
            SchedulerEventType::PlanStarted {
                total_steps: plan.total_steps,
                batch_count,
            },
            Some(&plan.id),
        );

        let mut batch_results = Vec::with_capacity(batch_count);
        for batch in &plan.batches {
            status = status.advance(batch_count);
            debug!("Plan {} {}", plan.id, status);
            batch_results.push(self.run_batch(batch, contexts, Some(&plan.id)).await);
        }
        status = status.advance(batch_count);

        let mut context_results: BTreeMap<ContextKey, BTreeMap<String, AuditResult>> =
            BTreeMap::new();
        for (batch, batch_result) in plan.batches.iter().zip(&batch_results) {
            for task in &batch.tasks {
                if let Some(result) = batch_result.task_results.get(&task.id) {
                    context_results
                        .entry(task.context_key())
                        .or_default()
                        .insert(task.plugin.clone(), result.clone());
                }
            }
        }

        let successful_tasks = batch_results
            .iter()
            .map(|b| b.metadata.successful_tasks)
            .sum();
        let failed_tasks = batch_results.iter().map(|b| b.metadata.failed_tasks).sum();

        info!(
            "Plan {} {}: {} succeeded, {} failed",
            plan.id, status, successful_tasks, failed_tasks
        );
        self.publish(
            SchedulerEventType::PlanCompleted {
                successful_tasks,
                failed_tasks,
            },
            Some(&plan.id),
        );

        PlanExecutionResult {
            plan_id: plan.id.clone(),
            status,
            batch_results,
            successful_tasks,
            failed_tasks,
            duration_ms: elapsed_ms(started),
            context_results,
        }
    }

    /// Task timeout, tightened by the plugin's own `timeoutMs` when shorter
    fn task_timeout_for(&self, plugin: &str) -> Duration {
        let limit = self.options.timeouts.task_timeout();
        self.registry
            .config(plugin)
            .and_then(|config| config.timeout_ms)
            .map_or(limit, |ms| Duration::from_millis(ms).min(limit))
    }

    fn publish(&self, event_type: SchedulerEventType, plan_id: Option<&str>) {
        publish(self.events.as_ref(), event_type, plan_id);
    }

    async fn run_batch(
        &self,
        batch: &ExecutionBatch,
        contexts: &ContextSet,
        plan_id: Option<&str>,
    ) -> BatchExecutionResult {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.options.timeouts.batch_timeout();
        let semaphore = Arc::new(Semaphore::new(
            self.options.resource_limits.max_concurrent_tasks,
        ));
        let share = self.options.enable_data_sharing;

        let mut result = BatchExecutionResult::new(&batch.id);
        let mut join_set = JoinSet::new();

        debug!("Starting {} with {} tasks", batch.id, batch.len());
        self.publish(
            SchedulerEventType::BatchStarted {
                batch_id: batch.id.clone(),
                task_count: batch.len(),
            },
            plan_id,
        );

        for task in &batch.tasks {
            result
                .task_status
                .insert(task.id.clone(), TaskStatus::Pending);

            let Some(context) = contexts.get(&task.context_key()) else {
                let outcome = TaskOutcome::failed(
                    task,
                    TaskStatus::Failed,
                    format!("No audit context for {}", task.context_key()),
                    0,
                );
                self.finish_task(&mut result, &batch.id, outcome, plan_id);
                continue;
            };
            let Some(plugin) = self.registry.get(&task.plugin) else {
                let outcome = TaskOutcome::failed(
                    task,
                    TaskStatus::Failed,
                    PluginError::PluginNotFound {
                        plugin_name: task.plugin.clone(),
                    }
                    .to_string(),
                    0,
                );
                self.finish_task(&mut result, &batch.id, outcome, plan_id);
                continue;
            };

            let context = if share {
                context.clone()
            } else {
                context.isolated()
            };
            join_set.spawn(run_task(
                task.clone(),
                plugin,
                context,
                share,
                Arc::clone(&semaphore),
                self.task_timeout_for(&task.plugin),
            ));
            result
                .task_status
                .insert(task.id.clone(), TaskStatus::Running);
        }

        let mut written: HashMap<String, Vec<(String, Value)>> = HashMap::new();
        loop {
            match tokio::time::timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok(mut outcome))) => {
                    written.insert(outcome.task_id.clone(), std::mem::take(&mut outcome.written));
                    self.finish_task(&mut result, &batch.id, outcome, plan_id);
                }
                Ok(Some(Err(e))) => warn!("Task in {} ended abnormally: {}", batch.id, e),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "{} exceeded its {}ms deadline; aborting {} outstanding tasks",
                        batch.id,
                        self.options.timeouts.batch_timeout_ms,
                        join_set.len()
                    );
                    result.metadata.batch_timed_out = true;
                    join_set.abort_all();
                    break;
                }
            }
        }

        let elapsed = elapsed_ms(started);
        for task in &batch.tasks {
            let finished = result
                .task_status
                .get(&task.id)
                .is_some_and(TaskStatus::is_terminal);
            if finished {
                continue;
            }
            let outcome = if result.metadata.batch_timed_out {
                TaskOutcome::failed(
                    task,
                    TaskStatus::TimedOut,
                    format!(
                        "Batch {} timed out after {}ms",
                        batch.id, self.options.timeouts.batch_timeout_ms
                    ),
                    elapsed,
                )
            } else {
                TaskOutcome::failed(
                    task,
                    TaskStatus::Failed,
                    "Task ended without reporting a result".to_string(),
                    elapsed,
                )
            };
            self.finish_task(&mut result, &batch.id, outcome, plan_id);
        }

        for task in &batch.tasks {
            if let Some(entries) = written.remove(&task.id) {
                for (key, value) in entries {
                    result.shared_data.entry(key).or_insert(value);
                }
            }
        }

        result.count();
        result.metadata.duration_ms = elapsed_ms(started);
        debug!(
            "Finished {}: {} succeeded, {} failed ({} timed out) in {}ms",
            batch.id,
            result.metadata.successful_tasks,
            result.metadata.failed_tasks,
            result.metadata.timed_out_tasks,
            result.metadata.duration_ms
        );
        self.publish(
            SchedulerEventType::BatchFinished {
                batch_id: batch.id.clone(),
                successful_tasks: result.metadata.successful_tasks,
                failed_tasks: result.metadata.failed_tasks,
            },
            plan_id,
        );
        result
    }

    fn finish_task(
        &self,
        result: &mut BatchExecutionResult,
        batch_id: &str,
        outcome: TaskOutcome,
        plan_id: Option<&str>,
    ) {
        result.record(&outcome);
        self.publish(
            SchedulerEventType::TaskFinished {
                batch_id: batch_id.to_string(),
                task_id: outcome.task_id,
                status: outcome.status,
            },
            plan_id,
        );
    }
}

async fn run_task(
    task: Task,
    plugin: Arc<dyn AuditPlugin>,
    context: AuditContext,
    share: bool,
    semaphore: Arc<Semaphore>,
    task_timeout: Duration,
) -> TaskOutcome {
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            return TaskOutcome::failed(
                &task,
                TaskStatus::Failed,
                format!("Failed to acquire worker slot: {}", e),
                0,
            )
        }
    };

    let started = Instant::now();
    let audit = AssertUnwindSafe(plugin.audit(&context)).catch_unwind();
    let outcome = tokio::time::timeout(task_timeout, audit).await;
    let elapsed = elapsed_ms(started);

    let mut result = match outcome {
        Err(_) => {
            let error = PluginError::Timeout {
                plugin_name: task.plugin.clone(),
                timeout_ms: task_timeout.as_millis() as u64,
            };
            return TaskOutcome::failed(&task, TaskStatus::TimedOut, error.to_string(), elapsed);
        }
        Ok(Err(panic)) => {
            let error = PluginError::execution(&task.plugin, "audit", panic_message(panic.as_ref()));
            return TaskOutcome::failed(&task, TaskStatus::Failed, error.to_string(), elapsed);
        }
        Ok(Ok(Err(e))) => {
            return TaskOutcome::failed(&task, TaskStatus::Failed, e.to_string(), elapsed);
        }
        Ok(Ok(Ok(result))) => result,
    };

    if result.execution_time_ms == 0 {
        result.execution_time_ms = elapsed;
    }
    if !result.success {
        if result.error.is_none() {
            result.error = Some("Plugin reported an unsuccessful audit".to_string());
        }
        return TaskOutcome {
            task_id: task.id,
            status: TaskStatus::Failed,
            result,
            written: Vec::new(),
        };
    }

    let written = if share {
        match write_shared_data(&task, &context, &result) {
            Ok(written) => written,
            Err(error) => {
                return TaskOutcome::failed(&task, TaskStatus::Failed, error, elapsed);
            }
        }
    } else {
        Vec::new()
    };

    TaskOutcome {
        task_id: task.id,
        status: TaskStatus::Succeeded,
        result,
        written,
    }
}

/// Write every produced key: the metric of that name, else the whole result
fn write_shared_data(
    task: &Task,
    context: &AuditContext,
    result: &AuditResult,
) -> Result<Vec<(String, Value)>, String> {
    let mut written = Vec::with_capacity(task.produces.len());
    for key in &task.produces {
        let value = match result.metrics.get(key) {
            Some(value) => value.clone(),
            None => serde_json::to_value(result)
                .map_err(|e| format!("Failed to serialise result for '{}': {}", key, e))?,
        };
        context
            .shared_data
            .insert(key.clone(), value.clone())
            .map_err(|e| e.to_string())?;
        written.push((key.clone(), value));
    }
    Ok(written)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("plugin panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("plugin panicked: {}", message)
    } else {
        "plugin panicked".to_string()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
