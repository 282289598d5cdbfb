//! Execution Planning
//!
//! Expands contexts x enabled plugins into tasks and groups them into
//! batches. Batches are ordered so that
//!
//! - every phase-N task runs before any phase-(N+1) task,
//! - a plugin runs in a later batch than the plugins it depends on and the
//!   plugins producing keys it consumes (same-phase edges only; earlier
//!   phases are already complete),
//! - two plugins producing the same key never share a batch; the later one
//!   in resolved order writes last,
//! - no batch exceeds the task, page and per-page plugin limits.
//!
//! A producer and its consumer for the same context therefore never share
//! a batch, and each key has at most one writer per batch.

use crate::audit::context::{ContextKey, ContextSet};
use crate::audit::types::Phase;
use crate::plugin::dependency::DependencyGraph;
use crate::plugin::error::PluginError;
use crate::plugin::registry::PluginRegistry;
use crate::plugin::types::PluginInfo;
use crate::scheduler::error::SchedulerResult;
use crate::scheduler::options::{SchedulingOptions, TASK_MEMORY_MB};
use crate::scheduler::plan::{ExecutionBatch, ExecutionPlan, ResourceRequirements, Task};
use log::debug;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Build an execution plan for `plugin_names` over every context in `contexts`
///
/// Disabled plugins are skipped; unknown names fail. An empty selection or
/// an empty context set yields an empty plan.
pub fn create_execution_plan<S: AsRef<str>>(
    registry: &PluginRegistry,
    contexts: &ContextSet,
    plugin_names: &[S],
    options: &SchedulingOptions,
) -> SchedulerResult<ExecutionPlan> {
    options.validate()?;

    let enabled = registry.enabled_subset(plugin_names)?;
    registry.validate_compatibility(&enabled)?;
    let order = registry.resolve_execution_order(&enabled)?;

    let mut infos = Vec::with_capacity(order.len());
    for name in &order {
        let info = registry
            .info(name)
            .ok_or_else(|| PluginError::PluginNotFound {
                plugin_name: name.clone(),
            })?;
        infos.push(info);
    }

    let mut batches = Vec::new();
    for phase in Phase::ALL {
        let phase_plugins: Vec<&PluginInfo> = infos
            .iter()
            .copied()
            .filter(|info| info.phase == phase)
            .collect();
        if phase_plugins.is_empty() {
            continue;
        }

        for layer in dependency_layers(&phase_plugins)? {
            let tasks = expand_tasks(registry, contexts, &layer);
            batches.extend(pack_layer(tasks, options));
        }
    }

    let batches: Vec<ExecutionBatch> = batches
        .into_iter()
        .enumerate()
        .map(|(i, tasks)| ExecutionBatch {
            id: format!("batch-{}", i + 1),
            estimated_time_ms: tasks.iter().map(|t| t.estimated_time_ms).max().unwrap_or(0),
            tasks,
        })
        .collect();

    let plan = ExecutionPlan {
        id: plan_fingerprint(&batches),
        total_steps: contexts.len() * enabled.len(),
        resource_requirements: resource_requirements(&batches),
        estimated_time_ms: batches.iter().map(|b| b.estimated_time_ms).sum(),
        batches,
    };

    debug!(
        "Planned {} ({} steps in {} batches, ~{}ms)",
        plan.id,
        plan.total_steps,
        plan.batches.len(),
        plan.estimated_time_ms
    );
    Ok(plan)
}

/// Split one phase's plugins into layers by longest-path level
///
/// Edges come from declared dependencies, from producer -> consumer shared
/// data keys, and between producers of the same key in resolved order.
/// Plugins keep their resolved order within a layer.
fn dependency_layers<'a>(plugins: &[&'a PluginInfo]) -> SchedulerResult<Vec<Vec<&'a PluginInfo>>> {
    let mut graph = DependencyGraph::new();
    for info in plugins {
        graph.add_node(&info.name);
    }
    for (i, info) in plugins.iter().enumerate() {
        for dep in &info.dependencies {
            graph.add_edge(dep, &info.name);
        }
        for producer in plugins {
            if producer.name != info.name
                && producer.produces.iter().any(|key| info.consumes.contains(key))
            {
                graph.add_edge(&producer.name, &info.name);
            }
        }
        for earlier in &plugins[..i] {
            if earlier.produces.iter().any(|key| info.produces.contains(key)) {
                graph.add_edge(&earlier.name, &info.name);
            }
        }
    }

    let levels = graph
        .levels()
        .map_err(|cycle| PluginError::DependencyCycle { cycle })?;

    let depth = levels.values().copied().max().map_or(0, |m| m + 1);
    let mut layers: Vec<Vec<&PluginInfo>> = vec![Vec::new(); depth];
    for info in plugins {
        if let Some(&level) = levels.get(&info.name) {
            layers[level].push(*info);
        }
    }
    Ok(layers)
}

fn expand_tasks(
    registry: &PluginRegistry,
    contexts: &ContextSet,
    layer: &[&PluginInfo],
) -> Vec<Task> {
    let mut tasks = Vec::with_capacity(contexts.len() * layer.len());
    for context in contexts.iter() {
        for info in layer {
            let page = context.page_path();
            tasks.push(Task {
                id: Task::task_id(page, context.device, &info.name),
                page: page.to_string(),
                device: context.device,
                plugin: info.name.clone(),
                audit_type: info.audit_type,
                phase: info.phase,
                produces: info.produces.clone(),
                consumes: info.consumes.clone(),
                estimated_time_ms: estimate_task_time(registry, info),
            });
        }
    }
    tasks
}

/// Plugin estimate, else configured timeout, else the audit type default
pub fn estimate_task_time(registry: &PluginRegistry, info: &PluginInfo) -> u64 {
    info.estimated_time_ms
        .or_else(|| registry.config(&info.name).and_then(|c| c.timeout_ms))
        .unwrap_or_else(|| info.audit_type.default_estimated_time_ms())
}

/// Caps applied while packing one layer
#[derive(Debug, Clone, Copy)]
struct PackLimits {
    tasks: usize,
    pages: usize,
    plugins_per_page: usize,
}

impl PackLimits {
    fn from_options(options: &SchedulingOptions) -> Self {
        Self {
            tasks: options.effective_task_limit(),
            pages: options.max_parallel_pages,
            plugins_per_page: options.max_parallel_plugins,
        }
    }

    fn with_plugins_per_page(self, plugins_per_page: usize) -> Self {
        Self {
            plugins_per_page,
            ..self
        }
    }
}

#[derive(Default)]
struct BatchBuilder {
    tasks: Vec<Task>,
    per_context: HashMap<ContextKey, usize>,
}

impl BatchBuilder {
    fn accepts(&self, key: &ContextKey, limits: &PackLimits) -> bool {
        if self.tasks.len() >= limits.tasks {
            return false;
        }
        match self.per_context.get(key) {
            Some(&count) => count < limits.plugins_per_page,
            None => self.per_context.len() < limits.pages,
        }
    }

    fn push(&mut self, key: ContextKey, task: Task) {
        *self.per_context.entry(key).or_insert(0) += 1;
        self.tasks.push(task);
    }
}

/// Pack one layer into batches
///
/// First-fit is not monotonic in the per-page plugin cap, so the layer is
/// packed under every cap from 1 up to the configured one. The cheapest
/// packing by `(estimate, batch count)` that is no worse than the cap-1
/// packing on either measure wins; ties keep the smaller cap.
fn pack_layer(mut tasks: Vec<Task>, options: &SchedulingOptions) -> Vec<Vec<Task>> {
    tasks.sort_by(|a, b| {
        b.estimated_time_ms
            .cmp(&a.estimated_time_ms)
            .then_with(|| a.id.cmp(&b.id))
    });

    let limits = PackLimits::from_options(options);
    let mut per_context: HashMap<ContextKey, usize> = HashMap::new();
    for task in &tasks {
        *per_context.entry(task.context_key()).or_insert(0) += 1;
    }
    let widest = per_context.values().copied().max().unwrap_or(1);
    let ceiling = limits.plugins_per_page.min(widest).min(limits.tasks).max(1);

    let baseline = first_fit(&tasks, &limits.with_plugins_per_page(1));
    let baseline_cost = layer_cost(&baseline);
    let mut best = baseline;
    let mut best_cost = baseline_cost;

    for cap in 2..=ceiling {
        let candidate = first_fit(&tasks, &limits.with_plugins_per_page(cap));
        let cost = layer_cost(&candidate);
        if cost.0 <= baseline_cost.0 && cost.1 <= baseline_cost.1 && cost < best_cost {
            best = candidate;
            best_cost = cost;
        }
    }
    best
}

fn first_fit(tasks: &[Task], limits: &PackLimits) -> Vec<Vec<Task>> {
    let mut builders: Vec<BatchBuilder> = Vec::new();
    for task in tasks {
        let key = task.context_key();
        match builders.iter_mut().find(|b| b.accepts(&key, limits)) {
            Some(builder) => builder.push(key, task.clone()),
            None => {
                let mut builder = BatchBuilder::default();
                builder.push(key, task.clone());
                builders.push(builder);
            }
        }
    }
    builders.into_iter().map(|b| b.tasks).collect()
}

/// `(sum of batch estimates, batch count)`
fn layer_cost(batches: &[Vec<Task>]) -> (u64, usize) {
    let estimate = batches
        .iter()
        .map(|batch| batch.iter().map(|t| t.estimated_time_ms).max().unwrap_or(0))
        .sum();
    (estimate, batches.len())
}

fn resource_requirements(batches: &[ExecutionBatch]) -> ResourceRequirements {
    let mut requirements = ResourceRequirements::default();
    let mut peak_tasks = 0;

    for batch in batches {
        let mut per_context: HashMap<ContextKey, usize> = HashMap::new();
        for task in &batch.tasks {
            *per_context.entry(task.context_key()).or_insert(0) += 1;
        }
        requirements.max_concurrent_pages = requirements.max_concurrent_pages.max(per_context.len());
        requirements.max_concurrent_plugins = requirements
            .max_concurrent_plugins
            .max(per_context.values().copied().max().unwrap_or(0));
        peak_tasks = peak_tasks.max(batch.len());
    }

    requirements.estimated_memory_mb = peak_tasks as u64 * TASK_MEMORY_MB;
    requirements
}

/// Truncated SHA-256 over the task ids in plan order
fn plan_fingerprint(batches: &[ExecutionBatch]) -> String {
    let mut hasher = Sha256::new();
    for batch in batches {
        for task in &batch.tasks {
            hasher.update(task.id.as_bytes());
            hasher.update(b"\n");
        }
        hasher.update(b"--\n");
    }
    let hash_hex = format!("{:x}", hasher.finalize());
    format!("plan-{}", &hash_hex[..16])
}
