//! Plan construction through the public scheduler API

use crate::common::{home_page, pages, plugin, registry_with, shared};
use pageaudit::audit::api::{AuditType, ContextSet, Device, PageConfig, Phase};
use pageaudit::plugin::api::{PluginConfig, PluginError, PluginRegistry};
use pageaudit::scheduler::api::{
    create_execution_plan, BatchScheduler, SchedulerError, SchedulingOptions,
};
use std::collections::HashSet;
use std::sync::Arc;

const BASE_URL: &str = "https://example.com";

fn single_context() -> ContextSet {
    ContextSet::from_pages(
        BASE_URL,
        &[PageConfig::new("/", "Home", vec![Device::Desktop])],
    )
    .unwrap()
}

#[test]
fn test_phase_chain_runs_one_batch_per_phase() {
    let (_, a) = shared(plugin("a", AuditType::Performance, Phase::First));
    let (_, b) = shared(plugin("b", AuditType::Accessibility, Phase::Second).with_dependency("a"));
    let (_, c) = shared(plugin("c", AuditType::Ux, Phase::Third).with_dependency("b"));
    let registry = registry_with(vec![a, b, c]);

    let plan = create_execution_plan(
        &registry,
        &single_context(),
        &["c", "a", "b"],
        &SchedulingOptions::default(),
    )
    .unwrap();

    assert_eq!(plan.total_steps, 3);
    assert_eq!(plan.batches.len(), 3);
    let order: Vec<&str> = plan
        .batches
        .iter()
        .map(|batch| batch.tasks[0].plugin.as_str())
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);
    assert!(plan.id.starts_with("plan-"));
}

#[test]
fn test_parallel_plan_never_slower_than_sequential() {
    let plugins = vec![
        shared(plugin("lighthouse", AuditType::Performance, Phase::First).with_estimate_ms(9000)).1,
        shared(plugin("axe", AuditType::Accessibility, Phase::First).with_estimate_ms(4000)).1,
        shared(plugin("headers", AuditType::Security, Phase::First).with_estimate_ms(2000)).1,
    ];
    let registry = registry_with(plugins);
    let contexts = ContextSet::from_pages(BASE_URL, &pages(4)).unwrap();
    let names = registry.names();

    let parallel =
        create_execution_plan(&registry, &contexts, &names, &SchedulingOptions::default()).unwrap();
    let sequential =
        create_execution_plan(&registry, &contexts, &names, &SchedulingOptions::sequential())
            .unwrap();

    assert_eq!(parallel.total_steps, 12);
    assert_eq!(parallel.total_steps, sequential.total_steps);
    assert_eq!(parallel.task_count(), sequential.task_count());
    assert!(parallel.estimated_time_ms <= sequential.estimated_time_ms);
    assert!(parallel.batches.len() <= sequential.batches.len());
    assert_eq!(sequential.batches.len(), 12);
    assert_eq!(sequential.estimated_time_ms, 4 * (9000 + 4000 + 2000));
}

fn estimated_registry(estimates: &[u64]) -> PluginRegistry {
    let plugins = estimates
        .iter()
        .enumerate()
        .map(|(i, &estimate)| {
            shared(
                plugin(&format!("p{}", i + 1), AuditType::Performance, Phase::First)
                    .with_estimate_ms(estimate),
            )
            .1
        })
        .collect();
    registry_with(plugins)
}

fn limits(pages: usize, plugins: usize, tasks: usize) -> SchedulingOptions {
    let mut options = SchedulingOptions::default();
    options.max_parallel_pages = pages;
    options.max_parallel_plugins = plugins;
    options.resource_limits.max_concurrent_tasks = tasks;
    options
}

#[test]
fn test_raising_plugin_cap_does_not_add_batches() {
    let registry = estimated_registry(&[17, 9, 5, 5, 5]);
    let contexts = ContextSet::from_pages(BASE_URL, &pages(3)).unwrap();
    let names = registry.names();

    let one = create_execution_plan(&registry, &contexts, &names, &limits(3, 1, 3)).unwrap();
    assert_eq!(one.estimated_time_ms, 41);
    assert_eq!(one.batches.len(), 5);

    for cap in 2..=4 {
        let wider = create_execution_plan(&registry, &contexts, &names, &limits(3, cap, 3)).unwrap();
        assert_eq!(wider.task_count(), 15);
        assert!(
            wider.estimated_time_ms <= 41,
            "cap {} estimated {}ms",
            cap,
            wider.estimated_time_ms
        );
        assert!(wider.batches.len() <= 5, "cap {} used {} batches", cap, wider.batches.len());
    }
}

#[test]
fn test_plugin_cap_sweep_is_monotonic() {
    let estimate_sets: [&[u64]; 5] = [
        &[17, 9, 5, 5, 5],
        &[9000, 4000, 2000],
        &[10, 7, 7, 3, 3, 1],
        &[5, 5, 5, 5],
        &[12, 11, 2, 2],
    ];

    for estimates in estimate_sets {
        let registry = estimated_registry(estimates);
        let names = registry.names();
        for page_count in 1..=3 {
            let contexts = ContextSet::from_pages(BASE_URL, &pages(page_count)).unwrap();
            for max_pages in 1..=3 {
                for max_tasks in 1..=4 {
                    let plan_for = |cap: usize| {
                        create_execution_plan(
                            &registry,
                            &contexts,
                            &names,
                            &limits(max_pages, cap, max_tasks),
                        )
                        .unwrap()
                    };
                    let baseline = plan_for(1);
                    let mut previous = baseline.estimated_time_ms;
                    for cap in 2..=4 {
                        let plan = plan_for(cap);
                        let case = format!(
                            "{:?} pages={} maxPages={} maxTasks={} cap={}",
                            estimates, page_count, max_pages, max_tasks, cap
                        );
                        assert!(plan.estimated_time_ms <= baseline.estimated_time_ms, "{}", case);
                        assert!(plan.batches.len() <= baseline.batches.len(), "{}", case);
                        assert!(plan.estimated_time_ms <= previous, "{}", case);
                        previous = plan.estimated_time_ms;
                    }
                }
            }
        }
    }
}

#[test]
fn test_batches_respect_page_and_task_limits() {
    let (_, lighthouse) = shared(plugin("lighthouse", AuditType::Performance, Phase::First));
    let (_, axe) = shared(plugin("axe", AuditType::Accessibility, Phase::First));
    let registry = registry_with(vec![lighthouse, axe]);
    let contexts = ContextSet::from_pages(BASE_URL, &pages(5)).unwrap();

    let mut options = SchedulingOptions::default();
    options.max_parallel_pages = 2;
    options.max_parallel_plugins = 1;
    options.resource_limits.max_concurrent_tasks = 3;

    let plan = create_execution_plan(&registry, &contexts, &["lighthouse", "axe"], &options).unwrap();

    assert_eq!(plan.total_steps, 10);
    for batch in &plan.batches {
        assert!(batch.len() <= 3);
        let pages: HashSet<&str> = batch.tasks.iter().map(|t| t.page.as_str()).collect();
        assert!(pages.len() <= 2, "{} spans {} pages", batch.id, pages.len());
        assert_eq!(pages.len(), batch.len(), "one task per page per batch");
    }
    assert!(plan.resource_requirements.max_concurrent_pages <= 2);
    assert_eq!(plan.resource_requirements.max_concurrent_plugins, 1);
}

#[test]
fn test_memory_budget_caps_batch_size() {
    let plugins = (0..4)
        .map(|i| shared(plugin(&format!("p{}", i), AuditType::CodeQuality, Phase::First)).1)
        .collect();
    let registry = registry_with(plugins);

    let mut options = SchedulingOptions::default();
    options.resource_limits.max_memory_mb = 256;

    let plan =
        create_execution_plan(&registry, &single_context(), &registry.names(), &options).unwrap();
    assert_eq!(plan.batches.len(), 2);
    assert!(plan.batches.iter().all(|b| b.len() == 2));
    assert_eq!(plan.resource_requirements.estimated_memory_mb, 256);
}

#[test]
fn test_batch_estimate_is_longest_task() {
    let (_, slow) = shared(plugin("slow", AuditType::Performance, Phase::First).with_estimate_ms(7000));
    let (_, quick) = shared(plugin("quick", AuditType::Security, Phase::First).with_estimate_ms(1500));
    let registry = registry_with(vec![slow, quick]);

    let plan = create_execution_plan(
        &registry,
        &single_context(),
        &["slow", "quick"],
        &SchedulingOptions::default(),
    )
    .unwrap();

    assert_eq!(plan.batches.len(), 1);
    assert_eq!(plan.batches[0].estimated_time_ms, 7000);
    assert_eq!(plan.estimated_time_ms, 7000);
    assert_eq!(plan.batches[0].tasks[0].plugin, "slow");
}

#[test]
fn test_task_estimate_falls_back_to_timeout_then_type_default() {
    let (_, configured) = shared(plugin("configured", AuditType::Ux, Phase::First));
    let (_, defaulted) = shared(plugin("defaulted", AuditType::Accessibility, Phase::First));
    let mut registry = registry_with(vec![configured, defaulted]);
    registry
        .configure("configured", PluginConfig::default().with_timeout_ms(12_000))
        .unwrap();

    let plan = create_execution_plan(
        &registry,
        &single_context(),
        &registry.names(),
        &SchedulingOptions::default(),
    )
    .unwrap();

    let estimate = |name: &str| {
        plan.tasks()
            .find(|t| t.plugin == name)
            .map(|t| t.estimated_time_ms)
            .unwrap()
    };
    assert_eq!(estimate("configured"), 12_000);
    assert_eq!(estimate("defaulted"), 8000);
}

#[test]
fn test_consumer_runs_after_producer_in_same_phase() {
    let (_, producer) = shared(
        plugin("lighthouse", AuditType::Performance, Phase::First)
            .producing("lcp", serde_json::json!(2400)),
    );
    let (_, consumer) = shared(plugin("budget", AuditType::Performance, Phase::First).consuming("lcp"));
    let registry = registry_with(vec![consumer, producer]);

    let plan = create_execution_plan(
        &registry,
        &single_context(),
        &["budget", "lighthouse"],
        &SchedulingOptions::default(),
    )
    .unwrap();

    let batch_of = |name: &str| {
        let task = plan.tasks().find(|t| t.plugin == name).unwrap();
        plan.batch_index_of(&task.id).unwrap()
    };
    assert!(batch_of("lighthouse") < batch_of("budget"));
}

#[test]
fn test_key_cycle_within_phase_is_rejected() {
    let (_, a) = shared(
        plugin("a", AuditType::Performance, Phase::First)
            .producing("x", serde_json::json!(1))
            .consuming("y"),
    );
    let (_, b) = shared(
        plugin("b", AuditType::Performance, Phase::First)
            .producing("y", serde_json::json!(2))
            .consuming("x"),
    );
    let registry = registry_with(vec![a, b]);

    let err = create_execution_plan(
        &registry,
        &single_context(),
        &["a", "b"],
        &SchedulingOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Plugin(PluginError::DependencyCycle { .. })
    ));
}

#[test]
fn test_phase_violation_is_rejected() {
    let (_, late) = shared(plugin("late", AuditType::Ux, Phase::Second));
    let (_, early) = shared(plugin("early", AuditType::Performance, Phase::First).with_dependency("late"));
    let registry = registry_with(vec![late, early]);

    let err = create_execution_plan(
        &registry,
        &single_context(),
        &["late", "early"],
        &SchedulingOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Plugin(PluginError::PhaseOrderViolation { .. })
    ));
}

#[test]
fn test_consumer_of_later_phase_key_is_rejected() {
    let (_, summary) = shared(
        plugin("summary", AuditType::Ux, Phase::Third).producing("scoreCard", serde_json::json!(90)),
    );
    let (_, budget) = shared(plugin("budget", AuditType::Performance, Phase::First).consuming("scoreCard"));
    let registry = registry_with(vec![summary, budget]);

    let err = create_execution_plan(
        &registry,
        &single_context(),
        &["summary", "budget"],
        &SchedulingOptions::default(),
    )
    .unwrap_err();
    match err {
        SchedulerError::Plugin(PluginError::SharedKeyPhaseViolation {
            plugin_name,
            key,
            producer,
            ..
        }) => {
            assert_eq!(plugin_name, "budget");
            assert_eq!(key, "scoreCard");
            assert_eq!(producer, "summary");
        }
        other => panic!("expected a shared key phase violation, got {:?}", other),
    }
}

#[test]
fn test_disabled_plugins_are_left_out() {
    let (_, a) = shared(plugin("a", AuditType::Performance, Phase::First));
    let (_, b) = shared(plugin("b", AuditType::Security, Phase::First));
    let mut registry = registry_with(vec![a, b]);
    registry.configure("b", PluginConfig::disabled()).unwrap();

    let contexts = ContextSet::from_pages(BASE_URL, &[home_page()]).unwrap();
    let plan =
        create_execution_plan(&registry, &contexts, &["a", "b"], &SchedulingOptions::default())
            .unwrap();

    assert_eq!(plan.total_steps, 2);
    assert!(plan.tasks().all(|t| t.plugin == "a"));
}

#[test]
fn test_disabled_dependency_breaks_compatibility() {
    let (_, a) = shared(plugin("a", AuditType::Performance, Phase::First));
    let (_, b) = shared(plugin("b", AuditType::Ux, Phase::Second).with_dependency("a"));
    let mut registry = registry_with(vec![a, b]);
    registry.configure("a", PluginConfig::disabled()).unwrap();

    let err = create_execution_plan(
        &registry,
        &single_context(),
        &["a", "b"],
        &SchedulingOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Plugin(PluginError::UnresolvedDependency { .. })
    ));
}

#[test]
fn test_plan_id_is_deterministic() {
    let (_, a) = shared(plugin("a", AuditType::Performance, Phase::First));
    let registry = Arc::new(registry_with(vec![a]));
    let scheduler = BatchScheduler::new(Arc::clone(&registry), SchedulingOptions::default()).unwrap();
    let contexts = ContextSet::from_pages(BASE_URL, &[home_page()]).unwrap();

    let first = scheduler.create_execution_plan(&contexts, &["a"]).unwrap();
    let second = scheduler.create_execution_plan(&contexts, &["a"]).unwrap();
    assert_eq!(first.id, second.id);

    let other = ContextSet::from_pages(BASE_URL, &pages(1)).unwrap();
    let third = scheduler.create_execution_plan(&other, &["a"]).unwrap();
    assert_ne!(first.id, third.id);
}

#[test]
fn test_empty_selection_gives_empty_plan() {
    let registry = registry_with(Vec::new());
    let names: Vec<String> = Vec::new();
    let plan = create_execution_plan(
        &registry,
        &single_context(),
        &names,
        &SchedulingOptions::default(),
    )
    .unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.total_steps, 0);
    assert_eq!(plan.estimated_time_ms, 0);
}
