// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the resource dependency resolver.
//!
//! Covers plan determinism, topological validity of phases, self-dependency
//! rejection, cycle and missing-dependency reporting, priority ordering and
//! shutdown safety.

use aegis_core::domain::dependency_resolver::ResourceDependencyManager;
use aegis_core::domain::resource::{
    MissingDependency, ResourceDependency, ResourceError, ResourceId,
};
use std::collections::{BTreeSet, HashSet};

fn ids(items: &[&str]) -> Vec<ResourceId> {
    items.iter().map(|id| ResourceId::new(*id)).collect()
}

fn enabled(items: &[&str]) -> HashSet<ResourceId> {
    items.iter().map(|id| ResourceId::new(*id)).collect()
}

fn register(manager: &mut ResourceDependencyManager, id: &str, deps: &[&str], priority: i32) {
    manager
        .register_resource_dependency(
            ResourceDependency::new(id)
                .depends_on(deps.iter().copied())
                .with_priority(priority),
        )
        .unwrap();
}

fn platform() -> ResourceDependencyManager {
    let mut manager = ResourceDependencyManager::new();
    register(&mut manager, "storage", &[], 200);
    register(&mut manager, "ai", &[], 100);
    register(&mut manager, "agents", &["ai", "storage"], 30);
    manager
}

#[test]
fn test_end_to_end_platform_plan() {
    let manager = platform();
    let plan = manager.create_initialization_plan(&enabled(&["storage", "ai", "agents"]));

    assert_eq!(plan.phases, vec![ids(&["storage", "ai"]), ids(&["agents"])]);
    assert!(plan.circular_dependencies.is_empty());
    assert!(plan.missing_dependencies.is_empty());
    assert!(!plan.forced_phase);
    assert!(plan.is_clean());
    assert_eq!(plan.shutdown_order(), ids(&["agents", "ai", "storage"]));
}

#[test]
fn test_plan_is_deterministic() {
    let mut manager = platform();
    register(&mut manager, "cache", &["storage"], 50);
    register(&mut manager, "loop_a", &["loop_b"], 0);
    register(&mut manager, "loop_b", &["loop_a"], 0);
    register(&mut manager, "orphan", &["ghost"], 0);

    let all = enabled(&["storage", "ai", "agents", "cache", "loop_a", "loop_b", "orphan"]);
    let first = manager.create_initialization_plan(&all);
    let second = manager.create_initialization_plan(&all);

    assert_eq!(first, second);
}

#[test]
fn test_phases_respect_required_dependencies() {
    let mut manager = ResourceDependencyManager::new();
    register(&mut manager, "config", &[], 0);
    register(&mut manager, "db", &["config"], 0);
    register(&mut manager, "cache", &["config"], 10);
    register(&mut manager, "api", &["db", "cache"], 0);
    register(&mut manager, "worker", &["db"], 0);
    register(&mut manager, "gateway", &["api", "worker"], 0);

    let all = enabled(&["config", "db", "cache", "api", "worker", "gateway"]);
    let plan = manager.create_initialization_plan(&all);

    for (phase_index, phase) in plan.phases.iter().enumerate() {
        for resource_id in phase {
            let dependency = manager.get_dependency(resource_id).unwrap();
            for dep in &dependency.depends_on {
                let dep_phase = plan.phase_of(dep).unwrap();
                assert!(
                    dep_phase < phase_index,
                    "{} (phase {}) depends on {} (phase {})",
                    resource_id,
                    phase_index,
                    dep,
                    dep_phase
                );
            }
        }
    }
    assert_eq!(plan.phases.len(), 4);
    assert_eq!(plan.phases[1], ids(&["cache", "db"]));
}

#[test]
fn test_self_dependency_rejected_without_mutation() {
    let mut manager = platform();
    let before = manager.registered_resources();

    let result =
        manager.register_resource_dependency(ResourceDependency::new("a").depends_on(["a"]));

    assert_eq!(
        result,
        Err(ResourceError::SelfDependency {
            resource_id: ResourceId::new("a")
        })
    );
    assert_eq!(manager.registered_resources(), before);
    assert!(!manager.is_registered(&ResourceId::new("a")));
    assert!(!manager.known_resources().contains(&ResourceId::new("a")));
}

#[test]
fn test_two_node_cycle_detected() {
    let mut manager = ResourceDependencyManager::new();
    register(&mut manager, "a", &["b"], 0);
    register(&mut manager, "b", &["a"], 0);

    let plan = manager.create_initialization_plan(&enabled(&["a", "b"]));

    let expected: BTreeSet<ResourceId> = ids(&["a", "b"]).into_iter().collect();
    assert_eq!(plan.circular_dependencies, expected);
    // Circular members still get placed so startup can proceed
    assert_eq!(plan.resource_count(), 2);
    assert!(!plan.is_clean());
}

#[test]
fn test_missing_dependency_reported() {
    let mut manager = ResourceDependencyManager::new();
    register(&mut manager, "a", &["z"], 0);

    let plan = manager.create_initialization_plan(&enabled(&["a"]));

    assert_eq!(
        plan.missing_dependencies,
        vec![MissingDependency {
            resource_id: ResourceId::new("a"),
            missing_deps: ids(&["z"]),
        }]
    );
    assert!(plan.forced_phase);
    assert_eq!(plan.phases, vec![ids(&["a"])]);
}

#[test]
fn test_optional_dependency_is_never_missing() {
    let mut manager = platform();
    manager
        .register_resource_dependency(ResourceDependency::new("telemetry").optional(true))
        .unwrap();
    register(&mut manager, "dashboard", &["telemetry", "storage"], 0);

    let plan = manager.create_initialization_plan(&enabled(&["storage", "dashboard"]));

    assert!(plan.missing_dependencies.is_empty());
    assert!(!plan.forced_phase);
    assert_eq!(plan.phases, vec![ids(&["storage"]), ids(&["dashboard"])]);
}

#[test]
fn test_priority_ordering_with_stable_ties() {
    let mut manager = ResourceDependencyManager::new();
    register(&mut manager, "low", &[], 1);
    register(&mut manager, "tie_first", &[], 5);
    register(&mut manager, "high", &[], 10);
    register(&mut manager, "tie_second", &[], 5);

    let plan = manager.create_initialization_plan(&enabled(&["low", "tie_first", "high", "tie_second"]));

    assert_eq!(
        plan.phases,
        vec![ids(&["high", "tie_first", "tie_second", "low"])]
    );
}

#[test]
fn test_safe_shutdown() {
    let mut manager = ResourceDependencyManager::new();
    register(&mut manager, "a", &[], 0);
    register(&mut manager, "b", &["a"], 0);

    let a = ResourceId::new("a");
    assert!(!manager.can_safely_shutdown(&a, &enabled(&["a", "b"])));
    assert!(manager.can_safely_shutdown(&a, &enabled(&["a"])));
    assert!(manager.can_safely_shutdown(&ResourceId::new("b"), &enabled(&["a", "b"])));
}

#[test]
fn test_optional_dependent_does_not_block_shutdown() {
    let mut manager = ResourceDependencyManager::new();
    register(&mut manager, "storage", &[], 0);
    manager
        .register_resource_dependency(
            ResourceDependency::new("metrics")
                .depends_on(["storage"])
                .optional(true),
        )
        .unwrap();

    assert!(manager.can_safely_shutdown(
        &ResourceId::new("storage"),
        &enabled(&["storage", "metrics"])
    ));
}

#[test]
fn test_dependent_resources_lookup() {
    let manager = platform();
    assert_eq!(manager.get_dependent_resources(&ResourceId::new("storage")), ids(&["agents"]));
    assert!(manager.get_dependent_resources(&ResourceId::new("agents")).is_empty());
}

#[test]
fn test_disabled_resources_are_excluded() {
    let manager = platform();
    let plan = manager.create_initialization_plan(&enabled(&["storage", "ai"]));

    assert_eq!(plan.phases, vec![ids(&["storage", "ai"])]);
    assert!(plan.missing_dependencies.is_empty());
}

#[test]
fn test_empty_enabled_set_yields_empty_plan() {
    let manager = platform();
    let plan = manager.create_initialization_plan(&HashSet::new());

    assert!(plan.phases.is_empty());
    assert!(plan.is_clean());
}
