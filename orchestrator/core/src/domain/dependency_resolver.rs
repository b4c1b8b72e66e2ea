// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Resource Dependency Resolver
//!
//! Builds a phased, deterministic initialization order from declared resource
//! dependencies and answers shutdown-safety queries at runtime.
//!
//! ## Plan Construction
//!
//! 1. Filter the registered graph to the enabled resources.
//! 2. Depth-first cycle detection (visiting/visited marking).
//! 3. Missing required dependencies (not in the enabled set).
//! 4. Iterative layering: a resource joins the next phase once every
//!    dependency is placed, optional, or part of a detected cycle.
//! 5. Phase members sorted by priority (descending, stable).
//!
//! Cycles, missing dependencies and stuck layering are reported in the
//! returned [`ResourceInitializationPlan`]; only self-dependency at
//! registration time is an error.
//!
//! ## Known Limitation
//!
//! Cycle detection records the two endpoints of each back edge it finds, not
//! the full strongly connected component. In `a -> b -> c -> a` only `c` and
//! `a` are reported; `b` is still layered because its dependency `c` counts
//! as satisfied.

use crate::domain::resource::{
    MissingDependency, ResourceDependency, ResourceError, ResourceId, ResourceInitializationPlan,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Visited,
}

/// Registry of resource dependencies and planner for startup/shutdown order
#[derive(Debug, Default, Clone)]
pub struct ResourceDependencyManager {
    dependencies: HashMap<ResourceId, ResourceDependency>,
    /// First-registration order, used as the priority tie-break
    registration_order: Vec<ResourceId>,
    known_resources: BTreeSet<ResourceId>,
}

impl ResourceDependencyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the dependency record of a resource.
    ///
    /// Fails without touching the graph when the record lists itself as a
    /// dependency.
    pub fn register_resource_dependency(
        &mut self,
        dependency: ResourceDependency,
    ) -> Result<(), ResourceError> {
        if dependency.is_self_referencing() {
            return Err(ResourceError::SelfDependency {
                resource_id: dependency.resource_id,
            });
        }

        let id = dependency.resource_id.clone();
        if !self.dependencies.contains_key(&id) {
            self.registration_order.push(id.clone());
        }

        debug!(
            resource_id = %id,
            depends_on = ?dependency.depends_on,
            priority = dependency.priority,
            optional = dependency.optional,
            "Registered resource dependency"
        );

        self.known_resources.insert(id.clone());
        self.dependencies.insert(id, dependency);
        Ok(())
    }

    /// Register a resource without dependencies unless it already has a
    /// record. The id is always added to the known resources.
    pub fn register_resource(&mut self, resource_id: impl Into<ResourceId>, priority: i32) {
        let id = resource_id.into();
        if !self.dependencies.contains_key(&id) {
            self.registration_order.push(id.clone());
            self.dependencies.insert(
                id.clone(),
                ResourceDependency::new(id.clone()).with_priority(priority),
            );
        }
        self.known_resources.insert(id);
    }

    /// Compute the initialization plan for the enabled resources.
    ///
    /// Pure with respect to the registered graph: identical inputs yield
    /// identical plans.
    pub fn create_initialization_plan(
        &self,
        enabled_resources: &HashSet<ResourceId>,
    ) -> ResourceInitializationPlan {
        let filtered: Vec<&ResourceDependency> = self
            .registration_order
            .iter()
            .filter(|id| enabled_resources.contains(*id))
            .filter_map(|id| self.dependencies.get(id))
            .collect();

        let circular_dependencies = self.detect_cycles(&filtered);
        if !circular_dependencies.is_empty() {
            warn!(
                resources = ?circular_dependencies,
                "Circular resource dependencies detected"
            );
            metrics::counter!("aegis_resource_plan_cycles_total")
                .increment(circular_dependencies.len() as u64);
        }

        let missing_dependencies = self.find_missing(&filtered, enabled_resources);
        for missing in &missing_dependencies {
            warn!(
                resource_id = %missing.resource_id,
                missing = ?missing.missing_deps,
                "Resource has dependencies that are not enabled"
            );
        }

        let (phases, forced_phase) = self.build_phases(&filtered, &circular_dependencies);

        info!(
            resources = filtered.len(),
            phases = phases.len(),
            circular = circular_dependencies.len(),
            missing = missing_dependencies.len(),
            forced_phase,
            "Created resource initialization plan"
        );

        ResourceInitializationPlan {
            phases,
            circular_dependencies,
            missing_dependencies,
            forced_phase,
        }
    }

    /// False iff another running resource requires `resource_id`
    pub fn can_safely_shutdown(
        &self,
        resource_id: &ResourceId,
        currently_running: &HashSet<ResourceId>,
    ) -> bool {
        !currently_running
            .iter()
            .filter(|id| *id != resource_id)
            .filter_map(|id| self.dependencies.get(id))
            .any(|dependent| {
                dependent.depends_on.contains(resource_id)
                    && !self.is_optional_edge(dependent, resource_id)
            })
    }

    /// Every registered resource that lists `resource_id` as a dependency
    pub fn get_dependent_resources(&self, resource_id: &ResourceId) -> Vec<ResourceId> {
        self.registration_order
            .iter()
            .filter_map(|id| self.dependencies.get(id))
            .filter(|dep| dep.depends_on.contains(resource_id))
            .map(|dep| dep.resource_id.clone())
            .collect()
    }

    pub fn get_dependency(&self, resource_id: &ResourceId) -> Option<&ResourceDependency> {
        self.dependencies.get(resource_id)
    }

    pub fn is_registered(&self, resource_id: &ResourceId) -> bool {
        self.dependencies.contains_key(resource_id)
    }

    /// Registered resources in first-registration order
    pub fn registered_resources(&self) -> Vec<ResourceId> {
        self.registration_order.clone()
    }

    pub fn known_resources(&self) -> &BTreeSet<ResourceId> {
        &self.known_resources
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Drop every registration (test isolation)
    pub fn clear(&mut self) {
        self.dependencies.clear();
        self.registration_order.clear();
        self.known_resources.clear();
    }

    /// An edge is soft when either endpoint is declared optional
    fn is_optional_edge(&self, from: &ResourceDependency, to: &ResourceId) -> bool {
        from.optional
            || self
                .dependencies
                .get(to)
                .map(|dep| dep.optional)
                .unwrap_or(false)
    }

    fn detect_cycles(&self, filtered: &[&ResourceDependency]) -> BTreeSet<ResourceId> {
        fn visit<'a>(
            current: &'a ResourceId,
            graph: &HashMap<&'a ResourceId, &'a ResourceDependency>,
            marks: &mut HashMap<&'a ResourceId, VisitState>,
            circular: &mut BTreeSet<ResourceId>,
        ) {
            marks.insert(current, VisitState::Visiting);

            if let Some(&dependency) = graph.get(current) {
                for next in &dependency.depends_on {
                    if !graph.contains_key(next) {
                        continue;
                    }
                    match marks.get(next).copied() {
                        None => visit(next, graph, marks, circular),
                        Some(VisitState::Visiting) => {
                            // Back edge
                            circular.insert(current.clone());
                            circular.insert(next.clone());
                        }
                        Some(VisitState::Visited) => {}
                    }
                }
            }

            marks.insert(current, VisitState::Visited);
        }

        let graph: HashMap<&ResourceId, &ResourceDependency> = filtered
            .iter()
            .map(|dep| (&dep.resource_id, *dep))
            .collect();
        let mut marks = HashMap::new();
        let mut circular = BTreeSet::new();

        for dependency in filtered {
            if !marks.contains_key(&dependency.resource_id) {
                visit(&dependency.resource_id, &graph, &mut marks, &mut circular);
            }
        }

        circular
    }

    fn find_missing(
        &self,
        filtered: &[&ResourceDependency],
        enabled_resources: &HashSet<ResourceId>,
    ) -> Vec<MissingDependency> {
        filtered
            .iter()
            .filter_map(|dependency| {
                let missing_deps: Vec<ResourceId> = dependency
                    .depends_on
                    .iter()
                    .filter(|dep| {
                        !enabled_resources.contains(*dep) && !self.is_optional_edge(dependency, dep)
                    })
                    .cloned()
                    .collect();

                if missing_deps.is_empty() {
                    None
                } else {
                    Some(MissingDependency {
                        resource_id: dependency.resource_id.clone(),
                        missing_deps,
                    })
                }
            })
            .collect()
    }

    fn build_phases(
        &self,
        filtered: &[&ResourceDependency],
        circular: &BTreeSet<ResourceId>,
    ) -> (Vec<Vec<ResourceId>>, bool) {
        let non_circular = filtered
            .iter()
            .filter(|dep| !circular.contains(&dep.resource_id))
            .count();
        let max_iterations = non_circular + 1;

        let mut placed: HashSet<&ResourceId> = HashSet::new();
        let mut remaining: Vec<&ResourceDependency> = filtered.to_vec();
        let mut phases = Vec::new();

        for iteration in 0..max_iterations {
            if remaining.is_empty() {
                break;
            }

            let (ready, blocked): (Vec<&ResourceDependency>, Vec<&ResourceDependency>) =
                remaining.into_iter().partition(|dependency| {
                    dependency.depends_on.iter().all(|dep| {
                        placed.contains(dep)
                            || circular.contains(dep)
                            || self.is_optional_edge(dependency, dep)
                    })
                });
            remaining = blocked;

            if ready.is_empty() {
                debug!(iteration, "Layering made no progress");
                break;
            }

            placed.extend(ready.iter().map(|dep| &dep.resource_id));
            phases.push(sort_by_priority(ready));
        }

        if remaining.is_empty() {
            return (phases, false);
        }

        warn!(
            remaining = ?remaining.iter().map(|dep| dep.resource_id.as_str()).collect::<Vec<_>>(),
            "Resource layering stalled; placing remaining resources in a final phase"
        );
        phases.push(sort_by_priority(remaining));
        (phases, true)
    }
}

/// Priority descending; `sort_by` is stable so ties keep registration order
fn sort_by_priority(mut phase: Vec<&ResourceDependency>) -> Vec<ResourceId> {
    phase.sort_by(|a, b| b.priority.cmp(&a.priority));
    phase.into_iter().map(|dep| dep.resource_id.clone()).collect()
}
