// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Resource Lifecycle Use Case
//!
//! Starts and stops system resources in dependency order.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Drive resource initializers through the phased plan
//! - **Collaborators:**
//!   - Domain: ResourceDependencyManager (plan, shutdown safety)
//!   - Infrastructure: EventBus
//!
//! # Flow
//!
//! 1. Build the initialization plan for the enabled resources
//! 2. Run each phase's initializers concurrently, phases in order
//! 3. Optional failures are logged and skipped; a required failure aborts
//! 4. On stop, walk the shutdown order and stop a resource only once no
//!    running resource requires it; anything still blocked after a pass
//!    without progress is stopped anyway

use crate::domain::dependency_resolver::ResourceDependencyManager;
use crate::domain::events::ResourceLifecycleEvent;
use crate::domain::resource::{ResourceId, ResourceInitializationPlan};
use crate::infrastructure::event_bus::EventBus;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Brings a single resource up and down
#[async_trait]
pub trait ResourceInitializer: Send + Sync {
    async fn initialize(&self) -> Result<()>;

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Outcome of a successful startup
#[derive(Debug, Clone, Serialize)]
pub struct StartupReport {
    pub plan: ResourceInitializationPlan,
    /// Resources initialized, in completion order per phase
    pub started: Vec<ResourceId>,
    /// Optional resources whose initializer failed
    pub skipped_optional: Vec<ResourceId>,
    /// Resources started in the forced final phase, whose required
    /// dependencies could not be placed before them
    pub forced: Vec<ResourceId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShutdownReport {
    pub stopped: Vec<ResourceId>,
    /// Resources stopped while a running dependent still required them
    pub forced: Vec<ResourceId>,
}

#[async_trait]
pub trait ResourceLifecycleUseCase: Send + Sync {
    /// Initialize the enabled resources phase by phase.
    ///
    /// # Errors
    ///
    /// Fails on the first phase in which a non-optional resource fails to
    /// initialize. Resources started before the failure stay running; call
    /// `stop` to release them.
    async fn start(&self, enabled: &HashSet<ResourceId>) -> Result<StartupReport>;

    /// Stop every running resource in reverse dependency order
    async fn stop(&self) -> Result<ShutdownReport>;

    fn running(&self) -> HashSet<ResourceId>;
}

#[derive(Default)]
struct LifecycleState {
    plan: Option<ResourceInitializationPlan>,
    running: HashSet<ResourceId>,
}

pub struct StandardResourceLifecycleService {
    dependencies: ResourceDependencyManager,
    initializers: HashMap<ResourceId, Arc<dyn ResourceInitializer>>,
    event_bus: Option<EventBus>,
    state: Mutex<LifecycleState>,
}

impl StandardResourceLifecycleService {
    pub fn new(dependencies: ResourceDependencyManager) -> Self {
        Self {
            dependencies,
            initializers: HashMap::new(),
            event_bus: None,
            state: Mutex::new(LifecycleState::default()),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Attach the initializer for a resource. The resource must also be
    /// registered with the dependency manager to be planned.
    pub fn with_initializer(
        mut self,
        resource_id: impl Into<ResourceId>,
        initializer: Arc<dyn ResourceInitializer>,
    ) -> Self {
        self.initializers.insert(resource_id.into(), initializer);
        self
    }

    pub fn dependencies(&self) -> &ResourceDependencyManager {
        &self.dependencies
    }

    fn is_optional(&self, resource_id: &ResourceId) -> bool {
        self.dependencies
            .get_dependency(resource_id)
            .map(|dep| dep.optional)
            .unwrap_or(false)
    }

    fn publish(&self, event: ResourceLifecycleEvent) {
        if let Some(event_bus) = &self.event_bus {
            event_bus.publish_resource_event(event);
        }
    }

    async fn stop_resource(&self, resource_id: &ResourceId) {
        if let Some(initializer) = self.initializers.get(resource_id) {
            if let Err(e) = initializer.shutdown().await {
                warn!(resource_id = %resource_id, "Resource shutdown failed: {:#}", e);
            }
        }

        self.state.lock().running.remove(resource_id);
        info!(resource_id = %resource_id, "Resource stopped");
        self.publish(ResourceLifecycleEvent::ResourceStopped {
            resource_id: resource_id.clone(),
            stopped_at: Utc::now(),
        });
    }
}

#[async_trait]
impl ResourceLifecycleUseCase for StandardResourceLifecycleService {
    async fn start(&self, enabled: &HashSet<ResourceId>) -> Result<StartupReport> {
        let plan = self.dependencies.create_initialization_plan(enabled);
        self.state.lock().plan = Some(plan.clone());

        self.publish(ResourceLifecycleEvent::PlanCreated {
            phases: plan.phases.len(),
            resources: plan.resource_count(),
            circular: plan.circular_dependencies.iter().cloned().collect(),
            missing: plan.missing_dependencies.len(),
            forced_phase: plan.forced_phase,
            created_at: Utc::now(),
        });

        let mut started = Vec::new();
        let mut skipped_optional = Vec::new();
        let mut forced = Vec::new();
        let forced_index = plan
            .forced_phase
            .then(|| plan.phases.len().checked_sub(1))
            .flatten();

        for (index, phase) in plan.phases.iter().enumerate() {
            let is_forced = forced_index == Some(index);
            if is_forced {
                for missing in &plan.missing_dependencies {
                    warn!(
                        resource_id = %missing.resource_id,
                        missing = ?missing.missing_deps,
                        "Starting resource despite missing required dependencies"
                    );
                }
                warn!(
                    phase = index,
                    resources = ?phase,
                    circular = ?plan.circular_dependencies,
                    "Starting forced phase; dependency order is not guaranteed"
                );
            }
            info!(phase = index, resources = ?phase, "Starting resource phase");
            self.publish(ResourceLifecycleEvent::PhaseStarted {
                phase: index,
                resources: phase.clone(),
                started_at: Utc::now(),
            });

            let tasks: Vec<_> = phase
                .iter()
                .filter_map(|id| match self.initializers.get(id) {
                    Some(initializer) => Some((id.clone(), Arc::clone(initializer))),
                    None => {
                        debug!(resource_id = %id, "No initializer registered; skipping");
                        None
                    }
                })
                .map(|(id, initializer)| async move {
                    let result = initializer.initialize().await;
                    (id, result)
                })
                .collect();

            let mut failures = Vec::new();
            for (resource_id, result) in join_all(tasks).await {
                match result {
                    Ok(()) => {
                        self.state.lock().running.insert(resource_id.clone());
                        metrics::counter!("aegis_resource_initializations_total", "outcome" => "success")
                            .increment(1);
                        self.publish(ResourceLifecycleEvent::ResourceInitialized {
                            resource_id: resource_id.clone(),
                            phase: index,
                            initialized_at: Utc::now(),
                        });
                        if is_forced {
                            forced.push(resource_id.clone());
                        }
                        started.push(resource_id);
                    }
                    Err(e) => failures.push((resource_id, e)),
                }
            }

            let mut required_failure = None;
            for (resource_id, e) in failures {
                let optional = self.is_optional(&resource_id);
                metrics::counter!("aegis_resource_initializations_total", "outcome" => "failure")
                    .increment(1);
                self.publish(ResourceLifecycleEvent::ResourceFailed {
                    resource_id: resource_id.clone(),
                    optional,
                    reason: format!("{:#}", e),
                    failed_at: Utc::now(),
                });

                if optional {
                    warn!(resource_id = %resource_id, "Optional resource failed to initialize: {:#}", e);
                    skipped_optional.push(resource_id);
                } else {
                    error!(resource_id = %resource_id, "Required resource failed to initialize: {:#}", e);
                    required_failure.get_or_insert((resource_id, e));
                }
            }

            if let Some((resource_id, e)) = required_failure {
                return Err(e.context(format!(
                    "Failed to initialize required resource '{}' in phase {}",
                    resource_id, index
                )));
            }
        }

        info!(
            started = started.len(),
            skipped_optional = skipped_optional.len(),
            forced = forced.len(),
            "Resource startup complete"
        );

        Ok(StartupReport {
            plan,
            started,
            skipped_optional,
            forced,
        })
    }

    async fn stop(&self) -> Result<ShutdownReport> {
        let (order, mut running) = {
            let state = self.state.lock();
            let order = state
                .plan
                .as_ref()
                .map(ResourceInitializationPlan::shutdown_order)
                .unwrap_or_default();
            (order, state.running.clone())
        };

        let mut pending: Vec<ResourceId> = order
            .into_iter()
            .filter(|id| running.contains(id))
            .collect();
        let mut report = ShutdownReport::default();

        loop {
            let mut progressed = false;
            let mut blocked = Vec::new();

            for resource_id in pending {
                if self.dependencies.can_safely_shutdown(&resource_id, &running) {
                    self.stop_resource(&resource_id).await;
                    running.remove(&resource_id);
                    report.stopped.push(resource_id);
                    progressed = true;
                } else {
                    let dependents: Vec<ResourceId> = self
                        .dependencies
                        .get_dependent_resources(&resource_id)
                        .into_iter()
                        .filter(|id| running.contains(id))
                        .collect();
                    debug!(resource_id = %resource_id, dependents = ?dependents, "Shutdown blocked by running dependents");
                    self.publish(ResourceLifecycleEvent::ShutdownBlocked {
                        resource_id: resource_id.clone(),
                        dependents,
                        blocked_at: Utc::now(),
                    });
                    blocked.push(resource_id);
                }
            }

            pending = blocked;
            if pending.is_empty() || !progressed {
                break;
            }
        }

        for resource_id in pending {
            warn!(resource_id = %resource_id, "Forcing shutdown of resource still required by running dependents");
            self.stop_resource(&resource_id).await;
            running.remove(&resource_id);
            report.forced.push(resource_id);
        }

        Ok(report)
    }

    fn running(&self) -> HashSet<ResourceId> {
        self.state.lock().running.clone()
    }
}
