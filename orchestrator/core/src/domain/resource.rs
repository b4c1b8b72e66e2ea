// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Resource Domain Model
//!
//! Value objects describing named subsystems (database pools, AI clients,
//! agent runners, ...) and the startup dependencies between them.
//!
//! - [`ResourceId`]: opaque unique key for a resource.
//! - [`ResourceDependency`]: declared dependencies, priority and optionality.
//! - [`ResourceInitializationPlan`]: derived, phased startup order plus
//!   cycle and missing-dependency diagnostics.
//!
//! The plan is computed by
//! [`ResourceDependencyManager`](crate::domain::dependency_resolver::ResourceDependencyManager).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Unique name of a resource (e.g. "storage", "ai", "agents")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Declared startup dependencies of a single resource.
///
/// # Invariants
/// - `depends_on` never contains `resource_id` (enforced at registration)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDependency {
    pub resource_id: ResourceId,

    /// Resources that must be initialized first
    #[serde(default)]
    pub depends_on: Vec<ResourceId>,

    /// Higher priority initializes earlier within a phase
    #[serde(default)]
    pub priority: i32,

    /// Optional resources never block their dependents and are never
    /// blocked by their own dependencies
    #[serde(default)]
    pub optional: bool,
}

impl ResourceDependency {
    pub fn new(resource_id: impl Into<ResourceId>) -> Self {
        Self {
            resource_id: resource_id.into(),
            depends_on: Vec::new(),
            priority: 0,
            optional: false,
        }
    }

    pub fn depends_on<I, T>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ResourceId>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn is_self_referencing(&self) -> bool {
        self.depends_on.contains(&self.resource_id)
    }
}

/// A resource whose required dependencies are not in the enabled set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDependency {
    pub resource_id: ResourceId,
    pub missing_deps: Vec<ResourceId>,
}

/// Phased initialization order for a set of enabled resources.
///
/// Resources within one phase have no unsatisfied dependency on each other
/// and may be initialized concurrently. Diagnostics are reported as data;
/// the caller decides whether to warn or abort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInitializationPlan {
    pub phases: Vec<Vec<ResourceId>>,
    pub circular_dependencies: BTreeSet<ResourceId>,
    pub missing_dependencies: Vec<MissingDependency>,

    /// Set when layering stopped making progress and the remaining
    /// resources were placed into a single final phase
    #[serde(default)]
    pub forced_phase: bool,
}

impl ResourceInitializationPlan {
    /// Phase index of a resource, if it was placed
    pub fn phase_of(&self, resource_id: &ResourceId) -> Option<usize> {
        self.phases
            .iter()
            .position(|phase| phase.contains(resource_id))
    }

    pub fn resource_count(&self) -> usize {
        self.phases.iter().map(Vec::len).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.circular_dependencies.is_empty()
            && self.missing_dependencies.is_empty()
            && !self.forced_phase
    }

    /// Resources in the order they should be stopped: last phase first,
    /// lower priority first within a phase.
    pub fn shutdown_order(&self) -> Vec<ResourceId> {
        self.phases
            .iter()
            .rev()
            .flat_map(|phase| phase.iter().rev().cloned())
            .collect()
    }
}

/// Structural errors raised while registering resources
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("Resource '{resource_id}' cannot depend on itself")]
    SelfDependency { resource_id: ResourceId },
}
