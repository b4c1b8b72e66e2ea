// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::domain::ai_service::{AIServiceErrorType, ServiceId, ServiceState};
use crate::domain::resource::ResourceId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServiceHealthEvent {
    StateChanged {
        service_id: ServiceId,
        previous: ServiceState,
        current: ServiceState,
        error_type: Option<AIServiceErrorType>, // None for explicit registration
        cooldown_until: Option<DateTime<Utc>>,
        changed_at: DateTime<Utc>,
    },
    CooldownExpired {
        service_id: ServiceId,
        expired_at: DateTime<Utc>,
    },
}

impl ServiceHealthEvent {
    pub fn service_id(&self) -> &ServiceId {
        match self {
            ServiceHealthEvent::StateChanged { service_id, .. } => service_id,
            ServiceHealthEvent::CooldownExpired { service_id, .. } => service_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResourceLifecycleEvent {
    PlanCreated {
        phases: usize,
        resources: usize,
        circular: Vec<ResourceId>,
        missing: usize,
        forced_phase: bool,
        created_at: DateTime<Utc>,
    },
    PhaseStarted {
        phase: usize,
        resources: Vec<ResourceId>,
        started_at: DateTime<Utc>,
    },
    ResourceInitialized {
        resource_id: ResourceId,
        phase: usize,
        initialized_at: DateTime<Utc>,
    },
    ResourceFailed {
        resource_id: ResourceId,
        optional: bool,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    ResourceStopped {
        resource_id: ResourceId,
        stopped_at: DateTime<Utc>,
    },
    ShutdownBlocked {
        resource_id: ResourceId,
        dependents: Vec<ResourceId>,
        blocked_at: DateTime<Utc>,
    },
}
