// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// AI Service Registry - Health State Machine and Service Selection
//
// Tracks Active / Cooldown / Disabled state per AI backend, applies classified
// error signals, and resolves model hints to the best available service with
// fallback chains.
//
// Cooldown resets are one-shot tokio tasks. Every state mutation bumps the
// record's generation; a reset only applies when the generation it captured
// is still current, so a later Disabled (or a restarted window) is never
// overwritten by an older timer. Expired cooldowns are also applied lazily on
// read, which covers callers without a tokio runtime.

use crate::domain::ai_service::{
    AIService, AIServiceError, AIServiceErrorType, ErrorCategory, ServiceFactory, ServiceId,
    ServiceState, ServiceStatusSnapshot,
};
use crate::domain::coordinator_config::{
    AIServiceConfig, CooldownConfig, CoordinatorConfigManifest, ServiceSelection,
};
use crate::domain::events::ServiceHealthEvent;
use crate::infrastructure::event_bus::EventBus;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Shared registry of AI service health.
///
/// Cheap to clone; all clones observe the same state. Construct once at
/// startup and hand it to every caller that talks to a backend.
#[derive(Clone)]
pub struct AIServiceRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// Catalog order decides which vendor fragment wins
    catalog: Vec<AIServiceConfig>,
    default_service: ServiceId,
    /// Keyed by lowercased model name
    fallback_chains: HashMap<String, Vec<String>>,
    cooldown: CooldownConfig,
    instances: HashMap<ServiceId, Arc<dyn AIService>>,
    services: RwLock<HashMap<ServiceId, ServiceRecord>>,
    event_bus: RwLock<Option<EventBus>>,
}

#[derive(Debug)]
struct ServiceRecord {
    state: ServiceState,
    cooldown_until: Option<DateTime<Utc>>,
    deadline: Option<Instant>,
    generation: u64,
    reset_task: Option<AbortHandle>,
}

impl ServiceRecord {
    fn new(state: ServiceState) -> Self {
        Self {
            state,
            cooldown_until: None,
            deadline: None,
            generation: 0,
            reset_task: None,
        }
    }

    fn cancel_reset(&mut self) {
        if let Some(task) = self.reset_task.take() {
            task.abort();
        }
    }

    fn set_state(&mut self, state: ServiceState) {
        self.cancel_reset();
        self.state = state;
        self.cooldown_until = None;
        self.deadline = None;
        self.generation += 1;
    }

    fn enter_cooldown(&mut self, duration: Duration) {
        self.cancel_reset();
        self.state = ServiceState::Cooldown;
        self.deadline = Instant::now().checked_add(duration);
        self.cooldown_until = Some(
            chrono::Duration::from_std(duration)
                .ok()
                .and_then(|delta| Utc::now().checked_add_signed(delta))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
        self.generation += 1;
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        self.state == ServiceState::Cooldown
            && self.deadline.map(|deadline| now >= deadline).unwrap_or(false)
    }

    fn snapshot(&self, service_id: &ServiceId) -> ServiceStatusSnapshot {
        ServiceStatusSnapshot {
            service_id: service_id.clone(),
            state: self.state,
            cooldown_until: self.cooldown_until,
        }
    }
}

/// Outcome of a mutation, reported after the lock is released
struct Transition {
    service_id: ServiceId,
    previous: ServiceState,
    current: ServiceState,
    error_type: Option<AIServiceErrorType>,
    cooldown_until: Option<DateTime<Utc>>,
    reset: Option<(u64, Instant)>,
}

impl AIServiceRegistry {
    /// Create the registry from the coordinator configuration
    pub fn from_config(
        config: &CoordinatorConfigManifest,
        factory: &dyn ServiceFactory,
    ) -> anyhow::Result<Self> {
        Self::new(
            config.spec.ai_services.clone(),
            config.spec.service_selection.clone(),
            factory,
        )
    }

    /// Create the registry from a service catalog.
    ///
    /// Services disabled in the catalog, or whose handle cannot be created,
    /// start as Disabled.
    pub fn new(
        catalog: Vec<AIServiceConfig>,
        selection: ServiceSelection,
        factory: &dyn ServiceFactory,
    ) -> anyhow::Result<Self> {
        let default_service = selection
            .default_service
            .clone()
            .or_else(|| catalog.first().map(|service| service.id.clone()))
            .map(ServiceId::new)
            .ok_or_else(|| anyhow::anyhow!("No AI services configured and no default service set"))?;

        info!("Initializing AI service registry");

        let mut instances: HashMap<ServiceId, Arc<dyn AIService>> = HashMap::new();
        let mut services = HashMap::new();

        for service_config in &catalog {
            let service_id = service_config.service_id();

            let state = match factory.create(service_config) {
                Ok(instance) => {
                    instances.insert(service_id.clone(), instance);
                    if service_config.enabled {
                        ServiceState::Active
                    } else {
                        info!("AI service '{}' disabled by configuration", service_id);
                        ServiceState::Disabled
                    }
                }
                Err(e) => {
                    warn!("Failed to initialize AI service '{}': {}", service_id, e);
                    ServiceState::Disabled
                }
            };

            info!(
                service_id = %service_id,
                state = %state,
                fragments = ?service_config.vendor_fragments,
                "Registered AI service"
            );
            services.insert(service_id, ServiceRecord::new(state));
        }

        if !services.contains_key(&default_service) {
            warn!(
                "Default AI service '{}' is not in the catalog; it will report as disabled",
                default_service
            );
        }

        Ok(Self {
            inner: Arc::new(RegistryInner {
                catalog,
                default_service,
                fallback_chains: selection
                    .fallback_chains
                    .into_iter()
                    .map(|(model, chain)| (model.to_ascii_lowercase(), chain))
                    .collect(),
                cooldown: selection.cooldown,
                instances,
                services: RwLock::new(services),
                event_bus: RwLock::new(None),
            }),
        })
    }

    /// Publish state transitions on the given event bus
    pub fn with_event_bus(self, event_bus: EventBus) -> Self {
        *self.inner.event_bus.write() = Some(event_bus);
        self
    }

    /// Current state; ids that were never registered report Disabled
    pub fn get_service_state(&self, service_id: &ServiceId) -> ServiceState {
        self.inner.expire_if_due(service_id);
        self.inner
            .services
            .read()
            .get(service_id)
            .map(|record| record.state)
            .unwrap_or(ServiceState::Disabled)
    }

    /// Live handle for an Active service
    pub fn get_service(&self, service_id: &ServiceId) -> Result<Arc<dyn AIService>, AIServiceError> {
        let state = self.get_service_state(service_id);
        if state != ServiceState::Active {
            return Err(AIServiceError::Unavailable {
                service_id: service_id.clone(),
                state,
                available: self.active_service_ids(),
            });
        }

        self.inner
            .instances
            .get(service_id)
            .cloned()
            .ok_or_else(|| AIServiceError::NotInstantiated {
                service_id: service_id.clone(),
                available: self.active_service_ids(),
            })
    }

    /// Map a model hint to a service id by vendor fragment, falling back to
    /// the default service
    pub fn get_service_id(&self, model: Option<&str>) -> ServiceId {
        if let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) {
            if let Some(service) = self
                .inner
                .catalog
                .iter()
                .find(|service| service.matches_model(model))
            {
                return service.service_id();
            }
            debug!(model, "No AI service matches model hint; using default service");
        }
        self.inner.default_service.clone()
    }

    /// Best Active service for a model hint, trying the fallback chain of the
    /// primary service's resolved model. None when nothing is available.
    pub fn get_best_service(&self, model: Option<&str>) -> Option<ServiceId> {
        let primary = self.get_service_id(model);
        let primary_state = self.get_service_state(&primary);
        if primary_state == ServiceState::Active {
            return Some(primary);
        }

        let model_name = self.resolve_model_name(&primary, model);
        let Some(chain) = self
            .inner
            .fallback_chains
            .get(&model_name.to_ascii_lowercase())
        else {
            warn!(
                service_id = %primary,
                state = %primary_state,
                model = %model_name,
                "Primary AI service unavailable and no fallback chain configured"
            );
            return None;
        };

        for fallback_model in chain {
            let candidate = self.get_service_id(Some(fallback_model));
            if self.get_service_state(&candidate) == ServiceState::Active {
                info!(
                    primary = %primary,
                    fallback = %candidate,
                    model = %fallback_model,
                    "Falling back to alternative AI service"
                );
                return Some(candidate);
            }
        }

        warn!(
            service_id = %primary,
            model = %model_name,
            "No AI service in the fallback chain is active"
        );
        None
    }

    /// Upsert a service with an explicit state.
    ///
    /// Invalidates any pending cooldown reset. Registering as Cooldown starts
    /// a default-length window.
    pub fn register_service(&self, service_id: impl Into<ServiceId>, state: ServiceState) {
        let service_id = service_id.into();
        let transition = {
            let mut services = self.inner.services.write();
            let record = services
                .entry(service_id.clone())
                .or_insert_with(|| ServiceRecord::new(state));
            let previous = record.state;

            let reset = if state == ServiceState::Cooldown {
                record.enter_cooldown(self.inner.cooldown.default);
                record.deadline.map(|deadline| (record.generation, deadline))
            } else {
                record.set_state(state);
                None
            };

            Transition {
                service_id: service_id.clone(),
                previous,
                current: record.state,
                error_type: None,
                cooldown_until: record.cooldown_until,
                reset,
            }
        };

        info!(service_id = %service_id, state = %state, "Registered AI service");
        self.apply(transition);
    }

    /// Apply a classified error to a service, registering it first when
    /// unknown. Returns the resulting state.
    pub fn update_service_state(
        &self,
        service_id: impl Into<ServiceId>,
        error_type: AIServiceErrorType,
    ) -> ServiceState {
        let service_id = service_id.into();
        self.inner.expire_if_due(&service_id);

        let transition = {
            let mut services = self.inner.services.write();
            let record = services.entry(service_id.clone()).or_insert_with(|| {
                info!("Discovered unregistered AI service '{}'", service_id);
                ServiceRecord::new(ServiceState::Active)
            });
            let previous = record.state;

            let reset = match error_type.category() {
                ErrorCategory::NoOp => {
                    debug!(
                        service_id = %service_id,
                        error_type = %error_type,
                        "Error does not affect service state"
                    );
                    return previous;
                }
                ErrorCategory::Disable => {
                    if previous == ServiceState::Disabled {
                        debug!(
                            service_id = %service_id,
                            error_type = %error_type,
                            "Service is already disabled"
                        );
                        return previous;
                    }
                    record.set_state(ServiceState::Disabled);
                    None
                }
                ErrorCategory::Cooldown => {
                    if previous == ServiceState::Disabled {
                        debug!(
                            service_id = %service_id,
                            error_type = %error_type,
                            "Service is disabled; ignoring cooldown signal"
                        );
                        return previous;
                    }
                    record.enter_cooldown(self.inner.cooldown.duration_for(error_type));
                    record.deadline.map(|deadline| (record.generation, deadline))
                }
            };

            Transition {
                service_id: service_id.clone(),
                previous,
                current: record.state,
                error_type: Some(error_type),
                cooldown_until: record.cooldown_until,
                reset,
            }
        };

        match transition.current {
            ServiceState::Disabled => warn!(
                service_id = %service_id,
                error_type = %error_type,
                "AI service disabled after critical error"
            ),
            _ => info!(
                service_id = %service_id,
                error_type = %error_type,
                cooldown_until = ?transition.cooldown_until,
                "AI service entered cooldown"
            ),
        }

        let current = transition.current;
        self.apply(transition);
        current
    }

    /// Ids of all Active services, sorted
    pub fn active_service_ids(&self) -> Vec<ServiceId> {
        self.inner.expire_all_due();
        let mut ids: Vec<ServiceId> = self
            .inner
            .services
            .read()
            .iter()
            .filter(|(_, record)| record.state == ServiceState::Active)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Every registered service id, sorted
    pub fn service_ids(&self) -> Vec<ServiceId> {
        let mut ids: Vec<ServiceId> = self.inner.services.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Health of every registered service, sorted by id
    pub fn snapshot(&self) -> Vec<ServiceStatusSnapshot> {
        self.inner.expire_all_due();
        let mut snapshot: Vec<ServiceStatusSnapshot> = self
            .inner
            .services
            .read()
            .iter()
            .map(|(id, record)| record.snapshot(id))
            .collect();
        snapshot.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        snapshot
    }

    pub fn default_service_id(&self) -> &ServiceId {
        &self.inner.default_service
    }

    /// Model the given service would use for the hint
    fn resolve_model_name(&self, service_id: &ServiceId, model: Option<&str>) -> String {
        if let Some(instance) = self.inner.instances.get(service_id) {
            return instance.get_model(model);
        }

        match self
            .inner
            .catalog
            .iter()
            .find(|service| service.id == service_id.as_str())
        {
            Some(config) => match model {
                Some(m) if config.models.iter().any(|known| known.eq_ignore_ascii_case(m)) => {
                    m.to_string()
                }
                _ => config.default_model.clone(),
            },
            None => model.unwrap_or_default().to_string(),
        }
    }

    fn apply(&self, transition: Transition) {
        metrics::counter!(
            "aegis_service_state_transitions_total",
            "service" => transition.service_id.to_string(),
            "state" => transition.current.as_str()
        )
        .increment(1);

        if let Some((generation, deadline)) = transition.reset {
            self.schedule_reset(transition.service_id.clone(), generation, deadline);
        }

        self.inner.publish(ServiceHealthEvent::StateChanged {
            service_id: transition.service_id,
            previous: transition.previous,
            current: transition.current,
            error_type: transition.error_type,
            cooldown_until: transition.cooldown_until,
            changed_at: Utc::now(),
        });
    }

    fn schedule_reset(&self, service_id: ServiceId, generation: u64, deadline: Instant) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(
                service_id = %service_id,
                "No async runtime; cooldown will be cleared on the next read after it expires"
            );
            return;
        };

        let inner: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let task_service_id = service_id.clone();
        let task = handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = inner.upgrade() {
                inner.expire_cooldown(&task_service_id, Some(generation));
            }
        });

        // The window may have been replaced while the lock was released
        let mut services = self.inner.services.write();
        match services.get_mut(&service_id) {
            Some(record) if record.generation == generation => {
                record.reset_task = Some(task.abort_handle());
            }
            _ => task.abort(),
        }
    }
}

impl RegistryInner {
    fn expire_if_due(&self, service_id: &ServiceId) {
        let due = self
            .services
            .read()
            .get(service_id)
            .map(|record| record.cooldown_elapsed(Instant::now()))
            .unwrap_or(false);

        if due {
            self.expire_cooldown(service_id, None);
        }
    }

    fn expire_all_due(&self) {
        let now = Instant::now();
        let due: Vec<ServiceId> = self
            .services
            .read()
            .iter()
            .filter(|(_, record)| record.cooldown_elapsed(now))
            .map(|(id, _)| id.clone())
            .collect();

        for service_id in due {
            self.expire_cooldown(&service_id, None);
        }
    }

    /// Reset an elapsed cooldown to Active. With `expected_generation`, only
    /// when no other transition happened since the cooldown started.
    fn expire_cooldown(&self, service_id: &ServiceId, expected_generation: Option<u64>) -> bool {
        {
            let mut services = self.services.write();
            let Some(record) = services.get_mut(service_id) else {
                return false;
            };

            if let Some(generation) = expected_generation {
                if record.generation != generation {
                    debug!(
                        service_id = %service_id,
                        "Stale cooldown reset ignored; state changed since it was scheduled"
                    );
                    return false;
                }
            }

            if !record.cooldown_elapsed(Instant::now()) {
                return false;
            }

            record.set_state(ServiceState::Active);
        }

        info!(service_id = %service_id, "AI service cooldown expired; service is active again");
        metrics::counter!(
            "aegis_service_state_transitions_total",
            "service" => service_id.to_string(),
            "state" => ServiceState::Active.as_str()
        )
        .increment(1);

        let now = Utc::now();
        self.publish(ServiceHealthEvent::CooldownExpired {
            service_id: service_id.clone(),
            expired_at: now,
        });
        self.publish(ServiceHealthEvent::StateChanged {
            service_id: service_id.clone(),
            previous: ServiceState::Cooldown,
            current: ServiceState::Active,
            error_type: None,
            cooldown_until: None,
            changed_at: now,
        });
        true
    }

    fn publish(&self, event: ServiceHealthEvent) {
        if let Some(event_bus) = self.event_bus.read().as_ref() {
            event_bus.publish_service_event(event);
        }
    }
}
