// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # AI Service Domain Interface
//!
//! Health states, error taxonomy and service handle contracts for the AI
//! backends the orchestrator routes requests to.
//!
//! ## State Machine
//!
//! | From | Signal | To |
//! |------|--------|----|
//! | Active | cooldown-class error | Cooldown (until deadline) |
//! | Cooldown | cooldown-class error | Cooldown (window restarts) |
//! | Cooldown | deadline reached | Active |
//! | Active / Cooldown | critical error | Disabled |
//! | Disabled | any error | Disabled |
//! | any | invalid request | unchanged |
//!
//! Implementations live in `crate::infrastructure::ai_service`.

use crate::domain::coordinator_config::AIServiceConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Unique name of an AI backend service (e.g. "openai", "anthropic")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ServiceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Operational state of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Active,
    Cooldown,
    Disabled,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Active => "active",
            ServiceState::Cooldown => "cooldown",
            ServiceState::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure reported by callers after a backend request fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AIServiceErrorType {
    ApiError,
    Authentication,
    InvalidRequest,
    Overloaded,
    RateLimit,
}

/// What a classified error does to the service state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller-side mistake; the service itself is fine
    NoOp,
    /// Temporary unavailability
    Cooldown,
    /// Terminal until restart or re-registration
    Disable,
}

impl AIServiceErrorType {
    pub const ALL: [AIServiceErrorType; 5] = [
        AIServiceErrorType::ApiError,
        AIServiceErrorType::Authentication,
        AIServiceErrorType::InvalidRequest,
        AIServiceErrorType::Overloaded,
        AIServiceErrorType::RateLimit,
    ];

    pub fn category(self) -> ErrorCategory {
        match self {
            AIServiceErrorType::Authentication => ErrorCategory::Disable,
            AIServiceErrorType::RateLimit
            | AIServiceErrorType::ApiError
            | AIServiceErrorType::Overloaded => ErrorCategory::Cooldown,
            AIServiceErrorType::InvalidRequest => ErrorCategory::NoOp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AIServiceErrorType::ApiError => "api_error",
            AIServiceErrorType::Authentication => "authentication",
            AIServiceErrorType::InvalidRequest => "invalid_request",
            AIServiceErrorType::Overloaded => "overloaded",
            AIServiceErrorType::RateLimit => "rate_limit",
        }
    }
}

impl std::fmt::Display for AIServiceErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AIServiceErrorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized || kind.as_str().replace('_', "") == normalized)
            .ok_or_else(|| {
                format!(
                    "Unknown AI service error type '{}'. Expected one of: api_error, authentication, invalid_request, overloaded, rate_limit",
                    s
                )
            })
    }
}

/// Point-in-time view of one service's health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatusSnapshot {
    pub service_id: ServiceId,
    pub state: ServiceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<DateTime<Utc>>,
}

/// Live handle to a backend service.
///
/// The request/response cycle belongs to the caller; the registry only needs
/// identity and model resolution.
pub trait AIService: Send + Sync {
    fn service_id(&self) -> &ServiceId;

    /// Model used when the caller gives no hint or an unsupported one
    fn default_model(&self) -> &str;

    fn supports_model(&self, model: &str) -> bool;

    /// Resolve the model this service would use for a request
    fn get_model(&self, requested: Option<&str>) -> String {
        match requested {
            Some(model) if self.supports_model(model) => model.to_string(),
            _ => self.default_model().to_string(),
        }
    }
}

/// Builds service handles from catalog entries
pub trait ServiceFactory: Send + Sync {
    fn create(&self, config: &AIServiceConfig) -> anyhow::Result<Arc<dyn AIService>>;
}

/// Errors returned when a caller asks for a service handle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AIServiceError {
    #[error("AI service '{service_id}' is unavailable ({state}); active services: [{}]", join_ids(.available))]
    Unavailable {
        service_id: ServiceId,
        state: ServiceState,
        available: Vec<ServiceId>,
    },

    #[error("AI service '{service_id}' is active but was never instantiated; active services: [{}]", join_ids(.available))]
    NotInstantiated {
        service_id: ServiceId,
        available: Vec<ServiceId>,
    },
}

impl AIServiceError {
    pub fn service_id(&self) -> &ServiceId {
        match self {
            AIServiceError::Unavailable { service_id, .. }
            | AIServiceError::NotInstantiated { service_id, .. } => service_id,
        }
    }

    /// Currently active alternatives, for caller-side fallback
    pub fn available(&self) -> &[ServiceId] {
        match self {
            AIServiceError::Unavailable { available, .. }
            | AIServiceError::NotInstantiated { available, .. } => available,
        }
    }
}

fn join_ids(ids: &[ServiceId]) -> String {
    ids.iter()
        .map(ServiceId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
