// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Catalog-backed AI Service Handle
//
// Describes a backend purely from its catalog entry: identity, default model
// and the models it accepts. Request execution stays with the caller.

use crate::domain::ai_service::{AIService, ServiceFactory, ServiceId};
use crate::domain::coordinator_config::AIServiceConfig;
use std::sync::Arc;

pub struct ConfiguredService {
    service_id: ServiceId,
    default_model: String,
    models: Vec<String>,
}

impl ConfiguredService {
    pub fn new(service_id: ServiceId, default_model: String, models: Vec<String>) -> Self {
        Self {
            service_id,
            default_model,
            models,
        }
    }

    pub fn from_config(config: &AIServiceConfig) -> Self {
        Self::new(
            config.service_id(),
            config.default_model.clone(),
            config.models.clone(),
        )
    }
}

impl AIService for ConfiguredService {
    fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn supports_model(&self, model: &str) -> bool {
        model.eq_ignore_ascii_case(&self.default_model)
            || self.models.iter().any(|m| m.eq_ignore_ascii_case(model))
    }
}

/// Default factory: one ConfiguredService per catalog entry
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfiguredServiceFactory;

impl ServiceFactory for ConfiguredServiceFactory {
    fn create(&self, config: &AIServiceConfig) -> anyhow::Result<Arc<dyn AIService>> {
        if config.default_model.trim().is_empty() {
            anyhow::bail!("AI service '{}' has no default model", config.id);
        }
        Ok(Arc::new(ConfiguredService::from_config(config)))
    }
}
