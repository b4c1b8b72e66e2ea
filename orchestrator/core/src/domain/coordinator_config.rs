// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Coordinator Configuration Types
//
// Defines the configuration schema for the AEGIS coordinator, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Resource dependency declarations for phased startup
// - AI service catalog (vendor fragments, models)
// - Service selection: default service, fallback chains, cooldown windows
// - Logging settings

use crate::domain::ai_service::{AIServiceErrorType, ServiceId};
use crate::domain::resource::{ResourceDependency, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "CoordinatorConfig";

/// Top-level Kubernetes-style coordinator configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "CoordinatorConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: CoordinatorConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Coordinator configuration specification (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorConfigSpec {
    /// Resources initialized at startup
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,

    /// AI service catalog
    #[serde(default)]
    pub ai_services: Vec<AIServiceConfig>,

    #[serde(default)]
    pub service_selection: ServiceSelection,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub id: String,

    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Higher priority starts earlier within a phase
    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub optional: bool,

    /// Disabled resources stay registered but are left out of the plan
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ResourceConfig {
    pub fn to_dependency(&self) -> ResourceDependency {
        ResourceDependency::new(self.id.as_str())
            .depends_on(self.depends_on.iter().map(String::as_str))
            .with_priority(self.priority)
            .optional(self.optional)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIServiceConfig {
    /// Unique service id (e.g. "openai", "anthropic")
    pub id: String,

    /// Administratively disabled services register as Disabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Case-insensitive substrings of model names served by this service
    /// (e.g. ["gpt", "o1"] for OpenAI)
    pub vendor_fragments: Vec<String>,

    pub default_model: String,

    #[serde(default)]
    pub models: Vec<String>,
}

impl AIServiceConfig {
    pub fn service_id(&self) -> ServiceId {
        ServiceId::new(self.id.as_str())
    }

    /// True when the model hint contains one of the vendor fragments
    pub fn matches_model(&self, model: &str) -> bool {
        let model = model.to_lowercase();
        self.vendor_fragments
            .iter()
            .any(|fragment| !fragment.is_empty() && model.contains(&fragment.to_lowercase()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSelection {
    /// Service used when no model hint is given or nothing matches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_service: Option<String>,

    /// Model name -> ordered alternative model names
    #[serde(default)]
    pub fallback_chains: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub cooldown: CooldownConfig,
}

/// Cooldown windows per classified error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    #[serde(default = "default_cooldown", with = "humantime_serde")]
    pub default: Duration,

    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<Duration>,

    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub api_error: Option<Duration>,

    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub overloaded: Option<Duration>,
}

impl CooldownConfig {
    pub fn duration_for(&self, error_type: AIServiceErrorType) -> Duration {
        let specific = match error_type {
            AIServiceErrorType::RateLimit => self.rate_limit,
            AIServiceErrorType::ApiError => self.api_error,
            AIServiceErrorType::Overloaded => self.overloaded,
            AIServiceErrorType::Authentication | AIServiceErrorType::InvalidRequest => None,
        };
        specific.unwrap_or(self.default)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_cooldown() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            default: default_cooldown(),
            rate_limit: None,
            api_error: None,
            overloaded: None,
        }
    }
}

impl Default for ServiceSelection {
    fn default() -> Self {
        Self {
            default_service: None,
            fallback_chains: HashMap::new(),
            cooldown: CooldownConfig::default(),
        }
    }
}

impl Default for CoordinatorConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "aegis-coordinator".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: CoordinatorConfigSpec::default(),
        }
    }
}

impl CoordinatorConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. AEGIS_COORDINATOR_CONFIG environment variable
    /// 2. ./aegis-coordinator.yaml (working directory)
    /// 3. ~/.aegis/coordinator.yaml (user home)
    /// 4. /etc/aegis/coordinator.yaml (system, Unix) or C:\ProgramData\Aegis\coordinator.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("AEGIS_COORDINATOR_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./aegis-coordinator.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".aegis").join("coordinator.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/aegis/coordinator.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Aegis\\coordinator.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path (fail if missing/invalid)
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using empty defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AEGIS_DEFAULT_SERVICE") {
            let trimmed = val.trim();
            if trimmed.is_empty() {
                tracing::warn!("Ignoring empty AEGIS_DEFAULT_SERVICE override");
            } else {
                tracing::info!("Environment override: AEGIS_DEFAULT_SERVICE={}", trimmed);
                self.spec.service_selection.default_service = Some(trimmed.to_string());
            }
        }
    }

    /// Dependency records for every configured resource
    pub fn resource_dependencies(&self) -> Vec<ResourceDependency> {
        self.spec.resources.iter().map(ResourceConfig::to_dependency).collect()
    }

    /// Ids of resources with `enabled: true`
    pub fn enabled_resources(&self) -> HashSet<ResourceId> {
        self.spec
            .resources
            .iter()
            .filter(|r| r.enabled)
            .map(|r| ResourceId::new(r.id.as_str()))
            .collect()
    }

    /// Default service id: explicit selection, else the first catalog entry
    pub fn default_service_id(&self) -> Option<ServiceId> {
        self.spec
            .service_selection
            .default_service
            .as_deref()
            .or_else(|| self.spec.ai_services.first().map(|s| s.id.as_str()))
            .map(ServiceId::new)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let mut resource_ids = HashSet::new();
        for resource in &self.spec.resources {
            if resource.id.is_empty() {
                anyhow::bail!("Resource id cannot be empty");
            }
            if !resource_ids.insert(resource.id.as_str()) {
                anyhow::bail!("Duplicate resource id: {}", resource.id);
            }
            if resource.depends_on.iter().any(|dep| dep == &resource.id) {
                anyhow::bail!("Resource '{}' cannot depend on itself", resource.id);
            }
        }

        let mut service_ids = HashSet::new();
        for service in &self.spec.ai_services {
            if service.id.is_empty() {
                anyhow::bail!("AI service id cannot be empty");
            }
            if !service_ids.insert(service.id.as_str()) {
                anyhow::bail!("Duplicate AI service id: {}", service.id);
            }
            if service.vendor_fragments.iter().all(|f| f.trim().is_empty()) {
                anyhow::bail!("AI service must have at least one vendor fragment: {}", service.id);
            }
            if service.default_model.is_empty() {
                anyhow::bail!("AI service default_model cannot be empty: {}", service.id);
            }
        }

        let selection = &self.spec.service_selection;
        if let Some(default_service) = &selection.default_service {
            if !service_ids.contains(default_service.as_str()) {
                anyhow::bail!("Default service '{}' not found in ai_services", default_service);
            }
        }

        for (model, chain) in &selection.fallback_chains {
            if model.is_empty() {
                anyhow::bail!("Fallback chain key cannot be empty");
            }
            if chain.iter().any(|m| m.is_empty()) {
                anyhow::bail!("Fallback chain for '{}' contains an empty model name", model);
            }
        }

        if selection.cooldown.default.is_zero() {
            anyhow::bail!("service_selection.cooldown.default must be greater than zero");
        }

        Ok(())
    }
}
