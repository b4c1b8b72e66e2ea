// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Resource initialization plan command

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

use aegis_core::domain::coordinator_config::CoordinatorConfigManifest;
use aegis_core::domain::dependency_resolver::ResourceDependencyManager;
use aegis_core::domain::resource::{ResourceId, ResourceInitializationPlan};

#[derive(Args)]
pub struct PlanArgs {
    /// Resources to enable (default: every resource with `enabled: true`)
    #[arg(long = "enable", value_name = "ID", value_delimiter = ',')]
    pub enable: Vec<String>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: PlanArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = CoordinatorConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;

    let manager = build_manager(&config)?;
    let enabled = enabled_set(&config, &args.enable);
    debug!(
        registered = manager.len(),
        enabled = enabled.len(),
        "Building initialization plan"
    );
    let plan = manager.create_initialization_plan(&enabled);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_plan(&plan);
    }

    Ok(())
}

/// Register every configured resource with a fresh dependency manager
pub fn build_manager(config: &CoordinatorConfigManifest) -> Result<ResourceDependencyManager> {
    let mut manager = ResourceDependencyManager::new();
    for dependency in config.resource_dependencies() {
        let resource_id = dependency.resource_id.clone();
        manager
            .register_resource_dependency(dependency)
            .with_context(|| format!("Invalid dependency declaration for '{}'", resource_id))?;
    }
    Ok(manager)
}

/// Explicit ids from the command line, else the config's enabled resources
pub fn enabled_set(config: &CoordinatorConfigManifest, explicit: &[String]) -> HashSet<ResourceId> {
    if explicit.is_empty() {
        config.enabled_resources()
    } else {
        explicit
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(ResourceId::new)
            .collect()
    }
}

fn print_plan(plan: &ResourceInitializationPlan) {
    println!("{}", "Initialization plan:".bold());
    if plan.phases.is_empty() {
        println!("  {}", "(no resources enabled)".dimmed());
    }
    for (index, phase) in plan.phases.iter().enumerate() {
        let members: Vec<&str> = phase.iter().map(ResourceId::as_str).collect();
        let marker = if plan.forced_phase && index + 1 == plan.phases.len() {
            " (forced)".yellow().to_string()
        } else {
            String::new()
        };
        println!("  Phase {}{}: {}", index, marker, members.join(", "));
    }

    if !plan.circular_dependencies.is_empty() {
        println!();
        println!("{}", "Circular dependencies:".yellow().bold());
        for resource_id in &plan.circular_dependencies {
            println!("  - {}", resource_id);
        }
    }

    if !plan.missing_dependencies.is_empty() {
        println!();
        println!("{}", "Missing dependencies:".yellow().bold());
        for missing in &plan.missing_dependencies {
            let deps: Vec<&str> = missing.missing_deps.iter().map(ResourceId::as_str).collect();
            println!("  - {} requires {}", missing.resource_id, deps.join(", "));
        }
    }

    println!();
    if plan.is_clean() {
        println!("{}", "✓ Plan is clean".green());
    } else {
        println!("{}", "⚠ Plan has diagnostics; startup order may not honour every dependency".yellow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
apiVersion: 100monkeys.ai/v1
kind: CoordinatorConfig
metadata:
  name: plan-test
spec:
  resources:
    - id: storage
      priority: 200
    - id: ai
      priority: 100
    - id: agents
      depends_on: [storage, ai]
    - id: telemetry
      enabled: false
"#;

    #[test]
    fn test_enabled_set_defaults_to_config() {
        let config = CoordinatorConfigManifest::from_yaml_str(CONFIG).unwrap();
        let enabled = enabled_set(&config, &[]);
        assert_eq!(enabled.len(), 3);
        assert!(!enabled.contains(&ResourceId::new("telemetry")));

        let explicit = enabled_set(&config, &["telemetry".to_string(), " ".to_string()]);
        assert_eq!(explicit.len(), 1);
    }

    #[test]
    fn test_plan_from_config() {
        let config = CoordinatorConfigManifest::from_yaml_str(CONFIG).unwrap();
        let manager = build_manager(&config).unwrap();
        let plan = manager.create_initialization_plan(&enabled_set(&config, &[]));

        assert_eq!(
            plan.phases,
            vec![
                vec![ResourceId::new("storage"), ResourceId::new("ai")],
                vec![ResourceId::new("agents")],
            ]
        );
    }
}
