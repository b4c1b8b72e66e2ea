// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! AI service health commands
//!
//! Commands: status, resolve, simulate
//!
//! Each invocation builds a fresh registry from the configured catalog, so
//! `simulate` shows what one error does to an all-active fleet.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use aegis_core::domain::ai_service::{AIServiceErrorType, ServiceState, ServiceStatusSnapshot};
use aegis_core::domain::coordinator_config::CoordinatorConfigManifest;
use aegis_core::infrastructure::ai_service::{AIServiceRegistry, ConfiguredServiceFactory};

#[derive(Subcommand)]
pub enum ServicesCommand {
    /// Show the state of every configured service
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a model hint to its primary and best available service
    Resolve {
        /// Model name hint (default: the default service)
        #[arg(value_name = "MODEL")]
        model: Option<String>,
    },

    /// Apply a classified error to a service and show the outcome
    Simulate {
        /// Service receiving the error
        #[arg(long, value_name = "ID")]
        service: String,

        /// Error kind: api_error, authentication, invalid_request, overloaded, rate_limit
        #[arg(long, value_name = "KIND")]
        error: AIServiceErrorType,

        /// Model hint used to pick the best service afterwards
        #[arg(long, value_name = "MODEL")]
        model: Option<String>,
    },
}

pub async fn handle_command(
    command: ServicesCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let config = CoordinatorConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let registry = AIServiceRegistry::from_config(&config, &ConfiguredServiceFactory)
        .context("Failed to build AI service registry")?;
    debug!(
        services = registry.service_ids().len(),
        default_service = %registry.default_service_id(),
        "AI service registry ready"
    );

    match command {
        ServicesCommand::Status { json } => status(&registry, json),
        ServicesCommand::Resolve { model } => resolve(&registry, model.as_deref()),
        ServicesCommand::Simulate {
            service,
            error,
            model,
        } => simulate(&registry, &service, error, model.as_deref()),
    }
}

fn status(registry: &AIServiceRegistry, json: bool) -> Result<()> {
    let snapshot = registry.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }
    Ok(())
}

fn resolve(registry: &AIServiceRegistry, model: Option<&str>) -> Result<()> {
    let primary = registry.get_service_id(model);
    println!("  Primary: {} ({})", primary.as_str().bold(), registry.get_service_state(&primary));

    match registry.get_best_service(model) {
        Some(best) => println!("  Best:    {}", best.as_str().green()),
        None => println!("  Best:    {}", "(no service available)".red()),
    }
    Ok(())
}

fn simulate(
    registry: &AIServiceRegistry,
    service: &str,
    error: AIServiceErrorType,
    model: Option<&str>,
) -> Result<()> {
    let state = registry.update_service_state(service, error);
    println!(
        "Applied {} to {}: now {}",
        error.to_string().bold(),
        service.bold(),
        colorize(state)
    );
    println!();

    print_snapshot(&registry.snapshot());
    println!();

    println!("{}", "Selection:".bold());
    resolve(registry, model)
}

fn print_snapshot(snapshot: &[ServiceStatusSnapshot]) {
    println!("{}", "AI services:".bold());
    if snapshot.is_empty() {
        println!("  {}", "(none configured)".dimmed());
    }
    for entry in snapshot {
        match entry.cooldown_until {
            Some(until) => println!(
                "  {} {} until {}",
                entry.service_id,
                colorize(entry.state),
                until.to_rfc3339()
            ),
            None => println!("  {} {}", entry.service_id, colorize(entry.state)),
        }
    }
}

fn colorize(state: ServiceState) -> String {
    match state {
        ServiceState::Active => state.as_str().green().to_string(),
        ServiceState::Cooldown => state.as_str().yellow().to_string(),
        ServiceState::Disabled => state.as_str().red().to_string(),
    }
}
