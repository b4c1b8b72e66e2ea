// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use aegis_core::domain::coordinator_config::{CooldownConfig, CoordinatorConfigManifest};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./aegis-coordinator.yaml)
        #[arg(short, long, default_value = "./aegis-coordinator.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = CoordinatorConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. AEGIS_COORDINATOR_CONFIG: {}",
            std::env::var("AEGIS_COORDINATOR_CONFIG")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./aegis-coordinator.yaml");
        println!("  4. ~/.aegis/coordinator.yaml");
        println!("  5. /etc/aegis/coordinator.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Resources:".bold());
    for resource in &config.spec.resources {
        let mut flags = Vec::new();
        if resource.optional {
            flags.push("optional");
        }
        if !resource.enabled {
            flags.push("disabled");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!(
            "  {} (priority {}){}",
            resource.id.bold(),
            resource.priority,
            flags.dimmed()
        );
        if !resource.depends_on.is_empty() {
            println!("    Depends on: {}", resource.depends_on.join(", "));
        }
    }
    println!();

    println!("{}", "AI Services:".bold());
    for service in &config.spec.ai_services {
        let enabled = if service.enabled { "" } else { " [disabled]" };
        println!("  {}{}", service.id.bold(), enabled.dimmed());
        println!("    Fragments: {}", service.vendor_fragments.join(", "));
        println!("    Default model: {}", service.default_model);
    }
    println!();

    let selection = &config.spec.service_selection;
    println!("{}", "Service Selection:".bold());
    println!(
        "  Default service: {}",
        config
            .default_service_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    let mut chains: Vec<_> = selection.fallback_chains.iter().collect();
    chains.sort_by(|a, b| a.0.cmp(b.0));
    for (model, chain) in chains {
        println!("  Fallback {} → {}", model, chain.join(" → "));
    }
    for line in cooldown_lines(&selection.cooldown) {
        println!("  {}", line);
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = CoordinatorConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/coordinator-with-examples.yaml")
    } else {
        include_str!("../../templates/coordinator-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

/// Default window first, then any per-error overrides
fn cooldown_lines(cooldown: &CooldownConfig) -> Vec<String> {
    let mut lines = vec![format!(
        "Cooldown: {}",
        humantime::format_duration(cooldown.default)
    )];
    let overrides = [
        ("rate_limit", cooldown.rate_limit),
        ("api_error", cooldown.api_error),
        ("overloaded", cooldown.overloaded),
    ];
    for (kind, duration) in overrides {
        if let Some(duration) = duration {
            lines.push(format!(
                "Cooldown ({}): {}",
                kind,
                humantime::format_duration(duration)
            ));
        }
    }
    lines
}
