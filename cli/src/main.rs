// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # AEGIS Coordinator CLI
//!
//! The `aegis-coord` binary inspects resource startup plans and AI service
//! health for a coordinator configuration.
//!
//! ## Commands
//!
//! - `aegis-coord plan [--enable ID...] [--json]` - Phased initialization order
//! - `aegis-coord services status|resolve|simulate` - AI service health and routing
//! - `aegis-coord config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use aegis_core::domain::coordinator_config::CoordinatorConfigManifest;

mod commands;

use commands::{ConfigCommand, PlanArgs, ServicesCommand};

/// AEGIS Coordinator - Dependency-ordered startup and AI service routing
#[derive(Parser)]
#[command(name = "aegis-coord")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the config file, then "warn"
    #[arg(long, global = true, env = "AEGIS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (text, json); defaults to the config file, then "text"
    #[arg(long, global = true, env = "AEGIS_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resource initialization plan
    #[command(name = "plan")]
    Plan(PlanArgs),

    /// AI service health and selection
    #[command(name = "services")]
    Services {
        #[command(subcommand)]
        command: ServicesCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (level, format) = resolve_logging(&cli);
    init_logging(&level, &format)?;

    match cli.command {
        Some(Commands::Plan(args)) => commands::plan::execute(args, cli.config).await,
        Some(Commands::Services { command }) => {
            commands::services::handle_command(command, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Flags win over `spec.observability.logging` in the config file
fn resolve_logging(cli: &Cli) -> (String, String) {
    let logging = cli
        .config
        .clone()
        .or_else(CoordinatorConfigManifest::discover_config)
        .and_then(|path| CoordinatorConfigManifest::from_yaml_file(path).ok())
        .and_then(|config| config.spec.observability)
        .and_then(|observability| observability.logging);

    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.as_ref().map(|l| l.level.clone()))
        .unwrap_or_else(|| "warn".to_string());
    let format = cli
        .log_format
        .clone()
        .or_else(|| logging.map(|l| l.format))
        .unwrap_or_else(|| "text".to_string());

    (level, format)
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    match format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init(),
        "text" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .init(),
        other => anyhow::bail!("Unknown log format '{}'. Expected 'text' or 'json'", other),
    }

    Ok(())
}
