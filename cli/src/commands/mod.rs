// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the AEGIS coordinator CLI

pub mod config;
pub mod plan;
pub mod services;

pub use self::config::ConfigCommand;
pub use self::plan::PlanArgs;
pub use self::services::ServicesCommand;
