// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Resource dependency graph, AI service health model, configuration schema
//! and domain events.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and planning logic; no I/O beyond config files

pub mod resource;
pub mod dependency_resolver;
pub mod ai_service;
pub mod coordinator_config;
pub mod events;
