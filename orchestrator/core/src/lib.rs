// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! AEGIS Coordinator Core
//!
//! Dependency-ordered resource startup and AI service health tracking.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, registry infrastructure and lifecycle use case

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
