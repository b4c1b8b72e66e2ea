// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// AI Service Infrastructure - Health Registry and Catalog Handles
//
// The registry owns per-service health state and model routing. Service
// handles are built from catalog entries by a ServiceFactory.

pub mod configured;
pub mod registry;

pub use configured::{ConfiguredService, ConfiguredServiceFactory};
pub use registry::AIServiceRegistry;
