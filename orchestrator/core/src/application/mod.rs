// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod resource_lifecycle;

// Re-export use cases for convenience
pub use resource_lifecycle::{
    ResourceInitializer, ResourceLifecycleUseCase, ShutdownReport, StandardResourceLifecycleService,
    StartupReport,
};
