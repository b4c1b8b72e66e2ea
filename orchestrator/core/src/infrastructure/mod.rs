// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod ai_service;

pub use ai_service::{AIServiceRegistry, ConfiguredServiceFactory};
