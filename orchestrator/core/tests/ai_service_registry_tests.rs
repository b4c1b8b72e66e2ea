// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the AI service health registry.
//!
//! Timing tests run on a paused tokio clock: sleeping auto-advances virtual
//! time, which fires the scheduled cooldown resets deterministically.

use aegis_core::domain::ai_service::{AIServiceError, AIServiceErrorType, ServiceId, ServiceState};
use aegis_core::domain::coordinator_config::CoordinatorConfigManifest;
use aegis_core::domain::events::ServiceHealthEvent;
use aegis_core::infrastructure::ai_service::{AIServiceRegistry, ConfiguredServiceFactory};
use aegis_core::infrastructure::event_bus::{DomainEvent, EventBus};
use chrono::Utc;
use std::time::Duration;

const CONFIG: &str = r#"
apiVersion: 100monkeys.ai/v1
kind: CoordinatorConfig
metadata:
  name: registry-test
spec:
  ai_services:
    - id: openai
      vendor_fragments: [gpt, o1]
      default_model: gpt-4o-mini
      models: [gpt-4o, gpt-4o-mini]
    - id: anthropic
      vendor_fragments: [claude]
      default_model: claude-3-5-sonnet
      models: [claude-3-5-sonnet]
    - id: mistral
      enabled: false
      vendor_fragments: [mistral]
      default_model: mistral-large
  service_selection:
    default_service: openai
    fallback_chains:
      gpt-4o: [claude-3-5-sonnet]
    cooldown:
      default: 15m
      overloaded: 30s
"#;

const COOLDOWN: Duration = Duration::from_secs(15 * 60);

fn registry() -> AIServiceRegistry {
    let config = CoordinatorConfigManifest::from_yaml_str(CONFIG).unwrap();
    AIServiceRegistry::from_config(&config, &ConfiguredServiceFactory).unwrap()
}

fn openai() -> ServiceId {
    ServiceId::new("openai")
}

fn anthropic() -> ServiceId {
    ServiceId::new("anthropic")
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_enters_cooldown_and_recovers() {
    let registry = registry();
    let before = Utc::now();

    let state = registry.update_service_state("openai", AIServiceErrorType::RateLimit);
    assert_eq!(state, ServiceState::Cooldown);
    assert_eq!(registry.get_service_state(&openai()), ServiceState::Cooldown);

    let snapshot = registry.snapshot();
    let entry = snapshot.iter().find(|s| s.service_id == openai()).unwrap();
    assert!(entry.cooldown_until.unwrap() > before);

    tokio::time::sleep(COOLDOWN + Duration::from_secs(1)).await;

    assert_eq!(registry.get_service_state(&openai()), ServiceState::Active);
    let snapshot = registry.snapshot();
    let entry = snapshot.iter().find(|s| s.service_id == openai()).unwrap();
    assert!(entry.cooldown_until.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_still_cooling_down_before_deadline() {
    let registry = registry();
    registry.update_service_state("openai", AIServiceErrorType::ApiError);

    tokio::time::sleep(COOLDOWN - Duration::from_secs(1)).await;

    assert_eq!(registry.get_service_state(&openai()), ServiceState::Cooldown);
}

#[tokio::test(start_paused = true)]
async fn test_per_kind_cooldown_override() {
    let registry = registry();
    registry.update_service_state("openai", AIServiceErrorType::Overloaded);

    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(registry.get_service_state(&openai()), ServiceState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_authentication_is_terminal() {
    let registry = registry();

    assert_eq!(
        registry.update_service_state("openai", AIServiceErrorType::Authentication),
        ServiceState::Disabled
    );
    assert_eq!(
        registry.update_service_state("openai", AIServiceErrorType::RateLimit),
        ServiceState::Disabled
    );

    tokio::time::sleep(COOLDOWN * 2).await;
    assert_eq!(registry.get_service_state(&openai()), ServiceState::Disabled);
}

#[tokio::test(start_paused = true)]
async fn test_pending_reset_does_not_revive_disabled_service() {
    let registry = registry();

    registry.update_service_state("openai", AIServiceErrorType::RateLimit);
    registry.update_service_state("openai", AIServiceErrorType::Authentication);

    tokio::time::sleep(COOLDOWN + Duration::from_secs(1)).await;

    assert_eq!(registry.get_service_state(&openai()), ServiceState::Disabled);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_cooldown_restarts_window() {
    let registry = registry();

    registry.update_service_state("openai", AIServiceErrorType::RateLimit);
    tokio::time::sleep(Duration::from_secs(10 * 60)).await;
    registry.update_service_state("openai", AIServiceErrorType::RateLimit);

    // First window would have ended here
    tokio::time::sleep(Duration::from_secs(6 * 60)).await;
    assert_eq!(registry.get_service_state(&openai()), ServiceState::Cooldown);

    tokio::time::sleep(Duration::from_secs(10 * 60)).await;
    assert_eq!(registry.get_service_state(&openai()), ServiceState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_reregistration_invalidates_pending_reset() {
    let registry = registry();

    registry.update_service_state("openai", AIServiceErrorType::RateLimit);
    tokio::time::sleep(Duration::from_secs(5 * 60)).await;
    registry.register_service("openai", ServiceState::Active);
    tokio::time::sleep(Duration::from_secs(60)).await;
    registry.update_service_state("openai", AIServiceErrorType::RateLimit);

    // Past the first deadline, inside the second window
    tokio::time::sleep(Duration::from_secs(10 * 60)).await;
    assert_eq!(registry.get_service_state(&openai()), ServiceState::Cooldown);
}

#[test]
fn test_invalid_request_leaves_state_unchanged() {
    let registry = registry();
    registry.update_service_state("anthropic", AIServiceErrorType::InvalidRequest);
    assert_eq!(registry.get_service_state(&anthropic()), ServiceState::Active);
}

#[test]
fn test_register_service_reactivates_disabled() {
    let registry = registry();
    registry.update_service_state("openai", AIServiceErrorType::Authentication);
    registry.register_service("openai", ServiceState::Active);
    assert_eq!(registry.get_service_state(&openai()), ServiceState::Active);
}

#[test]
fn test_catalog_disabled_service_starts_disabled() {
    let registry = registry();
    assert_eq!(
        registry.get_service_state(&ServiceId::new("mistral")),
        ServiceState::Disabled
    );
    assert_eq!(registry.active_service_ids(), vec![anthropic(), openai()]);
}

#[tokio::test]
async fn test_fallback_to_alternative_service() {
    let registry = registry();

    assert_eq!(registry.get_best_service(Some("gpt-4o")), Some(openai()));

    registry.update_service_state("openai", AIServiceErrorType::RateLimit);
    assert_eq!(registry.get_best_service(Some("gpt-4o")), Some(anthropic()));
}

#[tokio::test]
async fn test_fallback_ignores_model_case() {
    let registry = registry();
    registry.update_service_state("openai", AIServiceErrorType::RateLimit);

    assert_eq!(registry.get_service_id(Some("GPT-4o")), openai());
    assert_eq!(registry.get_best_service(Some("GPT-4o")), Some(anthropic()));
    assert_eq!(registry.get_best_service(Some("gpt-4O")), Some(anthropic()));
}

#[test]
fn test_fallback_chain_keys_ignore_case() {
    let config = CoordinatorConfigManifest::from_yaml_str(&CONFIG.replace(
        "gpt-4o: [claude-3-5-sonnet]",
        "GPT-4o-Mini: [claude-3-5-sonnet]",
    ))
    .unwrap();
    let registry = AIServiceRegistry::from_config(&config, &ConfiguredServiceFactory).unwrap();
    registry.update_service_state("openai", AIServiceErrorType::ApiError);

    // No hint resolves to openai's default model, gpt-4o-mini
    assert_eq!(registry.get_best_service(None), Some(anthropic()));
}

#[tokio::test]
async fn test_no_fallback_chain_yields_none() {
    let registry = registry();
    registry.update_service_state("openai", AIServiceErrorType::RateLimit);

    // Resolves to gpt-4o-mini, which has no chain
    assert_eq!(registry.get_best_service(Some("o1-preview")), None);
    assert_eq!(registry.get_best_service(None), None);
}

#[tokio::test]
async fn test_exhausted_fallback_chain_yields_none() {
    let registry = registry();
    registry.update_service_state("openai", AIServiceErrorType::Overloaded);
    registry.update_service_state("anthropic", AIServiceErrorType::Authentication);

    assert_eq!(registry.get_best_service(Some("gpt-4o")), None);
}

#[test]
fn test_model_hint_routing() {
    let registry = registry();
    assert_eq!(registry.get_service_id(Some("claude-3-5-sonnet")), anthropic());
    assert_eq!(registry.get_service_id(Some("o1-mini")), openai());
    assert_eq!(registry.get_service_id(Some("llama3")), openai());
    assert_eq!(registry.get_service_id(Some("mistral-large")), ServiceId::new("mistral"));
}

#[tokio::test]
async fn test_get_service_reports_alternatives() {
    let registry = registry();

    let handle = registry.get_service(&anthropic()).unwrap();
    assert_eq!(handle.get_model(None), "claude-3-5-sonnet");

    registry.update_service_state("openai", AIServiceErrorType::RateLimit);
    match registry.get_service(&openai()) {
        Err(AIServiceError::Unavailable {
            state, available, ..
        }) => {
            assert_eq!(state, ServiceState::Cooldown);
            assert_eq!(available, vec![anthropic()]);
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("service in cooldown must not be returned"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unknown_service_is_registered_on_first_error() {
    let registry = registry();
    let groq = ServiceId::new("groq");

    assert_eq!(registry.get_service_state(&groq), ServiceState::Disabled);

    registry.update_service_state("groq", AIServiceErrorType::RateLimit);
    assert!(registry.service_ids().contains(&groq));

    tokio::time::sleep(COOLDOWN + Duration::from_secs(1)).await;
    assert_eq!(registry.get_service_state(&groq), ServiceState::Active);

    // Active but no handle was ever built for it
    assert!(matches!(
        registry.get_service(&groq),
        Err(AIServiceError::NotInstantiated { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_health_events_published() {
    let event_bus = EventBus::new(16);
    let registry = registry().with_event_bus(event_bus.clone());
    let mut receiver = event_bus.subscribe_service(openai());

    registry.update_service_state("anthropic", AIServiceErrorType::RateLimit);
    registry.update_service_state("openai", AIServiceErrorType::RateLimit);

    match receiver.recv().await.unwrap() {
        ServiceHealthEvent::StateChanged {
            previous,
            current,
            error_type,
            cooldown_until,
            ..
        } => {
            assert_eq!(previous, ServiceState::Active);
            assert_eq!(current, ServiceState::Cooldown);
            assert_eq!(error_type, Some(AIServiceErrorType::RateLimit));
            assert!(cooldown_until.is_some());
        }
        other => panic!("unexpected event: {:?}", other),
    }

    tokio::time::sleep(COOLDOWN + Duration::from_secs(1)).await;

    assert!(matches!(
        receiver.recv().await.unwrap(),
        ServiceHealthEvent::CooldownExpired { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_repeated_disable_is_silent() {
    let event_bus = EventBus::new(16);
    let registry = registry().with_event_bus(event_bus.clone());
    let mut receiver = event_bus.subscribe();

    assert_eq!(
        registry.update_service_state("openai", AIServiceErrorType::Authentication),
        ServiceState::Disabled
    );
    assert_eq!(
        registry.update_service_state("openai", AIServiceErrorType::Authentication),
        ServiceState::Disabled
    );

    assert!(matches!(
        receiver.try_recv(),
        Ok(DomainEvent::ServiceHealth(ServiceHealthEvent::StateChanged {
            previous: ServiceState::Active,
            current: ServiceState::Disabled,
            ..
        }))
    ));
    assert!(receiver.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_restarted_cooldown_cancels_pending_reset() {
    let registry = registry();
    let metrics = tokio::runtime::Handle::current().metrics();
    let baseline = metrics.num_alive_tasks();

    for _ in 0..5 {
        registry.update_service_state("openai", AIServiceErrorType::RateLimit);
    }
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }

    // Only the latest window keeps a timer
    assert!(metrics.num_alive_tasks() <= baseline + 1);

    tokio::time::sleep(COOLDOWN + Duration::from_secs(1)).await;
    assert_eq!(registry.get_service_state(&openai()), ServiceState::Active);
}
