//! Tests for waiting strategy selection.

use mediaflow::dispatch::strategy::{WaitingStrategy, select};
use mediaflow::error::MediaflowError;
use mediaflow::registry::{Capabilities, ModelDescriptor, Provider, Registry};

fn with_caps(caps: Capabilities) -> ModelDescriptor {
    let registry = Registry::builtin();
    let mut d = registry.get(Provider::Replicate, "minimax/video-01").unwrap().clone();
    d.capabilities = caps;
    d
}

#[test]
fn supported_preference_is_honored() {
    let registry = Registry::builtin();
    let d = registry.get(Provider::Replicate, "minimax/video-01").unwrap();
    assert_eq!(select(d, None).unwrap(), WaitingStrategy::Webhook);
    assert_eq!(
        select(d, Some(WaitingStrategy::Polling)).unwrap(),
        WaitingStrategy::Polling
    );
}

#[test]
fn unsupported_preference_falls_back_to_default() {
    let registry = Registry::builtin();
    let d = registry.get(Provider::Runway, "gen4_turbo").unwrap();
    assert_eq!(
        select(d, Some(WaitingStrategy::Webhook)).unwrap(),
        WaitingStrategy::Polling
    );
}

#[test]
fn unsupported_default_falls_back_to_other_channel() {
    let d = with_caps(Capabilities {
        supports_webhook: false,
        supports_polling: true,
        default_strategy: WaitingStrategy::Webhook,
        reports_intermediate: true,
    });
    assert_eq!(select(&d, None).unwrap(), WaitingStrategy::Polling);
}

#[test]
fn no_channel_is_unsupported_strategy() {
    let d = with_caps(Capabilities {
        supports_webhook: false,
        supports_polling: false,
        default_strategy: WaitingStrategy::Polling,
        reports_intermediate: true,
    });
    for preference in [None, Some(WaitingStrategy::Webhook), Some(WaitingStrategy::Polling)] {
        let err = select(&d, preference).unwrap_err();
        assert!(matches!(err, MediaflowError::UnsupportedStrategy { .. }));
        assert!(err.is_caller_error());
    }
}

#[test]
fn strategy_serializes_lowercase() {
    assert_eq!(
        serde_json::to_value(WaitingStrategy::Webhook).unwrap(),
        serde_json::json!("webhook")
    );
    let parsed: WaitingStrategy = serde_json::from_str("\"polling\"").unwrap();
    assert_eq!(parsed, WaitingStrategy::Polling);
}
