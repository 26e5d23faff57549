use proptest::prelude::*;
use sdk::errors::{AwareErrorExt, EngineError};
use sdk::{ActionRequest, AppManifest};

// User hints are static text: never empty and never echoing error details.
proptest! {
    #[test]
    fn test_error_user_hint_completeness(detail in "[a-z0-9/_.]{12,40}") {
        let errs = vec![
            EngineError::Validation(detail.clone()),
            EngineError::NotFound(detail.clone()),
            EngineError::UnsupportedOperation(detail.clone()),
            EngineError::DuplicateModule(detail.clone()),
            EngineError::ActionFailed(detail.clone()),
            EngineError::Config(detail.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(detail.as_str()));
            prop_assert!(err.to_string().contains(detail.as_str()));
        }
    }
}

// Manifests survive JSON and keep tag lookups intact.
proptest! {
    #[test]
    fn test_manifest_roundtrip(
        name in "[a-z][a-z0-9_]{0,15}",
        domain in "[a-z]{1,10}",
        capabilities in prop::collection::vec("[a-z_]{1,12}", 0..5),
        actions in prop::collection::vec("[a-z_]{1,12}", 0..5),
    ) {
        let manifest = AppManifest::new(name, domain)
            .with_capabilities(capabilities.clone())
            .with_actions(actions.clone());

        let parsed = AppManifest::from_json(&manifest.to_json().unwrap()).unwrap();
        prop_assert_eq!(&parsed, &manifest);

        for capability in &capabilities {
            prop_assert!(parsed.has_capability(capability));
        }
        for action in &actions {
            prop_assert!(parsed.has_action(action));
        }
    }

    #[test]
    fn test_action_request_params_default_to_empty(
        app in "[a-z]{1,10}",
        action in "[a-z_]{1,10}",
    ) {
        let raw = format!("{{\"app\":\"{}\",\"action\":\"{}\"}}", app, action);
        let request: ActionRequest = serde_json::from_str(&raw).unwrap();
        prop_assert_eq!(request, ActionRequest::new(app, action));
    }
}
