//! Integration tests for the capability registry

use async_trait::async_trait;
use aware_engine::registry::Registry;
use sdk::{AppManifest, AppModule, EngineError, ModuleCapabilities, Params};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Calendar-like module implementing every hook
struct Calendar {
    manifest: AppManifest,
    inits: AtomicUsize,
}

impl Calendar {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            manifest: AppManifest::new("calendar", "time")
                .with_capabilities(["read_events", "schedule"])
                .with_actions(["get_events", "create_event"])
                .with_events(["calendar_event_created"]),
            inits: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AppModule for Calendar {
    fn manifest(&self) -> &AppManifest {
        &self.manifest
    }

    fn capabilities(&self) -> ModuleCapabilities {
        ModuleCapabilities::all()
    }

    fn state(&self) -> Option<Value> {
        Some(json!({"events_today": 2}))
    }

    async fn dispatch(&self, action: &str, params: Params) -> Result<Value, EngineError> {
        match action {
            "get_events" => {
                // Suspends before answering
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(json!({"events": [], "params": params}))
            }
            other => Err(EngineError::ActionFailed(format!("unknown action {}", other))),
        }
    }

    fn init(&self) -> Result<(), EngineError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Module with a manifest and nothing else
struct Passive(AppManifest);

#[async_trait]
impl AppModule for Passive {
    fn manifest(&self) -> &AppManifest {
        &self.0
    }
}

/// Module whose init always fails
struct Broken(AppManifest);

#[async_trait]
impl AppModule for Broken {
    fn manifest(&self) -> &AppManifest {
        &self.0
    }

    fn capabilities(&self) -> ModuleCapabilities {
        ModuleCapabilities::default().with_init()
    }

    fn init(&self) -> Result<(), EngineError> {
        Err(EngineError::ActionFailed("no device".into()))
    }
}

fn passive(name: &str, domain: &str) -> Arc<dyn AppModule> {
    Arc::new(Passive(AppManifest::new(name, domain)))
}

#[test]
fn test_register_then_get_returns_same_instance() {
    let registry = Registry::new();
    let calendar = Calendar::new();
    let as_module: Arc<dyn AppModule> = calendar.clone();

    registry.register(as_module.clone()).unwrap();

    let fetched = registry.get("calendar").unwrap();
    assert!(Arc::ptr_eq(&fetched, &as_module));
    assert!(registry.get("weather").is_none());
}

#[test]
fn test_manifests_in_registration_order() {
    let registry = Registry::new();
    registry.register(passive("weather", "environment")).unwrap();
    registry.register(Calendar::new()).unwrap();
    registry.register(passive("todo", "tasks")).unwrap();

    let names: Vec<String> = registry
        .all_manifests()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(names, vec!["weather", "calendar", "todo"]);
    assert_eq!(registry.names(), names);
}

#[test]
fn test_duplicate_name_is_rejected_and_original_kept() {
    let registry = Registry::new();
    let calendar: Arc<dyn AppModule> = Calendar::new();
    registry.register(calendar.clone()).unwrap();

    let err = registry.register(passive("calendar", "other")).unwrap_err();
    assert!(matches!(err, EngineError::DuplicateModule(name) if name == "calendar"));

    assert_eq!(registry.len(), 1);
    assert!(Arc::ptr_eq(&registry.get("calendar").unwrap(), &calendar));
}

#[test]
fn test_empty_name_is_a_validation_error() {
    let registry = Registry::new();
    let err = registry.register(passive("", "nowhere")).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(registry.is_empty());
}

#[test]
fn test_find_by_capability_and_action() {
    let registry = Registry::new();
    registry.register(Calendar::new()).unwrap();
    registry
        .register(Arc::new(Passive(
            AppManifest::new("planner", "time").with_capabilities(["schedule"]),
        )))
        .unwrap();

    let schedulers: Vec<String> = registry
        .find_by_capability("schedule")
        .iter()
        .map(|m| m.manifest().name.clone())
        .collect();
    assert_eq!(schedulers, vec!["calendar", "planner"]);

    assert_eq!(registry.find_by_action("create_event").len(), 1);
    assert!(registry.find_by_action("send_email").is_empty());
}

#[test]
fn test_all_state_only_includes_stateful_apps() {
    let registry = Registry::new();
    registry.register(Calendar::new()).unwrap();
    registry.register(passive("weather", "environment")).unwrap();

    let state = registry.all_state();
    assert_eq!(state.len(), 1);
    assert_eq!(state["calendar"], json!({"events_today": 2}));
}

#[tokio::test]
async fn test_dispatch_errors() {
    let registry = Registry::new();
    registry.register(passive("weather", "environment")).unwrap();

    let err = registry
        .dispatch("ghost", "anything", Params::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(name) if name == "ghost"));

    let err = registry
        .dispatch("weather", "forecast", Params::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedOperation(name) if name == "weather"));
}

#[tokio::test]
async fn test_dispatch_awaits_and_passes_results_through() {
    let registry = Registry::new();
    registry.register(Calendar::new()).unwrap();

    let mut params = Params::new();
    params.insert("day".into(), json!("monday"));
    let result = registry
        .dispatch("calendar", "get_events", params)
        .await
        .unwrap();
    assert_eq!(result, json!({"events": [], "params": {"day": "monday"}}));

    let err = registry
        .dispatch("calendar", "teleport", Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Action failed: unknown action teleport");
}

#[test]
fn test_init_all_skips_failures() {
    let registry = Registry::new();
    let calendar = Calendar::new();
    registry.register(calendar.clone()).unwrap();
    registry
        .register(Arc::new(Broken(AppManifest::new("sensor", "hardware"))))
        .unwrap();
    registry.register(passive("weather", "environment")).unwrap();

    assert_eq!(registry.init_all(), 1);
    assert_eq!(calendar.inits.load(Ordering::SeqCst), 1);
}
