//! Capability Registry
//!
//! Holds the app modules hosted by the engine, keyed by manifest name and
//! kept in registration order. The orchestrator reads manifests and state
//! snapshots from here to build its reasoning context, and dispatches
//! approved actions through it.
//!
//! A module's optional hooks are recorded from `AppModule::capabilities` when
//! it registers; routing decisions use that record, not the module.

use sdk::{AppManifest, AppModule, EngineError, ModuleCapabilities, Params};
use serde_json::{Map, Value};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

struct RegisteredApp {
    module: Arc<dyn AppModule>,
    manifest: AppManifest,
    capabilities: ModuleCapabilities,
}

/// Registry of app modules available to the orchestrator
#[derive(Default)]
pub struct Registry {
    apps: RwLock<Vec<RegisteredApp>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an app module
    ///
    /// Fails with `Validation` if the manifest has no name and with
    /// `DuplicateModule` if the name is already taken.
    pub fn register(&self, module: Arc<dyn AppModule>) -> Result<(), EngineError> {
        let manifest = module.manifest().clone();
        if manifest.name.trim().is_empty() {
            return Err(EngineError::Validation(
                "app must have a manifest with a name".to_string(),
            ));
        }

        let mut apps = self.apps.write().unwrap_or_else(PoisonError::into_inner);
        if apps.iter().any(|a| a.manifest.name == manifest.name) {
            return Err(EngineError::DuplicateModule(manifest.name));
        }

        let capabilities = module.capabilities();
        info!(
            app = %manifest.name,
            capabilities = ?manifest.capabilities,
            actions = ?manifest.actions,
            "Registering app"
        );

        apps.push(RegisteredApp {
            module,
            manifest,
            capabilities,
        });
        Ok(())
    }

    /// Get a specific app
    pub fn get(&self, name: &str) -> Option<Arc<dyn AppModule>> {
        self.read()
            .iter()
            .find(|a| a.manifest.name == name)
            .map(|a| Arc::clone(&a.module))
    }

    /// Names of all registered apps, in registration order
    pub fn names(&self) -> Vec<String> {
        self.read().iter().map(|a| a.manifest.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// All manifests, in registration order
    pub fn all_manifests(&self) -> Vec<AppManifest> {
        self.read().iter().map(|a| a.manifest.clone()).collect()
    }

    /// Apps whose manifest advertises the capability tag
    pub fn find_by_capability(&self, capability: &str) -> Vec<Arc<dyn AppModule>> {
        self.read()
            .iter()
            .filter(|a| a.manifest.has_capability(capability))
            .map(|a| Arc::clone(&a.module))
            .collect()
    }

    /// Apps whose manifest advertises the action tag
    pub fn find_by_action(&self, action: &str) -> Vec<Arc<dyn AppModule>> {
        self.read()
            .iter()
            .filter(|a| a.manifest.has_action(action))
            .map(|a| Arc::clone(&a.module))
            .collect()
    }

    /// State snapshot of every app that exposes one
    ///
    /// Apps registered without `has_state` are omitted, as are apps whose
    /// `state()` returns `None`.
    pub fn all_state(&self) -> Map<String, Value> {
        let mut state = Map::new();
        for app in self.read().iter().filter(|a| a.capabilities.has_state) {
            if let Some(snapshot) = app.module.state() {
                state.insert(app.manifest.name.clone(), snapshot);
            }
        }
        state
    }

    /// Run `init()` on every app registered with `has_init`
    ///
    /// Failures are logged and skipped. Returns the number of apps that
    /// initialized successfully.
    pub fn init_all(&self) -> usize {
        let targets: Vec<(String, Arc<dyn AppModule>)> = self
            .read()
            .iter()
            .filter(|a| a.capabilities.has_init)
            .map(|a| (a.manifest.name.clone(), Arc::clone(&a.module)))
            .collect();

        let mut initialized = 0;
        for (name, module) in targets {
            match module.init() {
                Ok(()) => {
                    debug!(app = %name, "App initialized");
                    initialized += 1;
                }
                Err(e) => warn!(app = %name, error = %e, "App failed to initialize"),
            }
        }
        initialized
    }

    /// Dispatch an action to a specific app
    ///
    /// The module's result or error is returned unchanged.
    pub async fn dispatch(
        &self,
        app_name: &str,
        action: &str,
        params: Params,
    ) -> Result<Value, EngineError> {
        let module = {
            let apps = self.read();
            let app = apps
                .iter()
                .find(|a| a.manifest.name == app_name)
                .ok_or_else(|| EngineError::NotFound(app_name.to_string()))?;

            if !app.capabilities.has_dispatch {
                return Err(EngineError::UnsupportedOperation(app_name.to_string()));
            }
            Arc::clone(&app.module)
        };

        debug!(app = %app_name, action, "Dispatching action");
        module.dispatch(action, params).await
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<RegisteredApp>> {
        self.apps.read().unwrap_or_else(PoisonError::into_inner)
    }
}
