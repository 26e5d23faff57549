//! App module trait and capability set
//!
//! An app module is a pluggable unit (calendar, weather, todo, ...) that the
//! engine hosts. It describes itself with an [`AppManifest`] and may expose a
//! state snapshot, an action dispatcher and an initialization hook.
//!
//! Which of the optional hooks a module really provides is declared up front
//! through [`ModuleCapabilities`]. The registry records that set once, at
//! registration time, and routes calls based on it.

use crate::errors::EngineError;
use crate::manifest::AppManifest;
use crate::types::Params;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Optional hooks a module implements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleCapabilities {
    pub has_state: bool,
    pub has_dispatch: bool,
    pub has_init: bool,
}

impl ModuleCapabilities {
    /// A module that implements every optional hook
    pub fn all() -> Self {
        Self {
            has_state: true,
            has_dispatch: true,
            has_init: true,
        }
    }

    pub fn with_state(mut self) -> Self {
        self.has_state = true;
        self
    }

    pub fn with_dispatch(mut self) -> Self {
        self.has_dispatch = true;
        self
    }

    pub fn with_init(mut self) -> Self {
        self.has_init = true;
        self
    }
}

/// Trait that all app modules must implement
///
/// Only `manifest` is required. The remaining methods have defaults matching
/// a module that does not implement the hook. A module that overrides one
/// must also declare it in `capabilities`, otherwise the registry never
/// calls it.
#[async_trait]
pub trait AppModule: Send + Sync {
    /// Returns the module's self-description
    fn manifest(&self) -> &AppManifest;

    /// Declares which optional hooks this module implements
    fn capabilities(&self) -> ModuleCapabilities {
        ModuleCapabilities::default()
    }

    /// Current state snapshot, embedded in the reasoning context
    fn state(&self) -> Option<Value> {
        None
    }

    /// Perform a named action
    ///
    /// Errors are passed back to the caller unchanged.
    async fn dispatch(&self, action: &str, params: Params) -> Result<Value, EngineError> {
        let _ = (action, params);
        Err(EngineError::UnsupportedOperation(
            self.manifest().name.clone(),
        ))
    }

    /// Called once after registration
    fn init(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare {
        manifest: AppManifest,
    }

    impl AppModule for Bare {
        fn manifest(&self) -> &AppManifest {
            &self.manifest
        }
    }

    #[tokio::test]
    async fn test_default_hooks() {
        let module = Bare {
            manifest: AppManifest::new("bare", "nothing"),
        };

        assert_eq!(module.capabilities(), ModuleCapabilities::default());
        assert!(module.state().is_none());
        assert!(module.init().is_ok());

        let err = module.dispatch("noop", Params::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedOperation(name) if name == "bare"));
    }

    #[test]
    fn test_capability_builders() {
        let caps = ModuleCapabilities::default().with_state().with_dispatch();
        assert!(caps.has_state);
        assert!(caps.has_dispatch);
        assert!(!caps.has_init);
        assert_eq!(ModuleCapabilities::all().with_init(), ModuleCapabilities::all());
    }
}
