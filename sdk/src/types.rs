//! Action request/outcome types shared by the engine and app modules

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named parameters passed to a module action
pub type Params = Map<String, Value>;

/// A single action to be dispatched to an app module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Target app name
    pub app: String,
    /// Action name
    pub action: String,
    #[serde(default)]
    pub params: Params,
}

impl ActionRequest {
    /// Create a new ActionRequest with no parameters
    pub fn new(app: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            action: action.into(),
            params: Params::new(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// Outcome of dispatching one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action: ActionRequest,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn success(action: ActionRequest, result: Value) -> Self {
        Self {
            action,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(action: ActionRequest, error: impl Into<String>) -> Self {
        Self {
            action,
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}
