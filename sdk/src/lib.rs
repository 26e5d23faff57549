//! Aware SDK
//!
//! Shared library providing the app module contract for the Aware engine.
//! This crate is used by both the engine and the app modules it hosts.

/// App module trait and capability set
pub mod app_module;

/// Error types and handling
pub mod errors;

/// Action request/outcome types
pub mod types;

/// Manifest types
pub mod manifest;

// Re-export commonly used types
pub use app_module::{AppModule, ModuleCapabilities};
pub use errors::{AwareErrorExt, EngineError};
pub use manifest::AppManifest;
pub use types::{ActionOutcome, ActionRequest, Params};
