//! Error types and handling
//!
//! This module provides the error types shared by the Aware engine and the
//! app modules it hosts. All errors implement the `AwareErrorExt` trait which
//! provides user-friendly hints and indicates whether errors are recoverable.
//!
//! # Propagation policy
//!
//! - `Validation`, `NotFound`, `UnsupportedOperation` and `DuplicateModule`
//!   are surfaced synchronously to the caller.
//! - `ActionFailed` comes out of module code and is passed through the
//!   registry unchanged. The orchestrator aggregates it per action.
//! - `Config` stops startup.

use thiserror::Error;

/// Trait for Aware error extensions
///
/// Provides additional context for errors, including a user-friendly hint
/// and recoverability information.
pub trait AwareErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Examples
///
/// ```
/// use sdk::errors::{AwareErrorExt, EngineError};
///
/// let error = EngineError::NotFound("calendar".to_string());
/// assert!(error.is_recoverable());
/// assert_eq!(error.to_string(), "App not found: calendar");
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Caller errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("App not found: {0}")]
    NotFound(String),

    #[error("App {0} doesn't support actions")]
    UnsupportedOperation(String),

    #[error("App already registered: {0}")]
    DuplicateModule(String),

    // Module errors
    #[error("Action failed: {0}")]
    ActionFailed(String),

    // Infrastructure errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AwareErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Validation(_) => "A required field is missing or invalid",
            Self::NotFound(_) => "The requested app is not registered",
            Self::UnsupportedOperation(_) => "This app does not accept actions",
            Self::DuplicateModule(_) => "An app with this name is already registered",
            Self::ActionFailed(_) => "The app could not complete the action",
            Self::Config(_) => "Check your config.toml file for errors",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::DuplicateModule(_) | Self::Config(_))
    }
}
