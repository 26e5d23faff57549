//! External reasoning service abstraction
//!
//! The orchestrator's contract with the reasoning service is deliberately
//! narrow: send one prompt string, get one response string back, or fail.
//! Transport and authentication live behind the [`ReasoningService`] trait.

use async_trait::async_trait;

pub mod anthropic;

pub use anthropic::AnthropicReasoner;

/// Result type for reasoning calls
pub type Result<T> = std::result::Result<T, ReasoningError>;

/// Errors that can occur while calling the reasoning service
#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("No API key configured")]
    MissingCredential,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// A service that turns a prompt into free text
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Returns the name of the service (e.g. "anthropic")
    fn name(&self) -> &str;

    /// Send the prompt and return the raw text reply
    ///
    /// Called exactly once per trigger; implementations must not retry.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
