//! Aware Engine Library
//!
//! Event-driven orchestration core: app modules publish events on the bus,
//! the orchestrator filters them, asks an external reasoning service what to
//! do, and proposes actions that only run once the user approves them.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Synchronous pub/sub event bus
pub mod event_bus;

/// Capability registry for app modules
pub mod registry;

/// Durable user context with an in-memory cache
pub mod context_store;

/// External reasoning service abstraction
pub mod reasoning;

/// Reasoning core
pub mod orchestrator;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
