//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - emit: boot the engine, emit one event and wait for its cycle
//! - log / rate: inspect and rate the audit log
//! - profile / pref: manage keyed user context
//! - export / clear: user data ownership
//! - doctor: validate configuration and storage

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::Config;
use crate::context_store::{ContextBackend, ContextStore, SqliteBackend};
use crate::event_bus::EventBus;
use crate::orchestrator::{CycleOutcome, Orchestrator, SUGGESTION_TOPIC};
use crate::reasoning::{AnthropicReasoner, ReasoningService};
use crate::registry::Registry;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Parse a CLI value as JSON, falling back to a plain string
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Open the context database named by the config and load the cache
pub async fn open_store(config: &Config) -> Result<Arc<ContextStore>> {
    let backend = SqliteBackend::open(&config.db_path())
        .await
        .context("Failed to open context database")?;
    let store = ContextStore::new(Arc::new(backend))
        .with_rating_lookback(config.orchestrator.rating_lookback);
    store.init().await;
    Ok(Arc::new(store))
}

/// Emit one event and report how its reasoning cycle ended
///
/// The binary hosts no app modules, so the prompt's app state and
/// capabilities sections are empty. Embedders register modules on their own
/// `Registry` before starting the orchestrator.
pub async fn handle_emit(
    topic: String,
    payload: String,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let payload: Value = serde_json::from_str(&payload).context("Payload is not valid JSON")?;
    if !payload.is_object() {
        bail!("Payload must be a JSON object");
    }

    let bus = Arc::new(EventBus::new());
    let registry = Arc::new(Registry::new());
    let store = open_store(config).await?;

    let reasoner = AnthropicReasoner::from_env(&config.reasoning)
        .context("Failed to set up reasoning service")?
        .map(|r| Arc::new(r) as Arc<dyn ReasoningService>);

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&bus),
        registry,
        store,
        reasoner,
        config.orchestrator.clone(),
    ));
    orchestrator.init().await;

    let suggestions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&suggestions);
    bus.on(SUGGESTION_TOPIC, move |payload| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.clone());
    });

    bus.emit(&topic, payload);
    let outcomes = orchestrator.wait_idle().await;
    orchestrator.shutdown();

    // Audit-only cycles for our own suggestion events always end Ignored.
    let outcome = outcomes
        .iter()
        .find(|o| !matches!(o, CycleOutcome::Ignored))
        .map(CycleOutcome::label)
        .unwrap_or(CycleOutcome::Ignored.label());
    let suggestions = std::mem::take(&mut *suggestions.lock().unwrap_or_else(PoisonError::into_inner));

    match format {
        OutputFormat::Text => {
            println!("Event: {}", topic);
            println!("Outcome: {}", outcome);
            if orchestrator.is_observe_only() {
                println!(
                    "(observe-only: set {} to enable reasoning)",
                    config.reasoning.api_key_env
                );
            }
            for suggestion in &suggestions {
                println!();
                println!(
                    "Suggestion {} [{}]",
                    suggestion["id"].as_str().unwrap_or("?"),
                    suggestion["priority"].as_str().unwrap_or("medium")
                );
                println!("  {}", suggestion["message"].as_str().unwrap_or(""));
                if let Some(actions) = suggestion["actions"].as_array() {
                    for action in actions {
                        println!(
                            "  - {}.{} {}",
                            action["app"].as_str().unwrap_or("?"),
                            action["action"].as_str().unwrap_or("?"),
                            action["params"]
                        );
                    }
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "event": topic,
                "outcome": outcome,
                "observeOnly": orchestrator.is_observe_only(),
                "suggestions": suggestions,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Show the most recent log entries
pub async fn handle_log(limit: usize, config: &Config, format: OutputFormat) -> Result<()> {
    let store = open_store(config).await?;
    let entries = store.get_log(limit).await.context("Failed to fetch log")?;

    match format {
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("Log is empty");
                return Ok(());
            }

            for entry in &entries {
                let at = chrono::DateTime::from_timestamp_millis(entry.timestamp)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "Unknown".to_string());
                print!("#{:<6} {}  {:<22}", entry.id, at, entry.kind.as_str());
                if let Some(rating) = entry.rating {
                    print!("  rated {}", rating);
                }
                println!();
                println!("        {}", entry.payload);
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "entries": entries,
                "count": entries.len(),
                "limit": limit
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Rate a log entry within the lookback window
pub async fn handle_rate(
    id: i64,
    rating: f64,
    feedback: Option<String>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let store = open_store(config).await?;
    let rated = store.rate_action(id, rating, feedback.as_deref()).await?;

    match format {
        OutputFormat::Text => {
            if rated {
                println!("Rated entry #{}", id);
            } else {
                println!(
                    "Entry #{} is not among the {} most recent entries; nothing changed",
                    id, config.orchestrator.rating_lookback
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", json!({ "id": id, "rated": rated }));
        }
    }
    Ok(())
}

fn print_keyed(key: &str, value: Option<Value>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => match value {
            Some(value) => println!("{} = {}", key, value),
            None => println!("{} is not set", key),
        },
        OutputFormat::Json => {
            println!("{}", json!({ "key": key, "value": value }));
        }
    }
    Ok(())
}

pub async fn handle_profile_set(key: String, value: String, config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    store.set_profile(&key, parse_value(&value)).await?;
    println!("Profile {} updated", key);
    Ok(())
}

pub async fn handle_profile_get(key: String, config: &Config, format: OutputFormat) -> Result<()> {
    let store = open_store(config).await?;
    print_keyed(&key, store.get_profile(&key).await, format)
}

pub async fn handle_profile_delete(key: String, config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    store.delete_profile(&key).await?;
    println!("Profile {} deleted", key);
    Ok(())
}

pub async fn handle_pref_set(key: String, value: String, config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    store.set_preference(&key, parse_value(&value)).await?;
    println!("Preference {} updated", key);
    Ok(())
}

pub async fn handle_pref_get(key: String, config: &Config, format: OutputFormat) -> Result<()> {
    let store = open_store(config).await?;
    print_keyed(&key, store.get_preference(&key).await, format)
}

/// Print the full export; always JSON
pub async fn handle_export(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    println!("{}", store.export_json().await?);
    Ok(())
}

/// Wipe all four tables
pub async fn handle_clear(yes: bool, config: &Config) -> Result<()> {
    if !yes {
        bail!("Refusing to delete all context data without --yes");
    }
    let store = open_store(config).await?;
    store.clear_all().await?;
    println!("All context data cleared");
    Ok(())
}

/// Validate configuration, storage and credential availability
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks = Vec::new();

    // Config is already validated when loaded
    checks.push(("Configuration", "Valid".to_string()));

    if config.core.data_dir.is_dir() {
        checks.push(("Data directory", "Exists".to_string()));
    } else {
        checks.push(("Data directory", "Missing".to_string()));
        issues.push(format!(
            "Data directory does not exist: {:?}",
            config.core.data_dir
        ));
    }

    let db_path = config.db_path();
    match SqliteBackend::open(&db_path).await {
        Ok(backend) => match backend.ensure_schema().await {
            Ok(()) => {
                checks.push(("Database", "OK".to_string()));
                match backend.recent_log(1).await {
                    Ok(_) => checks.push(("Log table", "Readable".to_string())),
                    Err(e) => {
                        checks.push(("Log table", "Unreadable".to_string()));
                        issues.push(format!("Cannot read log: {}", e));
                    }
                }
                backend.close().await.ok();
            }
            Err(e) => {
                checks.push(("Database", "Schema error".to_string()));
                issues.push(format!("Cannot prepare schema: {}", e));
            }
        },
        Err(e) => {
            checks.push(("Database", "Failed".to_string()));
            issues.push(format!("Cannot open database {:?}: {}", db_path, e));
        }
    }

    if config.reasoning.api_key().is_some() {
        checks.push(("Reasoning credential", "Configured".to_string()));
    } else {
        checks.push((
            "Reasoning credential",
            format!("Not configured ({} unset, observe-only)", config.reasoning.api_key_env),
        ));
    }
    checks.push(("Reasoning model", config.reasoning.model.clone()));

    match format {
        OutputFormat::Text => {
            println!("Aware System Diagnostics");
            println!("========================");
            println!();

            println!("System Checks:");
            for (check, status) in &checks {
                println!("  {:<25} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({
                        "name": name,
                        "status": status
                    })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
