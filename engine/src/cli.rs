//! CLI interface for Aware
//!
//! Command-line interface built with clap's derive API. Every command runs
//! against the local context database; `emit` additionally boots the event
//! bus, registry and orchestrator for one reasoning cycle.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Aware orchestration engine
///
/// Observes app events, reasons about them with an external service and
/// proposes actions. All user context stays on this machine.
#[derive(Parser, Debug)]
#[command(name = "aware")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Emit an event and run the resulting reasoning cycle
    Emit {
        /// Event topic, e.g. calendar_conflict_detected
        topic: String,

        /// Event payload as a JSON object
        #[arg(default_value = "{}")]
        payload: String,
    },

    /// Show the audit log, newest first
    Log {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Rate a recent log entry
    Rate {
        /// Log entry id
        id: i64,

        /// Rating value
        rating: f64,

        /// Optional free-text feedback
        #[arg(short, long)]
        feedback: Option<String>,
    },

    /// Manage the user profile
    Profile {
        #[command(subcommand)]
        action: KeyedAction,
    },

    /// Manage preferences
    Pref {
        #[command(subcommand)]
        action: PrefAction,
    },

    /// Print every stored record as JSON
    Export,

    /// Delete all profile, pattern, preference and log data
    Clear {
        /// Skip the confirmation requirement
        #[arg(long)]
        yes: bool,
    },

    /// Run system diagnostics
    Doctor,
}

/// Profile actions
#[derive(Subcommand, Debug)]
pub enum KeyedAction {
    /// Set a value (parsed as JSON, or stored as a string)
    Set { key: String, value: String },

    /// Show a value
    Get { key: String },

    /// Remove a value
    Delete { key: String },
}

/// Preference actions
#[derive(Subcommand, Debug)]
pub enum PrefAction {
    /// Set a value (parsed as JSON, or stored as a string)
    Set { key: String, value: String },

    /// Show a value
    Get { key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_defaults_to_empty_payload() {
        let cli = Cli::parse_from(["aware", "emit", "todo_task_overdue"]);
        match cli.command {
            Command::Emit { topic, payload } => {
                assert_eq!(topic, "todo_task_overdue");
                assert_eq!(payload, "{}");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["aware", "log", "--limit", "5", "--json"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Command::Log { limit: 5 }));
    }

    #[test]
    fn test_rate_with_feedback() {
        let cli = Cli::parse_from(["aware", "rate", "12", "0.5", "--feedback", "meh"]);
        match cli.command {
            Command::Rate {
                id,
                rating,
                feedback,
            } => {
                assert_eq!(id, 12);
                assert_eq!(rating, 0.5);
                assert_eq!(feedback.as_deref(), Some("meh"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_profile_subcommands() {
        let cli = Cli::parse_from(["aware", "profile", "set", "name", "\"Sam\""]);
        assert!(matches!(
            cli.command,
            Command::Profile {
                action: KeyedAction::Set { .. }
            }
        ));
    }
}
