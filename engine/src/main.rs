// Aware orchestration engine
// Main entry point for the aware binary

use aware_engine::cli::{Cli, Command, KeyedAction, PrefAction};
use aware_engine::config::Config;
use aware_engine::handlers::{
    handle_clear, handle_doctor, handle_emit, handle_export, handle_log, handle_pref_get,
    handle_pref_set, handle_profile_delete, handle_profile_get, handle_profile_set, handle_rate,
    OutputFormat,
};
use aware_engine::telemetry::init_telemetry_with_level;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));

    tracing::debug!(
        "Aware Engine v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    // Handle commands
    match cli.command {
        Command::Emit { topic, payload } => {
            tracing::info!("Emitting event: {}", topic);
            handle_emit(topic, payload, &config, format).await
        }

        Command::Log { limit } => handle_log(limit, &config, format).await,

        Command::Rate {
            id,
            rating,
            feedback,
        } => handle_rate(id, rating, feedback, &config, format).await,

        Command::Profile { action } => match action {
            KeyedAction::Set { key, value } => handle_profile_set(key, value, &config).await,
            KeyedAction::Get { key } => handle_profile_get(key, &config, format).await,
            KeyedAction::Delete { key } => handle_profile_delete(key, &config).await,
        },

        Command::Pref { action } => match action {
            PrefAction::Set { key, value } => handle_pref_set(key, value, &config).await,
            PrefAction::Get { key } => handle_pref_get(key, &config, format).await,
        },

        Command::Export => handle_export(&config).await,

        Command::Clear { yes } => handle_clear(yes, &config).await,

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }
    }
}
