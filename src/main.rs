//! Circulation plugin runner
//!
//! Entry point for cron (`run`) and for administrators inspecting or editing
//! plugin settings from the command line.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use circulation_plugins::{
    config::{AppConfig, LoggingConfig},
    services::plugin_settings::SubmittedValues,
    AppError, AppResult, AppState,
};

#[derive(Parser, Debug)]
#[command(name = "circulation-plugins", version, about = "Run and configure circulation plugins")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run due plugins (all of them, or a single one)
    Run {
        /// Only run this plugin
        #[arg(long)]
        plugin: Option<String>,
        /// Ignore run frequencies and a live lease holder
        #[arg(long)]
        force: bool,
    },
    /// List the plugins found in the manifest
    Plugins,
    /// Show the settings of a plugin for a library
    Fields {
        #[arg(long)]
        library: String,
        #[arg(long)]
        plugin: String,
    },
    /// Replace the settings of a plugin for a library with a JSON object
    SaveFields {
        #[arg(long)]
        library: String,
        #[arg(long)]
        plugin: String,
        /// e.g. '{"url": "https://example.org", "token": null}'
        #[arg(long)]
        values: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging);
    tracing::debug!("Starting circulation-plugins v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::connect(config)
        .await
        .context("Failed to initialize application state")?;

    if let Err(e) = execute(&state, args.command).await {
        let body = e.to_response();
        eprintln!("{}", serde_json::to_string(&body)?);
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("circulation_plugins={}", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn execute(state: &AppState, command: Command) -> AppResult<()> {
    let services = &state.services;

    match command {
        Command::Run { plugin, force } => {
            let scheduler = services.scheduler(std::process::id(), plugin, force);
            let report = scheduler.run().await?;
            if let Some(e) = report.error() {
                tracing::warn!("{} plugin(s) failed during this pass", report.failures());
                return Err(e);
            }
        }
        Command::Plugins => {
            for (name, plugin) in services.plugins.iter() {
                let frequency = plugin
                    .frequency()
                    .unwrap_or(state.config.scheduler.default_frequency_hours);
                println!("{}\tevery {}h", name, frequency);
            }
        }
        Command::Fields { library, plugin } => {
            let handle = services.plugin(&plugin)?;
            let fields = services
                .plugin_settings
                .get_plugin_fields(&library, &plugin, &**handle)
                .await?;
            println!("{}", to_json(&serde_json::json!({ "fields": fields }))?);
        }
        Command::SaveFields {
            library,
            plugin,
            values,
        } => {
            let values: SubmittedValues = serde_json::from_str(&values)
                .map_err(|e| AppError::Validation(format!("Invalid values: {}", e)))?;
            let handle = services.plugin(&plugin)?;
            let changes = services
                .plugin_settings
                .save_plugin_fields(&library, &plugin, &**handle, &values)
                .await?;
            tracing::info!(
                "Saved {} settings for {}: {} insert(s), {} update(s), {} delete(s)",
                plugin,
                library,
                changes.inserts.len(),
                changes.updates.len(),
                changes.deletes.len()
            );
        }
    }

    Ok(())
}

fn to_json(value: &serde_json::Value) -> AppResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| AppError::Internal(e.to_string()))
}
