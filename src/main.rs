//! Binary entry point for noteclass.
//!
//! Loads configuration, initializes logging and metrics, loads the model and
//! serves the prediction API.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Startup failures are reported on stdout/stderr before and without tracing
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use noteclass::config::ServiceConfig;
use noteclass::observability::{self, ObservabilityConfig};
use noteclass::server::{self, AppState};
use noteclass::Error;
use std::path::PathBuf;
use std::process::ExitCode;

/// Stdout message when the model cannot be loaded.
const MODEL_LOAD_FAILED: &str = "Model loading failed at startup.";

/// noteclass - authenticated text classification over HTTP.
#[derive(Parser)]
#[command(name = "noteclass")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(
        short,
        long,
        global = true,
        env = "NOTECLASS_CONFIG_PATH",
        default_value = "config.yaml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand, Clone, Copy, Default)]
enum Commands {
    /// Start the prediction server (default).
    #[default]
    Serve,

    /// Validate configuration and model, then exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match ServiceConfig::load_from_file(&cli.config) {
        Ok(config) => config.with_env_overrides(),
        Err(e) => {
            let message = match e {
                Error::Config(message) => message,
                other => other.to_string(),
            };
            print_startup_error(&message);
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) =
        observability::init(&ObservabilityConfig::from_service_config(&config, cli.verbose))
    {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }
    for warning in &config.warnings {
        tracing::warn!(warning = %warning, "Configuration warning");
    }

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, model_path = %config.model_path.display(), "Model loading failed");
            eprintln!("Model loading failed: {e}");
            print_startup_error(MODEL_LOAD_FAILED);
            return ExitCode::FAILURE;
        },
    };

    match cli.command.unwrap_or_default() {
        Commands::CheckConfig => {
            cmd_check_config(&config);
            ExitCode::SUCCESS
        },
        Commands::Serve => match server::serve(&config, state, server::shutdown_signal()).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "Server failed");
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            },
        },
    }
}

/// Prints a startup error as `{"error": ...}` on stdout.
fn print_startup_error(message: &str) {
    println!("{}", serde_json::json!({ "error": message }));
}

/// Prints a summary of the validated configuration.
fn cmd_check_config(config: &ServiceConfig) {
    let model_path = config.model_path.display().to_string();
    let record_path = config.record_path.display().to_string();
    let summary = serde_json::json!({
        "status": "ok",
        "model_path": model_path,
        "tokens": config.tokens.len(),
        "bind_addr": config.bind_addr(),
        "record_enabled": config.record_enabled,
        "record_path": record_path,
        "max_content_length": config.max_content_length,
        "max_body_bytes": config.max_body_bytes,
        "warnings": config.warnings,
    });
    println!("{summary}");
}
