//! Scrivener CLI entry point.
//!
//! This binary is the composition root for the workspace:
//!
//! 1. **Load configuration**: `scrivener.toml` (or `--config`) plus
//!    environment overrides, validated before anything runs.
//! 2. **Wire observability**: `tracing-subscriber` with an env filter, a JSON
//!    or console layer, and an OpenTelemetry OTLP exporter when
//!    `otlp_endpoint` is set.
//! 3. **Construct infrastructure**: the Groq provider, search backends,
//!    scraper, vector store and publisher, injected into the
//!    [`nodes::PipelineExecutor`].
//!
//! Exit code 1 means the run failed or the command could not start.

mod commands;
mod config;
mod telemetry;

use std::process::ExitCode;

use clap::Parser;

use crate::commands::{Cli, Command};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Command::Config => {
            commands::show_config(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(args) => {
            let telemetry = telemetry::init(&config)?;
            let outcome = commands::run(args, config).await;
            if let Err(error) = &outcome {
                tracing::error!(error = %format!("{error:#}"), "run aborted");
            }
            telemetry.shutdown();
            outcome
        }
    }
}
