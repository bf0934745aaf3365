//! rackfit - Hardware resource allocation for server builds
//!
//! Reads a build file, constructs the platform's resource pools and reports
//! whether the build's components physically fit.

mod cli;
mod display;
mod error;
mod plan;
mod report;

use crate::cli::{Cli, Commands};
use crate::display::OutputRenderer;
use crate::error::CliError;
use crate::report::{CommandOutput, Inspection};
use clap::Parser;
use rackfit_config::Config;
use rackfit_errors::Error;
use rackfit_resources::PoolFactory;
use rackfit_types::OutputFormat;
use serde_json::Value;
use std::path::Path;
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments first to check for JSON mode
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("Application error: {}", e);
            if !json_mode {
                eprintln!("Error: {e}");
            }
            process::exit(1);
        }
    }
}

/// Main application logic
///
/// Returns whether the command's outcome was successful.
async fn run(cli: Cli) -> Result<bool, CliError> {
    info!("Starting rackfit v{}", env!("CARGO_PKG_VERSION"));

    // Precedence: defaults < file < environment < CLI flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global);

    let raw = read_build(cli.command.build_path()).await?;
    let output = execute_command(&cli.command, &raw, &config)?;

    let renderer = OutputRenderer::new(config.general.default_output, config.general.color);
    renderer.render(&output)?;

    info!(success = output.is_success(), "Command completed");
    Ok(output.is_success())
}

/// Execute the specified command against a parsed build document
fn execute_command(
    command: &Commands,
    raw: &Value,
    config: &Config,
) -> Result<CommandOutput, CliError> {
    match command {
        Commands::Validate { .. } => Ok(CommandOutput::Validation(
            PoolFactory::validate_configuration(raw),
        )),

        Commands::Inspect { .. } => {
            let build = PoolFactory::parse_configuration(raw)?;
            let registry =
                PoolFactory::create_registry_with_validation(&build, &config.allocation)?;
            Ok(CommandOutput::Inspection(Inspection::of(&registry)))
        }

        Commands::Plan { .. } => {
            let build = PoolFactory::parse_configuration(raw)?;
            let mut registry =
                PoolFactory::create_registry_with_validation(&build, &config.allocation)?;
            Ok(CommandOutput::Plan(plan::plan(&mut registry, &build)))
        }
    }
}

async fn read_build(path: &Path) -> Result<Value, Error> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::io_with_path(&e, path))?;
    Ok(serde_json::from_str(&contents)?)
}

fn init_tracing(json_mode: bool, debug_enabled: bool) {
    let env_filter = |default: &str| {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default))
    };

    if debug_enabled {
        // Debug mode: structured JSON logs to stderr
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter("debug"))
            .init();
    } else if json_mode && std::env::var("RUST_LOG").is_err() {
        // JSON mode: keep the terminal clean for the document
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        // Normal mode: minimal logging to stderr
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter("warn,rackfit=warn"))
            .init();
    }
}

fn apply_cli_config(config: &mut Config, global: &cli::GlobalArgs) {
    // Global CLI flags override everything
    if let Some(color) = &global.color {
        config.general.color = *color;
    }
    if global.json {
        config.general.default_output = OutputFormat::Json;
    }
}
