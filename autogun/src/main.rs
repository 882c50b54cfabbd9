mod config;
mod telemetry;

use clap::{Args, Parser};
use config::{Config, ConfigError, LoggingConfig};
use std::path::PathBuf;
use std::process;
use telemetry::TelemetryError;

#[derive(Parser)]
#[command(name = "autogun", about = "Files Sentry events as Redmine issues")]
enum CliCommand {
    /// Serve the event webhook and the admin endpoints
    Run(ConfigArgs),
    /// Load and validate the configuration, then exit
    Validate(ConfigArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[arg(long, short = 'c', value_name = "PATH")]
    config_file_path: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Bridge(#[from] bridge::errors::BridgeError),
    #[error("invalid bridge configuration: {0}")]
    Validation(#[from] bridge::config::ValidationError),
}

fn main() {
    let cli = CliCommand::parse();

    let result = match cli {
        CliCommand::Run(args) => run(args),
        CliCommand::Validate(args) => validate(args),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1);
    }
}

fn run(args: ConfigArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config_file_path)?;

    let logging = config.common.logging.unwrap_or_default();
    let _sentry_guard = telemetry::init_logging(&logging)?;

    if let Some(metrics) = &config.common.metrics {
        telemetry::init_metrics(metrics)?;
    }

    tracing::info!(
        projects = config.bridge.projects.len(),
        "Starting autogun"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(bridge::errors::BridgeError::from)?;
    runtime.block_on(bridge::run(config.bridge))?;

    Ok(())
}

fn validate(args: ConfigArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config_file_path)?;
    telemetry::init_logging(&LoggingConfig::default())?;

    config.bridge.validate()?;
    println!(
        "Configuration is valid ({} projects)",
        config.bridge.projects.len()
    );
    Ok(())
}
