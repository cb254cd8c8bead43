use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use xmltooling::{CheckOptions, Cli, ConfigManager, FileDiscovery, Output, RoundTripChecker, XmlObjectProviderRegistry};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Ok(false) when at least one document failed to round-trip
async fn run() -> Result<bool> {
    let cli = Cli::parse_args();
    cli.validate().map_err(anyhow::Error::msg)?;

    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.output.verbosity().log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    debug!(?config, "Loaded configuration");

    let registry = Arc::new(XmlObjectProviderRegistry::with_defaults());
    let discovery = FileDiscovery::from_config(&config.files)?;
    let checker = RoundTripChecker::new(registry, CheckOptions::from_config(&config));

    let results = checker
        .check_path(&cli.path, &discovery)
        .await
        .with_context(|| format!("Failed to check {}", cli.path.display()))?;

    let output = Output::new(config.output.verbosity(), config.output.format);
    print!("{}", output.format_results(&results)?);

    Ok(!results.has_failures())
}
