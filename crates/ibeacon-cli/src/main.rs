//! iBeacon shell entry point

use clap::Parser;
use tracing::{error, info};

use ibeacon_cli::{cli::Cli, commands::CommandDispatcher, config::ShellConfig, error::Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    setup_logging(cli.verbose);

    // Load configuration
    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    // Execute the command
    if let Err(e) = CommandDispatcher::execute(&cli, config).await {
        error!("{}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or the standard locations
fn load_configuration(cli: &Cli) -> Result<ShellConfig> {
    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from: {}", config_path);
            ShellConfig::load_from_file(config_path)?
        }
        None => ShellConfig::load()?,
    };
    Ok(config)
}
