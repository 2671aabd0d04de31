//! TBA Refresher - entry point
//!
//! Loads configuration, sets up logging, then runs either the refresh loop or
//! the search probe until it finishes or a shutdown signal arrives.

use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use tba_refresher::cli::{CliOptions, Command};
use tba_refresher::config::{Config, EnvOverrides};
use tba_refresher::jobs::{self, search_probe};
use tba_refresher::services::{PlexConnector, RefreshContext, init_logging};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let options = CliOptions::from_args();

    let config_path = Config::resolve_path(options.config_path.as_deref());
    let (mut config, warnings) = match Config::load(&config_path, &EnvOverrides::from_env()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if options.force_dry_run {
        config.refresh.dry_run = true;
    }

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Configuration Error: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(config = %config_path.display(), "Starting Plex Metadata Refresher");
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    let config = Arc::new(config);
    let connector = Arc::new(PlexConnector::new(&config.plex));
    let ctx = RefreshContext::new(config, connector);

    let shutdown = CancellationToken::new();
    tokio::spawn(jobs::shutdown_signal(shutdown.clone()));

    let result = match options.command {
        Command::Run => jobs::run_scheduler(&ctx, shutdown).await,
        Command::TestSearch => {
            search_probe::run_until_shutdown(&ctx, &mut std::io::stdout(), shutdown).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Exiting with failure");
            eprintln!("Unexpected Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
