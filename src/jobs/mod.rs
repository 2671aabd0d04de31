//! Refresh scheduling
//!
//! Dry run: one cycle, then stop. Live: cycle, sleep for the configured
//! interval, repeat until shutdown. A failed live cycle is retried after
//! [ERROR_BACKOFF] instead of ending the loop.

pub mod search_probe;

use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::services::refresher::{self, RefreshContext};

/// Pause after a cycle fails before the next attempt.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// Run the refresh loop until it finishes (dry run) or `shutdown` fires.
///
/// Returns `Err` only when the single dry-run cycle fails.
pub async fn run_scheduler(ctx: &RefreshContext, shutdown: CancellationToken) -> Result<()> {
    if ctx.dry_run() {
        run_once(ctx, &shutdown).await
    } else {
        run_forever(ctx, &shutdown).await;
        Ok(())
    }
}

async fn run_once(ctx: &RefreshContext, shutdown: &CancellationToken) -> Result<()> {
    info!("=== DRY RUN MODE - NO CHANGES WILL BE MADE ===");
    info!("Starting Plex metadata refresh service (DRY RUN - will run only once)");

    tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            info!("Received shutdown signal. Exiting gracefully.");
            Ok(())
        }
        result = refresher::run_cycle(ctx) => match result {
            Ok(_) => {
                info!("Dry run completed. Exiting.");
                Ok(())
            }
            Err(e) => {
                error!(error = %format!("{:#}", e), "Unexpected error during refresh cycle");
                info!("Exiting due to error in dry run mode.");
                Err(e)
            }
        }
    }
}

async fn run_forever(ctx: &RefreshContext, shutdown: &CancellationToken) {
    info!("Starting Plex metadata refresh service (continuous mode)");
    let interval = ctx.config.refresh.interval;

    loop {
        let pause = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            result = refresher::run_cycle(ctx) => match result {
                Ok(_) => {
                    info!(
                        interval_secs = interval.as_secs(),
                        "Refresh cycle completed. Sleeping for {} seconds until next refresh",
                        interval.as_secs()
                    );
                    interval
                }
                Err(e) => {
                    error!(error = %format!("{:#}", e), "Unexpected error during refresh cycle");
                    info!("Waiting {} seconds before retrying...", ERROR_BACKOFF.as_secs());
                    ERROR_BACKOFF
                }
            }
        };

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(pause) => {
                info!("Wake up - starting next refresh cycle");
            }
        }
    }

    info!("Received shutdown signal. Exiting gracefully.");
}

/// Cancel `token` on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    token.cancel();
}
