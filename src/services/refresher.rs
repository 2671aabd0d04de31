//! Refresh cycle orchestration
//!
//! One cycle: connect, resolve libraries, search each one, then either report
//! (dry run) or refresh every match with a pause between items.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use super::connection::{self, RetryConfig};
use super::report;
use super::search;
use crate::config::Config;
use crate::error::CycleError;
use crate::media::{Library, LibraryResultSet, MatchedItem, MediaSession, SessionOpener};

/// Everything a cycle needs, built once at startup and passed by reference.
pub struct RefreshContext {
    pub config: Arc<Config>,
    pub opener: Arc<dyn SessionOpener>,
    pub retry: RetryConfig,
}

impl RefreshContext {
    pub fn new(config: Arc<Config>, opener: Arc<dyn SessionOpener>) -> Self {
        Self {
            config,
            opener,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn dry_run(&self) -> bool {
        self.config.refresh.dry_run
    }
}

/// What happened during one cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// No usable session could be established.
    Skipped,
    Completed(CycleReport),
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub results: LibraryResultSet,
    pub refreshed: usize,
    pub failed: usize,
}

/// Tally of one library's refresh pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTally {
    pub refreshed: usize,
    pub failed: usize,
}

/// Run one full search-and-refresh pass.
///
/// Per-library and per-item failures are contained here. A configured library
/// that does not exist on the server is returned as an error.
pub async fn run_cycle(ctx: &RefreshContext) -> Result<CycleOutcome> {
    let config = &ctx.config;
    info!(
        method = config.search.method.as_str(),
        dry_run = ctx.dry_run(),
        "Starting metadata refresh scan"
    );

    let Some(session) = connection::connect(ctx.opener.as_ref(), &ctx.retry).await else {
        warn!("No Plex connection, skipping this cycle");
        return Ok(CycleOutcome::Skipped);
    };

    let configured = config.plex.libraries.as_deref();
    let libraries: Vec<Library> = resolve_libraries(session.as_ref(), configured)
        .await?
        .into_iter()
        .filter(|l| l.kind().is_supported())
        .collect();
    let total = libraries.len();

    info!(
        count = total,
        patterns = %config.search.patterns.join(", "),
        case_sensitive = config.search.case_sensitive,
        "Found {} valid libraries to scan",
        total
    );

    let mut report = CycleReport::default();

    for (index, library) in libraries.iter().enumerate() {
        info!(
            library = %library.title(),
            library_type = %library.type_name(),
            "Processing library {}/{}: {}",
            index + 1,
            total,
            library.title()
        );

        let items = search::find_matches(library.as_ref(), &config.search).await;

        if !ctx.dry_run() && !items.is_empty() {
            info!(
                library = %library.title(),
                count = items.len(),
                "Refreshing metadata for {} items in {}",
                items.len(),
                library.title()
            );
            let tally = refresh_items(&items, config.refresh.delay_between_items).await;
            report.refreshed += tally.refreshed;
            report.failed += tally.failed;
        }

        report.results.insert(library.title(), items);
        info!(library = %library.title(), "Completed scanning library: {}", library.title());
    }

    if ctx.dry_run() {
        report::log_dry_run_summary(&report.results, &config.search);
    } else {
        info!(
            refreshed = report.refreshed,
            failed = report.failed,
            "Refresh pass finished"
        );
    }

    Ok(CycleOutcome::Completed(report))
}

/// Configured names are resolved one by one and must all exist; without a
/// configured list, every section the server reports is used.
pub async fn resolve_libraries(
    session: &dyn MediaSession,
    configured: Option<&[String]>,
) -> Result<Vec<Library>> {
    match configured {
        Some(names) => {
            info!("Processing configured libraries: {}", names.join(", "));
            let mut libraries = Vec::with_capacity(names.len());
            for name in names {
                let library = session
                    .library_section(name)
                    .await
                    .map_err(CycleError::Sections)?
                    .ok_or_else(|| CycleError::LibraryNotFound(name.clone()))?;
                libraries.push(library);
            }
            Ok(libraries)
        }
        None => {
            info!("No specific libraries configured - processing all libraries");
            Ok(session
                .library_sections()
                .await
                .map_err(CycleError::Sections)?)
        }
    }
}

/// Refresh items in order. A failure is logged and the next item still runs.
/// After each successful refresh, wait `delay` unless it was the last item.
pub async fn refresh_items(items: &[MatchedItem], delay: Duration) -> RefreshTally {
    let mut tally = RefreshTally::default();
    let total = items.len();

    for (index, item) in items.iter().enumerate() {
        info!("Refreshing {}/{}: {}", index + 1, total, item);

        match item.refresh().await {
            Ok(()) => {
                tally.refreshed += 1;
                if index + 1 < total {
                    info!(
                        delay_secs = delay.as_secs(),
                        "Refresh complete, waiting {} seconds...",
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => {
                tally.failed += 1;
                error!(
                    item = %item,
                    error = %format!("{:#}", e),
                    "Failed to refresh {}",
                    item
                );
            }
        }
    }

    tally
}
