//! One-shot diagnostic: show what the server's own search returns.
//!
//! Runs the quick-search request for every pattern in every configured
//! library and prints the raw hits, without filtering or refreshing. Useful to
//! check whether a pattern is something the server's search understands
//! before switching to deep search.

use std::io::Write;

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::media::{ItemKind, Library, MediaItem};
use crate::services::connection;
use crate::services::refresher::RefreshContext;

/// Run the probe unless `shutdown` fires first. An interrupt is not an error.
pub async fn run_until_shutdown<W: Write>(
    ctx: &RefreshContext,
    out: &mut W,
    shutdown: CancellationToken,
) -> Result<()> {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            info!("Received shutdown signal. Exiting gracefully.");
            Ok(())
        }
        result = run_search_probe(ctx, out) => result,
    }
}

/// Run the probe and write a plain-text report to `out`.
pub async fn run_search_probe<W: Write>(ctx: &RefreshContext, out: &mut W) -> Result<()> {
    let Some(session) = connection::connect(ctx.opener.as_ref(), &ctx.retry).await else {
        bail!("could not connect to Plex");
    };

    let sections = session.library_sections().await?;
    let names: Vec<&str> = sections.iter().map(|s| s.title()).collect();
    writeln!(out, "Found libraries: {}", names.join(", "))?;

    let targets: Vec<String> = match &ctx.config.plex.libraries {
        Some(configured) => configured.clone(),
        None => names.iter().map(|n| n.to_string()).collect(),
    };

    for name in &targets {
        let Some(library) = sections.iter().find(|s| s.title() == name.as_str()) else {
            writeln!(out, "\nLibrary not found: {}", name)?;
            continue;
        };
        probe_library(library, &ctx.config.search.patterns, out)
            .await
            .with_context(|| format!("search probe failed in library {}", name))?;
    }

    Ok(())
}

async fn probe_library<W: Write>(
    library: &Library,
    patterns: &[String],
    out: &mut W,
) -> Result<()> {
    writeln!(out, "\nTesting search in library: {}", library.title())?;
    writeln!(out, "Library type: {}", library.type_name())?;

    for pattern in patterns {
        writeln!(out, "\n  Searching for: {}", pattern)?;
        let results = library.search(pattern).await?;
        if results.is_empty() {
            writeln!(out, "    No matches found")?;
            continue;
        }

        writeln!(out, "    Found {} matches:", results.len())?;
        for item in &results {
            writeln!(out, "      {}", describe(item.as_ref()))?;
        }
    }

    Ok(())
}

fn describe(item: &dyn MediaItem) -> String {
    match item.kind() {
        ItemKind::Movie => match item.year() {
            Some(year) => format!("Movie: {} ({})", item.title(), year),
            None => format!("Movie: {} (Unknown)", item.title()),
        },
        ItemKind::Episode => format!(
            "Episode: {} - S{:02}E{:02} - {}",
            item.series_title().unwrap_or("?"),
            item.season_index().unwrap_or(0),
            item.episode_index().unwrap_or(0),
            item.title()
        ),
        other => format!("{:?}: {}", other, item.title()),
    }
}
