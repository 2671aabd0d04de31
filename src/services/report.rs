//! Human-readable dry-run report.

use tracing::info;

use crate::config::SearchConfig;
use crate::media::LibraryResultSet;

/// Build the dry-run summary as a list of lines.
///
/// Libraries without matches are left out. Within a library, movies are
/// listed under "Movies:" and episodes under "Episodes:".
pub fn dry_run_summary(results: &LibraryResultSet, search: &SearchConfig) -> Vec<String> {
    let total = results.total_items();
    let mut lines = vec![
        "=== DRY RUN SUMMARY ===".to_string(),
        format!("Searching for: {}", search.patterns.join(", ")),
        format!("Case sensitive: {}", search.case_sensitive),
        format!("Total matching items found: {}", total),
    ];

    for library in results.iter().filter(|l| !l.items.is_empty()) {
        lines.push(String::new());
        lines.push(format!(
            "Library: {} ({} items)",
            library.library,
            library.items.len()
        ));

        let movies: Vec<_> = library.movies().collect();
        if !movies.is_empty() {
            lines.push("Movies:".to_string());
            lines.extend(movies.iter().map(|m| format!("- {}", m)));
        }

        let episodes: Vec<_> = library.episodes().collect();
        if !episodes.is_empty() {
            lines.push("Episodes:".to_string());
            lines.extend(episodes.iter().map(|e| format!("- {}", e)));
        }
    }

    if total == 0 {
        lines.push("No matching items found in any library".to_string());
    }

    lines.push(String::new());
    lines.push("To perform the actual refresh, set dry_run: false in the config file".to_string());
    lines.push("=== END DRY RUN SUMMARY ===".to_string());
    lines
}

pub fn log_dry_run_summary(results: &LibraryResultSet, search: &SearchConfig) {
    for line in dry_run_summary(results, search) {
        info!("{}", line);
    }
}
