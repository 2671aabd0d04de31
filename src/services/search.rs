//! Placeholder-title search over one library section
//!
//! Two strategies:
//! - **quick** asks the server to search each pattern and trusts its results;
//! - **deep** walks the whole catalog and matches titles client-side.
//!
//! Both contain their own failures: an error part-way through a library is
//! logged and whatever matched before it is returned.

use anyhow::Result;
use tracing::{debug, error, info};

use crate::config::{SearchConfig, SearchMethod};
use crate::media::{Item, ItemKind, LibraryKind, LibrarySection, MatchedItem};

/// Log scan progress every this many movies during a deep search.
const PROGRESS_EVERY: usize = 100;

/// Case-normalised pattern set for client-side matching.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    patterns: Vec<String>,
    case_sensitive: bool,
}

impl PatternMatcher {
    pub fn new(patterns: &[String], case_sensitive: bool) -> Self {
        let patterns = if case_sensitive {
            patterns.to_vec()
        } else {
            patterns.iter().map(|p| p.to_uppercase()).collect()
        };
        Self {
            patterns,
            case_sensitive,
        }
    }

    /// True if any pattern is a substring of `title`.
    pub fn matches(&self, title: &str) -> bool {
        if self.case_sensitive {
            self.patterns.iter().any(|p| title.contains(p.as_str()))
        } else {
            let title = title.to_uppercase();
            self.patterns.iter().any(|p| title.contains(p.as_str()))
        }
    }
}

/// Run the configured strategy against one library.
pub async fn find_matches(library: &dyn LibrarySection, search: &SearchConfig) -> Vec<MatchedItem> {
    let mut matches = Vec::new();

    let outcome = match search.method {
        SearchMethod::Quick => quick_search(library, search, &mut matches).await,
        SearchMethod::Deep => deep_search(library, search, &mut matches).await,
    };

    if let Err(e) = outcome {
        error!(
            library = %library.title(),
            method = search.method.as_str(),
            kept = matches.len(),
            error = %format!("{:#}", e),
            "Error searching library {}",
            library.title()
        );
    }

    matches
}

/// Server-side search, one request per pattern. No client-side filtering and
/// no de-duplication: an item hit by two patterns is returned twice.
pub async fn quick_search(
    library: &dyn LibrarySection,
    search: &SearchConfig,
    matches: &mut Vec<MatchedItem>,
) -> Result<()> {
    info!(library = %library.title(), "Quick searching library: {}", library.title());

    for pattern in &search.patterns {
        info!(pattern = %pattern, "Searching for pattern: '{}'", pattern);

        let items = library.search(pattern).await?;
        if items.is_empty() {
            info!(pattern = %pattern, "No items found matching '{}'", pattern);
            continue;
        }
        info!(
            pattern = %pattern,
            count = items.len(),
            "Found {} items matching '{}'",
            items.len(),
            pattern
        );

        for item in items {
            match library.kind() {
                LibraryKind::Movie => {
                    let matched = MatchedItem::from_movie(item);
                    info!("Found movie: {}", matched);
                    matches.push(matched);
                }
                LibraryKind::Show if item.kind() == ItemKind::Episode => {
                    let matched = MatchedItem::from_episode(item, None)?;
                    info!("Found episode: {}", matched);
                    matches.push(matched);
                }
                _ => {
                    debug!(title = %item.title(), "Skipping non-episode search result");
                }
            }
        }
    }

    Ok(())
}

/// Client-side scan of the entire library.
pub async fn deep_search(
    library: &dyn LibrarySection,
    search: &SearchConfig,
    matches: &mut Vec<MatchedItem>,
) -> Result<()> {
    let matcher = PatternMatcher::new(&search.patterns, search.case_sensitive);

    match library.kind() {
        LibraryKind::Movie => deep_scan_movies(library, &matcher, matches).await,
        LibraryKind::Show => deep_scan_shows(library, search, &matcher, matches).await,
        LibraryKind::Other => Ok(()),
    }
}

async fn deep_scan_movies(
    library: &dyn LibrarySection,
    matcher: &PatternMatcher,
    matches: &mut Vec<MatchedItem>,
) -> Result<()> {
    info!(library = %library.title(), "Deep scanning movie library: {}", library.title());

    let movies = library.all().await?;
    let total = movies.len();
    info!(total = total, "Scanning {} movies", total);

    for (idx, movie) in movies.into_iter().enumerate() {
        let idx = idx + 1;
        if matcher.matches(movie.title()) {
            let matched = MatchedItem::from_movie(movie);
            info!("Found matching movie ({}/{}): {}", idx, total, matched);
            matches.push(matched);
        }
        if idx % PROGRESS_EVERY == 0 {
            info!("Processed {}/{} movies...", idx, total);
        }
    }

    Ok(())
}

async fn deep_scan_shows(
    library: &dyn LibrarySection,
    search: &SearchConfig,
    matcher: &PatternMatcher,
    matches: &mut Vec<MatchedItem>,
) -> Result<()> {
    let shows = library.all().await?;
    let total = shows.len();
    info!(
        library = %library.title(),
        shows = total,
        "Deep scanning TV library: {} ({} shows)",
        library.title(),
        total
    );

    for (idx, show) in shows.iter().enumerate() {
        info!("Scanning show {}/{}: {}", idx + 1, total, show.title());

        let mut episodes = show.episodes().await?;
        if let Some(limit) = search.episode_scan_limit {
            if episodes.len() > limit {
                episodes.truncate(limit);
                debug!(limit = limit, "Limited to {} episodes per show", limit);
            }
        }

        for episode in episodes {
            if episode_matches(show, &episode, search.include_full_title, matcher) {
                let matched = MatchedItem::from_episode(episode, Some(show.title()))?;
                info!("Found matching episode: {}", matched);
                matches.push(matched);
            }
        }
    }

    Ok(())
}

/// Test either the bare episode title or "{series} - {episode}", never both.
fn episode_matches(
    show: &Item,
    episode: &Item,
    full_title: bool,
    matcher: &PatternMatcher,
) -> bool {
    if full_title {
        matcher.matches(&format!("{} - {}", show.title(), episode.title()))
    } else {
        matcher.matches(episode.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_case_insensitive_matching() {
        let matcher = PatternMatcher::new(&patterns(&["tba"]), false);
        assert!(matcher.matches("TBA"));
        assert!(matcher.matches("Episode tBa 3"));
        assert!(!matcher.matches("T.B.A."));
    }

    #[test]
    fn test_case_sensitive_matching() {
        let matcher = PatternMatcher::new(&patterns(&["TBA"]), true);
        assert!(matcher.matches("TBA"));
        assert!(matcher.matches("xTBAx"));
        assert!(!matcher.matches("tba"));
    }

    #[test]
    fn test_any_pattern_matches() {
        let matcher = PatternMatcher::new(&patterns(&["TBA", "To Be Announced"]), false);
        assert!(matcher.matches("episode to be announced"));
        assert!(!matcher.matches("Pilot"));
    }

    #[test]
    fn test_empty_pattern_set_matches_nothing() {
        let matcher = PatternMatcher::new(&[], false);
        assert!(!matcher.matches("TBA"));
    }

    #[test]
    fn test_matches_iff_uppercased_substring() {
        let titles = ["TBA", "tba", "Tba Special", "Pilot", "Episode 1", "The Tbar", "ß"];
        let pats = ["tba", "TB", "ss", "pilot", "x"];
        for pattern in pats {
            let matcher = PatternMatcher::new(&patterns(&[pattern]), false);
            for title in titles {
                assert_eq!(
                    matcher.matches(title),
                    title.to_uppercase().contains(&pattern.to_uppercase()),
                    "pattern {:?} title {:?}",
                    pattern,
                    title
                );
            }
        }
    }
}
