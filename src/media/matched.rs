//! Items that matched a placeholder pattern during one cycle.

use std::fmt;

use anyhow::{Result, anyhow};

use super::{Item, MediaItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Movie,
    Episode,
}

/// Year or series context of a match. The episode variant always carries all
/// three of series, season and episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchDetail {
    Movie {
        year: Option<i32>,
    },
    Episode {
        series: String,
        season: u32,
        episode: u32,
    },
}

/// One matched catalog entry. Built once during a search pass and never mutated.
#[derive(Clone)]
pub struct MatchedItem {
    title: String,
    detail: MatchDetail,
    handle: Item,
}

impl MatchedItem {
    pub fn from_movie(item: Item) -> Self {
        Self {
            title: item.title().to_string(),
            detail: MatchDetail::Movie { year: item.year() },
            handle: item,
        }
    }

    /// Wrap an episode. `series` comes from the enclosing show when one is at
    /// hand, otherwise from the episode's own parent title.
    pub fn from_episode(item: Item, series: Option<&str>) -> Result<Self> {
        let series = series
            .or_else(|| item.series_title())
            .ok_or_else(|| missing(&*item, "series title"))?
            .to_string();
        let season = item.season_index().ok_or_else(|| missing(&*item, "season"))?;
        let episode = item
            .episode_index()
            .ok_or_else(|| missing(&*item, "episode"))?;

        Ok(Self {
            title: item.title().to_string(),
            detail: MatchDetail::Episode {
                series,
                season,
                episode,
            },
            handle: item,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> MatchKind {
        match self.detail {
            MatchDetail::Movie { .. } => MatchKind::Movie,
            MatchDetail::Episode { .. } => MatchKind::Episode,
        }
    }

    pub fn detail(&self) -> &MatchDetail {
        &self.detail
    }

    pub async fn refresh(&self) -> Result<()> {
        self.handle.refresh().await
    }
}

fn missing(item: &dyn MediaItem, attribute: &str) -> anyhow::Error {
    anyhow!("item '{}' has no {}", item.title(), attribute)
}

impl fmt::Display for MatchedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            MatchDetail::Movie { year: Some(year) } => write!(f, "{} ({})", self.title, year),
            MatchDetail::Movie { year: None } => write!(f, "{} (Unknown)", self.title),
            MatchDetail::Episode {
                series,
                season,
                episode,
            } => write!(
                f,
                "{} - S{:02}E{:02} - {}",
                series, season, episode, self.title
            ),
        }
    }
}

impl fmt::Debug for MatchedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchedItem")
            .field("title", &self.title)
            .field("detail", &self.detail)
            .finish_non_exhaustive()
    }
}

/// Matches found in one library.
#[derive(Debug, Clone)]
pub struct LibraryMatches {
    pub library: String,
    pub items: Vec<MatchedItem>,
}

impl LibraryMatches {
    pub fn movies(&self) -> impl Iterator<Item = &MatchedItem> {
        self.items.iter().filter(|i| i.kind() == MatchKind::Movie)
    }

    pub fn episodes(&self) -> impl Iterator<Item = &MatchedItem> {
        self.items.iter().filter(|i| i.kind() == MatchKind::Episode)
    }
}

/// Matches for the current cycle, keyed by library name in processing order.
#[derive(Debug, Clone, Default)]
pub struct LibraryResultSet {
    libraries: Vec<LibraryMatches>,
}

impl LibraryResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the matches of one library. A second entry for the same name
    /// replaces the first but keeps its position.
    pub fn insert(&mut self, library: impl Into<String>, items: Vec<MatchedItem>) {
        let library = library.into();
        match self.libraries.iter_mut().find(|l| l.library == library) {
            Some(existing) => existing.items = items,
            None => self.libraries.push(LibraryMatches { library, items }),
        }
    }

    pub fn get(&self, library: &str) -> Option<&[MatchedItem]> {
        self.libraries
            .iter()
            .find(|l| l.library == library)
            .map(|l| l.items.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &LibraryMatches> {
        self.libraries.iter()
    }

    pub fn library_count(&self) -> usize {
        self.libraries.len()
    }

    pub fn total_items(&self) -> usize {
        self.libraries.iter().map(|l| l.items.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::media::ItemKind;

    struct StubItem {
        title: &'static str,
        year: Option<i32>,
        season: Option<u32>,
        episode: Option<u32>,
        series: Option<&'static str>,
    }

    #[async_trait]
    impl MediaItem for StubItem {
        fn title(&self) -> &str {
            self.title
        }
        fn kind(&self) -> ItemKind {
            ItemKind::Episode
        }
        fn year(&self) -> Option<i32> {
            self.year
        }
        fn series_title(&self) -> Option<&str> {
            self.series
        }
        fn season_index(&self) -> Option<u32> {
            self.season
        }
        fn episode_index(&self) -> Option<u32> {
            self.episode
        }
        async fn episodes(&self) -> Result<Vec<Item>> {
            Ok(Vec::new())
        }
        async fn refresh(&self) -> Result<()> {
            Ok(())
        }
    }

    fn stub(season: Option<u32>, episode: Option<u32>) -> Item {
        Arc::new(StubItem {
            title: "TBA",
            year: None,
            season,
            episode,
            series: Some("Severance"),
        })
    }

    #[test]
    fn test_movie_display() {
        let with_year = MatchedItem::from_movie(Arc::new(StubItem {
            title: "TBA",
            year: Some(2025),
            season: None,
            episode: None,
            series: None,
        }));
        assert_eq!(with_year.to_string(), "TBA (2025)");
        assert_eq!(with_year.kind(), MatchKind::Movie);

        let without_year = MatchedItem::from_movie(Arc::new(StubItem {
            title: "TBA",
            year: None,
            season: None,
            episode: None,
            series: None,
        }));
        assert_eq!(without_year.to_string(), "TBA (Unknown)");
    }

    #[test]
    fn test_episode_display_pads_indices() {
        let item = MatchedItem::from_episode(stub(Some(2), Some(7)), None).unwrap();
        assert_eq!(item.to_string(), "Severance - S02E07 - TBA");
        assert_eq!(item.kind(), MatchKind::Episode);
    }

    #[test]
    fn test_episode_prefers_enclosing_show_title() {
        let item = MatchedItem::from_episode(stub(Some(1), Some(1)), Some("Other")).unwrap();
        assert_eq!(
            item.detail(),
            &MatchDetail::Episode {
                series: "Other".to_string(),
                season: 1,
                episode: 1
            }
        );
    }

    #[test]
    fn test_episode_without_indices_is_rejected() {
        assert!(MatchedItem::from_episode(stub(None, Some(1)), None).is_err());
        assert!(MatchedItem::from_episode(stub(Some(1), None), None).is_err());
    }

    #[test]
    fn test_result_set_keeps_insertion_order() {
        let mut set = LibraryResultSet::new();
        set.insert("TV", vec![MatchedItem::from_episode(stub(Some(1), Some(1)), None).unwrap()]);
        set.insert("Movies", Vec::new());
        set.insert("TV", Vec::new());

        let names: Vec<_> = set.iter().map(|l| l.library.as_str()).collect();
        assert_eq!(names, vec!["TV", "Movies"]);
        assert_eq!(set.total_items(), 0);
        assert_eq!(set.library_count(), 2);
    }
}
