//! In-memory media server used by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::Level;
use url::Url;

use tba_refresher::config::{
    Config, LogFormat, LoggingConfig, PlexConfig, RefreshConfig, SearchConfig, SearchMethod,
};
use tba_refresher::media::{
    Item, ItemKind, Library, LibraryKind, LibrarySection, MediaItem, MediaSession, ServerIdentity,
    Session, SessionOpener,
};

/// Titles of refreshed items with the (virtual) time of each call.
pub type RefreshLog = Arc<Mutex<Vec<(String, Instant)>>>;

pub fn refresh_log() -> RefreshLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn refreshed_titles(log: &RefreshLog) -> Vec<String> {
    log.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
}

pub struct FakeItem {
    pub title: String,
    pub kind: ItemKind,
    pub year: Option<i32>,
    pub series: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub episodes: Vec<Item>,
    pub fail_episodes: bool,
    pub fail_refresh: bool,
    pub log: RefreshLog,
}

impl FakeItem {
    fn base(title: &str, kind: ItemKind, log: &RefreshLog) -> Self {
        Self {
            title: title.to_string(),
            kind,
            year: None,
            series: None,
            season: None,
            episode: None,
            episodes: Vec::new(),
            fail_episodes: false,
            fail_refresh: false,
            log: log.clone(),
        }
    }

    pub fn movie(title: &str, year: Option<i32>, log: &RefreshLog) -> Self {
        Self {
            year,
            ..Self::base(title, ItemKind::Movie, log)
        }
    }

    pub fn episode(series: &str, season: u32, episode: u32, title: &str, log: &RefreshLog) -> Self {
        Self {
            series: Some(series.to_string()),
            season: Some(season),
            episode: Some(episode),
            ..Self::base(title, ItemKind::Episode, log)
        }
    }

    pub fn show(title: &str, episodes: Vec<Item>, log: &RefreshLog) -> Self {
        Self {
            episodes,
            ..Self::base(title, ItemKind::Show, log)
        }
    }

    pub fn failing_refresh(mut self) -> Self {
        self.fail_refresh = true;
        self
    }

    pub fn failing_episodes(mut self) -> Self {
        self.fail_episodes = true;
        self
    }

    pub fn into_item(self) -> Item {
        Arc::new(self)
    }
}

#[async_trait]
impl MediaItem for FakeItem {
    fn title(&self) -> &str {
        &self.title
    }

    fn kind(&self) -> ItemKind {
        self.kind
    }

    fn year(&self) -> Option<i32> {
        self.year
    }

    fn series_title(&self) -> Option<&str> {
        self.series.as_deref()
    }

    fn season_index(&self) -> Option<u32> {
        self.season
    }

    fn episode_index(&self) -> Option<u32> {
        self.episode
    }

    async fn episodes(&self) -> Result<Vec<Item>> {
        if self.fail_episodes {
            bail!("episode listing failed for {}", self.title);
        }
        Ok(self.episodes.clone())
    }

    async fn refresh(&self) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push((self.title.clone(), Instant::now()));
        if self.fail_refresh {
            bail!("refresh rejected for {}", self.title);
        }
        Ok(())
    }
}

pub struct FakeLibrary {
    pub title: String,
    pub kind: LibraryKind,
    pub type_name: String,
    pub all: Vec<Item>,
    pub search_results: HashMap<String, Vec<Item>>,
    pub fail_all: bool,
    pub searches: Mutex<Vec<String>>,
}

impl FakeLibrary {
    pub fn new(title: &str, type_name: &str) -> Self {
        Self {
            title: title.to_string(),
            kind: LibraryKind::from_type_name(type_name),
            type_name: type_name.to_string(),
            all: Vec::new(),
            search_results: HashMap::new(),
            fail_all: false,
            searches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_all(mut self, items: Vec<Item>) -> Self {
        self.all = items;
        self
    }

    pub fn with_search(mut self, pattern: &str, items: Vec<Item>) -> Self {
        self.search_results.insert(pattern.to_string(), items);
        self
    }

    pub fn failing_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    pub fn into_library(self) -> Library {
        Arc::new(self)
    }
}

#[async_trait]
impl LibrarySection for FakeLibrary {
    fn title(&self) -> &str {
        &self.title
    }

    fn kind(&self) -> LibraryKind {
        self.kind
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    async fn search(&self, pattern: &str) -> Result<Vec<Item>> {
        self.searches.lock().unwrap().push(pattern.to_string());
        Ok(self.search_results.get(pattern).cloned().unwrap_or_default())
    }

    async fn all(&self) -> Result<Vec<Item>> {
        if self.fail_all {
            bail!("catalog listing failed for {}", self.title);
        }
        Ok(self.all.clone())
    }
}

pub struct FakeSession {
    pub sections: Vec<Library>,
}

#[async_trait]
impl MediaSession for FakeSession {
    async fn identity(&self) -> Result<ServerIdentity> {
        Ok(ServerIdentity {
            name: "Fake Plex".to_string(),
            version: "1.0.0".to_string(),
            platform: "Test".to_string(),
        })
    }

    async fn library_sections(&self) -> Result<Vec<Library>> {
        Ok(self.sections.clone())
    }
}

/// Session opener that fails a set number of times before succeeding.
pub struct FakeOpener {
    session: Session,
    failures_remaining: AtomicUsize,
    pub opens: Mutex<Vec<Instant>>,
}

impl FakeOpener {
    pub fn new(sections: Vec<Library>) -> Self {
        Self::failing(sections, 0)
    }

    pub fn failing(sections: Vec<Library>, failures: usize) -> Self {
        Self {
            session: Arc::new(FakeSession { sections }),
            failures_remaining: AtomicUsize::new(failures),
            opens: Mutex::new(Vec::new()),
        }
    }

    pub fn open_times(&self) -> Vec<Instant> {
        self.opens.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionOpener for FakeOpener {
    async fn open_session(&self) -> Result<Session> {
        self.opens.lock().unwrap().push(Instant::now());
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("401 Unauthorized"));
        }
        Ok(self.session.clone())
    }
}

pub fn search_config(method: SearchMethod, patterns: &[&str]) -> SearchConfig {
    SearchConfig {
        method,
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        case_sensitive: false,
        include_full_title: false,
        episode_scan_limit: None,
    }
}

pub fn test_config(search: SearchConfig, dry_run: bool, libraries: Option<Vec<&str>>) -> Config {
    Config {
        plex: PlexConfig {
            url: Url::parse("http://plex.test:32400").unwrap(),
            token: "x".repeat(20),
            libraries: libraries.map(|l| l.into_iter().map(str::to_string).collect()),
        },
        search,
        refresh: RefreshConfig {
            interval: Duration::from_secs(3600),
            delay_between_items: Duration::from_secs(2),
            dry_run,
        },
        logging: LoggingConfig {
            level: Level::INFO,
            format: LogFormat::Text,
            file: PathBuf::from("/tmp/tba-refresher-test.log"),
            max_size_bytes: 1024 * 1024,
            backup_count: 1,
        },
    }
}
