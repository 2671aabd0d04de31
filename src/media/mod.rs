//! Media server capabilities consumed by the refresh engine.
//!
//! The engine never talks HTTP itself. It sees a server through these traits,
//! which the Plex client implements and the tests fake.

pub mod matched;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

pub use matched::{LibraryMatches, LibraryResultSet, MatchDetail, MatchKind, MatchedItem};

/// Library section type, decided once when the section is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryKind {
    Movie,
    Show,
    Other,
}

impl LibraryKind {
    pub fn from_type_name(value: &str) -> Self {
        match value {
            "movie" => Self::Movie,
            "show" => Self::Show,
            _ => Self::Other,
        }
    }

    /// Whether the refresh engine knows how to search this library.
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Movie | Self::Show)
    }
}

/// Concrete item subtype as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Movie,
    Show,
    Season,
    Episode,
    Other,
}

impl ItemKind {
    pub fn from_type_name(value: &str) -> Self {
        match value {
            "movie" => Self::Movie,
            "show" => Self::Show,
            "season" => Self::Season,
            "episode" => Self::Episode,
            _ => Self::Other,
        }
    }
}

/// Who we are talking to, as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
    pub platform: String,
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Version: {}, Platform: {})",
            self.name, self.version, self.platform
        )
    }
}

pub type Session = Arc<dyn MediaSession>;
pub type Library = Arc<dyn LibrarySection>;
pub type Item = Arc<dyn MediaItem>;

/// Opens sessions against the configured endpoint with the configured credential.
#[async_trait]
pub trait SessionOpener: Send + Sync {
    async fn open_session(&self) -> Result<Session>;
}

#[async_trait]
pub trait MediaSession: Send + Sync {
    async fn identity(&self) -> Result<ServerIdentity>;

    /// All library sections, in server order.
    async fn library_sections(&self) -> Result<Vec<Library>>;

    /// Resolve one section by its display name. `Ok(None)` when no section
    /// carries that name.
    async fn library_section(&self, name: &str) -> Result<Option<Library>> {
        let sections = self.library_sections().await?;
        Ok(sections.into_iter().find(|s| s.title() == name))
    }
}

#[async_trait]
pub trait LibrarySection: Send + Sync {
    fn title(&self) -> &str;

    fn kind(&self) -> LibraryKind;

    /// Raw server type string, for logging.
    fn type_name(&self) -> &str;

    /// Server-side title search scoped to this section.
    async fn search(&self, pattern: &str) -> Result<Vec<Item>>;

    /// Every top-level item in the section (movies, or shows).
    async fn all(&self) -> Result<Vec<Item>>;
}

/// Read-only view of one catalog item plus the single mutation the engine needs.
#[async_trait]
pub trait MediaItem: Send + Sync {
    fn title(&self) -> &str;

    fn kind(&self) -> ItemKind;

    fn year(&self) -> Option<i32> {
        None
    }

    /// Parent series title (episodes only).
    fn series_title(&self) -> Option<&str> {
        None
    }

    fn season_index(&self) -> Option<u32> {
        None
    }

    fn episode_index(&self) -> Option<u32> {
        None
    }

    /// Episodes of a show, in server order.
    async fn episodes(&self) -> Result<Vec<Item>>;

    /// Ask the server to refresh this item's metadata. Success means the
    /// request was accepted, not that the refresh finished.
    async fn refresh(&self) -> Result<()>;
}
