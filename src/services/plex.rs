//! Plex Media Server HTTP client
//!
//! Implements the [media](crate::media) capability traits on top of the Plex
//! JSON API. Every request carries the `X-Plex-Token` header and asks for JSON.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::PlexConfig;
use crate::error::PlexError;
use crate::media::{
    Item, ItemKind, Library, LibraryKind, LibrarySection, MediaItem, MediaSession, ServerIdentity,
    Session, SessionOpener,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Plex search `type` values.
const MOVIE_TYPE: &str = "1";
const EPISODE_TYPE: &str = "4";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    media_container: T,
}

#[derive(Debug, Deserialize)]
struct IdentityContainer {
    #[serde(rename = "friendlyName", default)]
    friendly_name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    platform: String,
}

#[derive(Debug, Deserialize)]
struct SectionsContainer {
    #[serde(rename = "Directory", default)]
    directory: Vec<PlexDirectory>,
}

/// Library section as listed by `/library/sections`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlexDirectory {
    pub key: String,
    pub title: String,
    #[serde(rename = "type")]
    pub section_type: String,
}

#[derive(Debug, Deserialize)]
struct MetadataContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<PlexMetadata>,
}

/// A catalog item (movie, show, season or episode).
#[derive(Debug, Clone, Deserialize)]
pub struct PlexMetadata {
    #[serde(rename = "ratingKey")]
    pub rating_key: String,
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub year: Option<i32>,
    #[serde(rename = "grandparentTitle")]
    pub grandparent_title: Option<String>,
    #[serde(rename = "parentIndex")]
    pub parent_index: Option<u32>,
    pub index: Option<u32>,
}

/// Shared HTTP plumbing for every handle created from one session.
struct PlexHttp {
    client: Client,
    base_url: Url,
    token: String,
}

impl PlexHttp {
    fn url(&self, path: &str) -> Result<Url, PlexError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}{}", base, path))?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.url(path)?;
        debug!(path = %path, "Plex GET");

        let response = self
            .client
            .get(url)
            .header("X-Plex-Token", &self.token)
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(PlexError::from)
            .with_context(|| format!("Failed to reach Plex at {}", path))?;

        if !response.status().is_success() {
            return Err(PlexError::HttpStatus {
                status: response.status().as_u16(),
                path: path.to_string(),
            }
            .into());
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse Plex response from {}", path))?;
        Ok(envelope.media_container)
    }

    async fn put(&self, path: &str) -> Result<()> {
        let url = self.url(path)?;
        debug!(path = %path, "Plex PUT");

        let response = self
            .client
            .put(url)
            .header("X-Plex-Token", &self.token)
            .send()
            .await
            .map_err(PlexError::from)
            .with_context(|| format!("Failed to reach Plex at {}", path))?;

        if !response.status().is_success() {
            return Err(PlexError::HttpStatus {
                status: response.status().as_u16(),
                path: path.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn metadata(self: &Arc<Self>, path: &str, query: &[(&str, &str)]) -> Result<Vec<Item>> {
        let container: MetadataContainer = self.get_json(path, query).await?;
        Ok(container
            .metadata
            .into_iter()
            .map(|meta| Arc::new(PlexItem::new(self.clone(), meta)) as Item)
            .collect())
    }
}

/// Opens sessions against the configured Plex server.
pub struct PlexConnector {
    base_url: Url,
    token: String,
}

impl PlexConnector {
    pub fn new(config: &PlexConfig) -> Self {
        Self {
            base_url: config.url.clone(),
            token: config.token.clone(),
        }
    }
}

#[async_trait]
impl SessionOpener for PlexConnector {
    async fn open_session(&self) -> Result<Session> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(PlexError::from)
            .context("Failed to create HTTP client")?;

        Ok(Arc::new(PlexSession {
            http: Arc::new(PlexHttp {
                client,
                base_url: self.base_url.clone(),
                token: self.token.clone(),
            }),
        }))
    }
}

pub struct PlexSession {
    http: Arc<PlexHttp>,
}

#[async_trait]
impl MediaSession for PlexSession {
    async fn identity(&self) -> Result<ServerIdentity> {
        let identity: IdentityContainer = self.http.get_json("/", &[]).await?;
        Ok(ServerIdentity {
            name: identity.friendly_name,
            version: identity.version,
            platform: identity.platform,
        })
    }

    async fn library_sections(&self) -> Result<Vec<Library>> {
        let sections: SectionsContainer = self.http.get_json("/library/sections", &[]).await?;
        Ok(sections
            .directory
            .into_iter()
            .map(|dir| Arc::new(PlexSection::new(self.http.clone(), dir)) as Library)
            .collect())
    }
}

pub struct PlexSection {
    http: Arc<PlexHttp>,
    directory: PlexDirectory,
    kind: LibraryKind,
}

impl PlexSection {
    fn new(http: Arc<PlexHttp>, directory: PlexDirectory) -> Self {
        let kind = LibraryKind::from_type_name(&directory.section_type);
        Self {
            http,
            directory,
            kind,
        }
    }
}

#[async_trait]
impl LibrarySection for PlexSection {
    fn title(&self) -> &str {
        &self.directory.title
    }

    fn kind(&self) -> LibraryKind {
        self.kind
    }

    fn type_name(&self) -> &str {
        &self.directory.section_type
    }

    async fn search(&self, pattern: &str) -> Result<Vec<Item>> {
        let path = format!("/library/sections/{}/all", self.directory.key);
        // Show sections are searched at episode level; a show-level hit has no
        // concrete episode to refresh.
        match self.kind {
            LibraryKind::Movie => {
                self.http
                    .metadata(&path, &[("type", MOVIE_TYPE), ("title", pattern)])
                    .await
            }
            LibraryKind::Show => {
                self.http
                    .metadata(&path, &[("type", EPISODE_TYPE), ("title", pattern)])
                    .await
            }
            LibraryKind::Other => self.http.metadata(&path, &[("title", pattern)]).await,
        }
    }

    async fn all(&self) -> Result<Vec<Item>> {
        let path = format!("/library/sections/{}/all", self.directory.key);
        self.http.metadata(&path, &[]).await
    }
}

pub struct PlexItem {
    http: Arc<PlexHttp>,
    meta: PlexMetadata,
    kind: ItemKind,
}

impl PlexItem {
    fn new(http: Arc<PlexHttp>, meta: PlexMetadata) -> Self {
        let kind = ItemKind::from_type_name(&meta.item_type);
        Self { http, meta, kind }
    }
}

#[async_trait]
impl MediaItem for PlexItem {
    fn title(&self) -> &str {
        &self.meta.title
    }

    fn kind(&self) -> ItemKind {
        self.kind
    }

    fn year(&self) -> Option<i32> {
        self.meta.year
    }

    fn series_title(&self) -> Option<&str> {
        self.meta.grandparent_title.as_deref()
    }

    fn season_index(&self) -> Option<u32> {
        self.meta.parent_index
    }

    fn episode_index(&self) -> Option<u32> {
        self.meta.index
    }

    async fn episodes(&self) -> Result<Vec<Item>> {
        let path = format!("/library/metadata/{}/allLeaves", self.meta.rating_key);
        self.http.metadata(&path, &[]).await
    }

    async fn refresh(&self) -> Result<()> {
        let path = format!("/library/metadata/{}/refresh", self.meta.rating_key);
        self.http.put(&path).await
    }
}
