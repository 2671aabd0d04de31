//! Application configuration management
//!
//! Settings come from a YAML file with four sections (`plex`, `search`,
//! `refresh`, `logging`). `PLEX_URL` and `PLEX_TOKEN` in the environment take
//! precedence over the file. The result is validated once and treated as
//! immutable for the life of the process.

use std::collections::BTreeSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use tracing::Level;
use url::Url;

use crate::error::ConfigError;

/// Used when neither `--config` nor `TBA_REFRESHER_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "/app/data/config.yaml";

pub const MIN_INTERVAL_SECONDS: u64 = 60;
pub const MIN_ITEM_DELAY_SECONDS: u64 = 1;
pub const MAX_ITEM_DELAY_SECONDS: u64 = 30;
pub const MIN_TOKEN_LENGTH: usize = 20;

/// Validated application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub plex: PlexConfig,
    pub search: SearchConfig,
    pub refresh: RefreshConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone)]
pub struct PlexConfig {
    /// Server base URL, e.g. `http://plex:32400`
    pub url: Url,

    /// X-Plex-Token
    pub token: String,

    /// Library names to scan. `None` scans every library the server reports.
    pub libraries: Option<Vec<String>>,
}

impl std::fmt::Debug for PlexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlexConfig")
            .field("url", &self.url.as_str())
            .field("token", &"<redacted>")
            .field("libraries", &self.libraries)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMethod {
    /// Delegate matching to the server's title search.
    Quick,
    /// Enumerate the whole library and match client-side.
    Deep,
}

impl SearchMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Deep => "deep",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub method: SearchMethod,
    pub patterns: Vec<String>,
    pub case_sensitive: bool,
    /// Deep search: match episodes against "{series} - {title}" instead of
    /// the bare episode title.
    pub include_full_title: bool,
    /// Deep search: scan at most this many episodes per show.
    pub episode_scan_limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub interval: Duration,
    pub delay_between_items: Duration,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
    pub file: PathBuf,
    pub max_size_bytes: u64,
    pub backup_count: usize,
}

/// Values read from the environment that override the file.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub plex_url: Option<String>,
    pub plex_token: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            plex_url: env::var("PLEX_URL").ok().filter(|v| !v.is_empty()),
            plex_token: env::var("PLEX_TOKEN").ok().filter(|v| !v.is_empty()),
        }
    }
}

#[derive(Deserialize)]
struct RawPlex {
    url: Option<String>,
    token: Option<String>,
    libraries: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct RawSearch {
    method: Option<String>,
    patterns: Option<Vec<String>>,
    case_sensitive: Option<bool>,
    include_full_title: Option<bool>,
    episode_scan_limit: Option<usize>,
}

#[derive(Deserialize)]
struct RawRefresh {
    interval_seconds: Option<u64>,
    delay_between_items: Option<u64>,
    dry_run: Option<bool>,
}

#[derive(Deserialize)]
struct RawLogging {
    level: Option<String>,
    format: Option<String>,
    file: Option<String>,
    max_size_mb: Option<u64>,
    backup_count: Option<usize>,
}

const PLEX_FIELDS: &[&str] = &["url", "token", "libraries"];
const SEARCH_FIELDS: &[&str] = &[
    "method",
    "patterns",
    "case_sensitive",
    "include_full_title",
    "episode_scan_limit",
];
const REFRESH_FIELDS: &[&str] = &["interval_seconds", "delay_between_items", "dry_run"];
const LOGGING_FIELDS: &[&str] = &["level", "format", "file", "max_size_mb", "backup_count"];

impl Config {
    /// Resolve the config file path: explicit argument, then
    /// `TBA_REFRESHER_CONFIG`, then [DEFAULT_CONFIG_PATH].
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var_os("TBA_REFRESHER_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load and validate a config file. Returns the config plus any
    /// non-fatal warnings (unknown keys), to be logged once logging is up.
    pub fn load(path: &Path, overrides: &EnvOverrides) -> Result<(Self, Vec<String>), ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&contents, overrides)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(
        contents: &str,
        overrides: &EnvOverrides,
    ) -> Result<(Self, Vec<String>), ConfigError> {
        let root: Value = serde_yaml::from_str(contents)?;
        let root = root.as_mapping().ok_or(ConfigError::NotAMapping)?;
        let mut warnings = Vec::new();

        let raw_plex: RawPlex = section(root, "plex", PLEX_FIELDS, &mut warnings)?;
        let raw_search: RawSearch = section(root, "search", SEARCH_FIELDS, &mut warnings)?;
        let raw_refresh: RawRefresh = section(root, "refresh", REFRESH_FIELDS, &mut warnings)?;
        let raw_logging: RawLogging = section(root, "logging", LOGGING_FIELDS, &mut warnings)?;

        let config = Self {
            plex: validate_plex(raw_plex, overrides)?,
            search: validate_search(raw_search)?,
            refresh: validate_refresh(raw_refresh)?,
            logging: validate_logging(raw_logging)?,
        };
        Ok((config, warnings))
    }
}

fn section<T: DeserializeOwned>(
    root: &Mapping,
    name: &'static str,
    known: &[&str],
    warnings: &mut Vec<String>,
) -> Result<T, ConfigError> {
    let value = root.get(name).ok_or(ConfigError::MissingSection(name))?;
    let mapping = value
        .as_mapping()
        .ok_or_else(|| ConfigError::invalid(name, "expected a mapping"))?;

    let unknown: BTreeSet<String> = mapping
        .keys()
        .filter_map(|k| k.as_str())
        .filter(|k| !known.contains(k))
        .map(str::to_string)
        .collect();
    if !unknown.is_empty() {
        warnings.push(format!(
            "Unknown fields in {} configuration: {}",
            name,
            unknown.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    serde_yaml::from_value(value.clone()).map_err(|e| ConfigError::invalid(name, e.to_string()))
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::invalid(field, "missing required field"))
}

fn validate_plex(raw: RawPlex, overrides: &EnvOverrides) -> Result<PlexConfig, ConfigError> {
    let url = overrides.plex_url.clone().or(raw.url);
    let url = required(url, "plex.url")?;
    let parsed = Url::parse(&url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
    if !parsed.has_host() || !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(url));
    }

    let token = required(overrides.plex_token.clone().or(raw.token), "plex.token")?;
    if token.len() < MIN_TOKEN_LENGTH {
        return Err(ConfigError::InvalidToken);
    }

    let libraries = raw.libraries.filter(|l| !l.is_empty());

    Ok(PlexConfig {
        url: parsed,
        token,
        libraries,
    })
}

fn validate_search(raw: RawSearch) -> Result<SearchConfig, ConfigError> {
    let method = match raw.method.as_deref() {
        None | Some("quick") => SearchMethod::Quick,
        Some("deep") => SearchMethod::Deep,
        Some(other) => {
            return Err(ConfigError::invalid(
                "search.method",
                format!("'{}' is not one of: quick, deep", other),
            ));
        }
    };

    Ok(SearchConfig {
        method,
        patterns: required(raw.patterns, "search.patterns")?,
        case_sensitive: raw.case_sensitive.unwrap_or(false),
        include_full_title: raw.include_full_title.unwrap_or(false),
        // Zero means "no limit", same as leaving it out.
        episode_scan_limit: raw.episode_scan_limit.filter(|n| *n > 0),
    })
}

fn validate_refresh(raw: RawRefresh) -> Result<RefreshConfig, ConfigError> {
    let interval = required(raw.interval_seconds, "refresh.interval_seconds")?;
    if interval < MIN_INTERVAL_SECONDS {
        return Err(ConfigError::invalid(
            "refresh.interval_seconds",
            format!("must be at least {}", MIN_INTERVAL_SECONDS),
        ));
    }

    let delay = required(raw.delay_between_items, "refresh.delay_between_items")?;
    if !(MIN_ITEM_DELAY_SECONDS..=MAX_ITEM_DELAY_SECONDS).contains(&delay) {
        return Err(ConfigError::invalid(
            "refresh.delay_between_items",
            format!(
                "must be between {} and {}",
                MIN_ITEM_DELAY_SECONDS, MAX_ITEM_DELAY_SECONDS
            ),
        ));
    }

    Ok(RefreshConfig {
        interval: Duration::from_secs(interval),
        delay_between_items: Duration::from_secs(delay),
        dry_run: raw.dry_run.unwrap_or(true),
    })
}

fn validate_logging(raw: RawLogging) -> Result<LoggingConfig, ConfigError> {
    let level = required(raw.level, "logging.level")?;
    let level = match level.to_ascii_uppercase().as_str() {
        "DEBUG" => Level::DEBUG,
        "INFO" => Level::INFO,
        "WARNING" | "WARN" => Level::WARN,
        "ERROR" | "CRITICAL" => Level::ERROR,
        _ => {
            return Err(ConfigError::invalid(
                "logging.level",
                format!(
                    "'{}' is not one of: DEBUG, INFO, WARNING, ERROR, CRITICAL",
                    level
                ),
            ));
        }
    };

    let format = match raw.format.as_deref() {
        None | Some("text") => LogFormat::Text,
        Some("json") => LogFormat::Json,
        Some(other) => {
            return Err(ConfigError::invalid(
                "logging.format",
                format!("'{}' is not one of: text, json", other),
            ));
        }
    };

    let max_size_mb = required(raw.max_size_mb, "logging.max_size_mb")?;
    if max_size_mb < 1 {
        return Err(ConfigError::invalid("logging.max_size_mb", "must be at least 1"));
    }
    let max_size_bytes = max_size_mb
        .checked_mul(1024 * 1024)
        .ok_or_else(|| ConfigError::invalid("logging.max_size_mb", "value is too large"))?;

    Ok(LoggingConfig {
        level,
        format,
        file: PathBuf::from(required(raw.file, "logging.file")?),
        max_size_bytes,
        backup_count: required(raw.backup_count, "logging.backup_count")?,
    })
}
