//! Error types surfaced at process or cycle boundaries.
//!
//! Anything narrower (one library scan, one refresh call) is handled where it
//! happens and only logged, so it never needs a variant here.

use thiserror::Error;

/// Startup configuration problems. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration must be a YAML mapping")]
    NotAMapping,

    #[error("Missing required section: {0}")]
    MissingSection(&'static str),

    #[error("Invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid Plex URL format: {0}")]
    InvalidUrl(String),

    #[error("Invalid Plex token format")]
    InvalidToken,

    #[error("Cannot write to log directory {path}: {source}")]
    LogDirectory {
        path: String,
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors that escape a refresh cycle and reach the scheduler loop.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Library not found: {0}")]
    LibraryNotFound(String),

    #[error("Failed to list library sections: {0:#}")]
    Sections(anyhow::Error),
}

/// Errors raised by the Plex HTTP client.
#[derive(Debug, Error)]
pub enum PlexError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Plex returned HTTP {status} for {path}")]
    HttpStatus { status: u16, path: String },

    #[error("Invalid Plex URL: {0}")]
    Url(#[from] url::ParseError),
}
