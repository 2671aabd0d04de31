//! Session establishment with bounded retry
//!
//! A session only counts as connected once the server has answered an
//! identity request and listed its library sections. Failures back off
//! exponentially between attempts; after the last attempt the caller gets
//! `None` and skips the cycle.

use std::time::Duration;

use anyhow::Result;
use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use tracing::{error, info};

use crate::media::{Session, SessionOpener};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of connection attempts
    pub max_attempts: u32,
    /// Backoff before the second attempt
    pub initial_interval: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a deterministic ExponentialBackoff from this config
    pub fn to_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            initial_interval: self.initial_interval,
            randomization_factor: 0.0,
            multiplier: self.multiplier,
            max_interval: self.initial_interval.saturating_mul(1 << self.max_attempts.min(16)),
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Open a session and prove it is usable.
///
/// Authentication failures are retried exactly like network failures.
pub async fn connect(opener: &dyn SessionOpener, retry: &RetryConfig) -> Option<Session> {
    let mut backoff = retry.to_backoff();

    for attempt in 1..=retry.max_attempts {
        match open_and_verify(opener).await {
            Ok(session) => return Some(session),
            Err(e) => {
                error!(
                    attempt = attempt,
                    max_attempts = retry.max_attempts,
                    error = %format!("{:#}", e),
                    "Connection attempt {}/{} failed",
                    attempt,
                    retry.max_attempts
                );
                if attempt < retry.max_attempts {
                    if let Some(delay) = backoff.next_backoff() {
                        info!(retry_in_secs = delay.as_secs_f64(), "Retrying connection");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    error!(
        attempts = retry.max_attempts,
        "Failed to establish Plex connection after all retries"
    );
    None
}

async fn open_and_verify(opener: &dyn SessionOpener) -> Result<Session> {
    let session = opener.open_session().await?;

    let identity = session.identity().await?;
    info!(
        server = %identity.name,
        version = %identity.version,
        platform = %identity.platform,
        "Connected to Plex server: {}",
        identity
    );

    let libraries = session.library_sections().await?;
    let names: Vec<&str> = libraries.iter().map(|l| l.title()).collect();
    info!(
        count = libraries.len(),
        "Found {} libraries: {}",
        libraries.len(),
        names.join(", ")
    );

    Ok(session)
}
