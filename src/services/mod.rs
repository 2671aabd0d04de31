//! Refresh engine services and the Plex integration

pub mod connection;
pub mod logging;
pub mod plex;
pub mod refresher;
pub mod report;
pub mod search;

pub use connection::{RetryConfig, connect};
pub use logging::init_logging;
pub use plex::PlexConnector;
pub use refresher::{CycleOutcome, CycleReport, RefreshContext, run_cycle};
