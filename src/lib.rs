//! TBA Refresher - finds Plex items with placeholder titles and refreshes them
//!
//! The binary in `main.rs` wires these modules together; the library split
//! exists so the refresh engine can be driven against fake servers in tests.

pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod media;
pub mod services;
