//! Minimal CLI parsing for config path and mode overrides.

use std::env;
use std::path::PathBuf;

/// What the process should do after loading config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    /// Normal refresh loop (dry-run or continuous, per config).
    #[default]
    Run,
    /// Print raw server search results per library and pattern, then exit.
    TestSearch,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub config_path: Option<PathBuf>,
    pub force_dry_run: bool,
    pub command: Command,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--dry-run" => options.force_dry_run = true,
                "--test-search" => options.command = Command::TestSearch,
                "--config" => {
                    if let Some(value) = args.next() {
                        options.config_path = Some(PathBuf::from(value));
                    }
                }
                _ if arg.starts_with("--config=") => {
                    if let Some(value) = arg.split_once('=').map(|(_, v)| v) {
                        options.config_path = Some(PathBuf::from(value));
                    }
                }
                _ => {}
            }
        }
        options
    }
}
