//! Logging setup: console output plus a size-rotated log file.
//!
//! The console layer is the stock `tracing_subscriber` formatter (text or
//! JSON). The file is written by [FileLoggingLayer], which flattens each event
//! into one line and hands it to a [RotatingFile].

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ConfigError;

/// One log record as written to the file in JSON mode.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, JsonValue>,
}

impl LogEvent {
    fn to_text(&self) -> String {
        let mut line = format!(
            "{} {:<5} {}: {}",
            self.timestamp, self.level, self.target, self.message
        );
        for (key, value) in &self.fields {
            match value {
                JsonValue::String(s) => line.push_str(&format!(" {}={}", key, s)),
                other => line.push_str(&format!(" {}={}", key, other)),
            }
        }
        line
    }
}

/// Append-only file that rolls over once it grows past `max_bytes`.
///
/// Rotated files are `<name>.1` (newest) through `<name>.<backup_count>`
/// (oldest). With `backup_count == 0` the file is truncated instead.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    file: File,
    size: u64,
}

impl RotatingFile {
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backup_count: usize) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            backup_count,
            file,
            size,
        })
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        let len = line.len() as u64 + 1;
        if self.size > 0 && self.size + len > self.max_bytes {
            self.rotate()?;
        }
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.size += len;
        Ok(())
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backup_count == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            self.size = 0;
            return Ok(());
        }

        let oldest = self.backup_path(self.backup_count);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.backup_count).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;

        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

/// Tracing layer that writes every event at or above `min_level` to a file.
pub struct FileLoggingLayer {
    min_level: Level,
    format: LogFormat,
    file: Mutex<RotatingFile>,
}

impl FileLoggingLayer {
    pub fn new(min_level: Level, format: LogFormat, file: RotatingFile) -> Self {
        Self {
            min_level,
            format,
            file: Mutex::new(file),
        }
    }
}

/// Collects an event's fields; `message` is kept apart as the line text.
#[derive(Default)]
struct FieldVisitor {
    fields: BTreeMap<String, JsonValue>,
    message: Option<String>,
}

impl FieldVisitor {
    fn record(&mut self, field: &Field, value: JsonValue) {
        match (field.name(), value) {
            ("message", JsonValue::String(text)) => self.message = Some(text),
            (name, value) => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record(field, JsonValue::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, JsonValue::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record(field, value.into());
    }
}

impl<S> Layer<S> for FileLoggingLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > self.min_level {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let timestamp = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();

        let log_event = LogEvent {
            timestamp,
            level: level.as_str().to_string(),
            target: event.metadata().target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        };

        let line = match self.format {
            LogFormat::Json => match serde_json::to_string(&log_event) {
                Ok(line) => line,
                Err(_) => return,
            },
            LogFormat::Text => log_event.to_text(),
        };

        // Nowhere left to report a failed log write.
        let _ = self.file.lock().write_line(&line);
    }
}

/// Create the log directory if needed and prove it is writable.
pub fn ensure_log_dir(file: &Path) -> Result<(), ConfigError> {
    let dir = match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let err = |source: io::Error| ConfigError::LogDirectory {
        path: dir.display().to_string(),
        source,
    };

    fs::create_dir_all(dir).map_err(err)?;
    let probe = dir.join(".test_write");
    File::create(&probe).map_err(err)?;
    fs::remove_file(&probe).map_err(err)?;
    Ok(())
}

/// Default filter when `RUST_LOG` is unset: the configured level for our own
/// crate and everything else, with the HTTP stack held at `info`.
fn default_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_lowercase();
    EnvFilter::new(format!("{level},hyper=info,hyper_util=info,reqwest=info"))
}

/// Install the global tracing subscriber. Call once, before any cycle runs.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    ensure_log_dir(&config.file)?;
    let file = RotatingFile::open(&config.file, config.max_size_bytes, config.backup_count)
        .map_err(|source| ConfigError::LogDirectory {
            path: config.file.display().to_string(),
            source,
        })?;

    let (text_layer, json_layer) = match config.format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config.level)))
        .with(text_layer)
        .with(json_layer)
        .with(FileLoggingLayer::new(config.level, config.format, file))
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotating_file_rolls_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut file = RotatingFile::open(&path, 20, 2).unwrap();

        file.write_line("first line here").unwrap();
        file.write_line("second line here").unwrap();
        file.write_line("third line here").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "third line here\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("app.log.1")).unwrap(),
            "second line here\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("app.log.2")).unwrap(),
            "first line here\n"
        );
    }

    #[test]
    fn test_rotating_file_drops_oldest_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut file = RotatingFile::open(&path, 5, 1).unwrap();

        for line in ["aaaa", "bbbb", "cccc"] {
            file.write_line(line).unwrap();
        }

        assert_eq!(fs::read_to_string(&path).unwrap(), "cccc\n");
        assert_eq!(fs::read_to_string(dir.path().join("app.log.1")).unwrap(), "bbbb\n");
        assert!(!dir.path().join("app.log.2").exists());
    }

    #[test]
    fn test_zero_backups_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut file = RotatingFile::open(&path, 5, 0).unwrap();

        file.write_line("aaaa").unwrap();
        file.write_line("bbbb").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "bbbb\n");
        assert!(!dir.path().join("app.log.1").exists());
    }

    #[test]
    fn test_reopen_keeps_existing_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "0123456789\n").unwrap();

        let mut file = RotatingFile::open(&path, 12, 1).unwrap();
        file.write_line("x").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "x\n");
    }

    #[test]
    fn test_ensure_log_dir_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested/logs/app.log");
        ensure_log_dir(&file).unwrap();
        assert!(dir.path().join("nested/logs").is_dir());
        assert!(!dir.path().join("nested/logs/.test_write").exists());
    }

    #[test]
    fn test_layer_writes_events_at_or_above_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let file = RotatingFile::open(&path, 1024 * 1024, 1).unwrap();
        let subscriber = tracing_subscriber::registry().with(FileLoggingLayer::new(
            Level::INFO,
            LogFormat::Text,
            file,
        ));

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("too chatty");
            tracing::info!(attempt = 2u64, library = "Movies", "hello");
        });

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" INFO  tba_refresher::services::logging::tests: "));
        assert!(lines[0].ends_with(": hello attempt=2 library=Movies"), "{}", lines[0]);
    }

    #[test]
    fn test_text_line_includes_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("library".to_string(), JsonValue::String("Movies".to_string()));
        fields.insert("attempt".to_string(), JsonValue::Number(2.into()));
        let event = LogEvent {
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            level: "INFO".to_string(),
            target: "tba_refresher".to_string(),
            message: "hello".to_string(),
            fields,
        };
        assert_eq!(
            event.to_text(),
            "2026-01-01T00:00:00Z INFO  tba_refresher: hello attempt=2 library=Movies"
        );
    }
}
