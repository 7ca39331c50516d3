//! Structured logging for kaiord
//!
//! Two layers: `init_logging` wires a `tracing` subscriber for the binary,
//! and the [`Logger`] trait is the collaborator the format adapters report
//! through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

/// Logging section of the converter config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,

    /// Console format; file output is always JSON
    pub format: LogFormat,

    /// Mirror events into this file as well as stderr
    pub file_path: Option<PathBuf>,

    /// Roll the file daily instead of appending forever
    pub rotation: bool,

    /// Emit span enter/close events
    pub include_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            file_path: None,
            rotation: true,
            include_spans: false,
        }
    }
}

/// Severity, shared by the subscriber filter and [`RecordingLogger`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

const LEVELS: [(LogLevel, &str); 5] = [
    (LogLevel::Error, "error"),
    (LogLevel::Warn, "warn"),
    (LogLevel::Info, "info"),
    (LogLevel::Debug, "debug"),
    (LogLevel::Trace, "trace"),
];

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        LEVELS
            .iter()
            .find(|(level, _)| *level == self)
            .map_or("info", |(_, name)| name)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        let name = if lower == "warning" { "warn" } else { lower.as_str() };
        LEVELS
            .iter()
            .find(|(_, known)| *known == name)
            .map(|(level, _)| *level)
            .ok_or_else(|| format!("unknown log level '{}'", s))
    }
}

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, with source locations
    Pretty,
    /// One JSON object per event
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("unknown log format '{}'", s)),
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber for the binary.
///
/// `RUST_LOG` wins over the configured level when set. Fails if a
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kaiord={}", config.level)));

    let mut layers = vec![console_layer(config)];
    if let Some(path) = &config.file_path {
        layers.push(file_layer(config, path)?);
    }

    tracing_subscriber::registry()
        .with(layers.with_filter(filter))
        .try_init()?;

    tracing::debug!(
        level = %config.level,
        format = ?config.format,
        file = ?config.file_path,
        "Logging initialized"
    );
    Ok(())
}

fn console_layer(config: &LogConfig) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    match config.format {
        LogFormat::Pretty => layer
            .pretty()
            .with_span_events(if config.include_spans {
                FmtSpan::ENTER | FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            })
            .boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(config.include_spans)
            .with_span_list(config.include_spans)
            .boxed(),
        LogFormat::Compact => layer.compact().without_time().boxed(),
    }
}

fn file_layer(config: &LogConfig, path: &Path) -> anyhow::Result<BoxedLayer> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(config.include_spans)
        .with_span_list(config.include_spans);

    if config.rotation {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("kaiord.log");
        let appender = tracing_appender::rolling::daily(dir, name);
        Ok(layer.with_writer(appender).boxed())
    } else {
        let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(layer.with_writer(Mutex::new(file)).boxed())
    }
}

/// Structured key/value context attached to a log call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogContext {
    fields: BTreeMap<String, String>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl std::fmt::Display for LogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (key, value) in &self.fields {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        Ok(())
    }
}

/// Side-channel logger handed to the format adapters.
///
/// Adapters call `debug` when an operation starts, `info` when it succeeds,
/// `warn` on recoverable structural issues and `error` on failure. Nothing is
/// ever read back.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str, context: Option<&LogContext>);
    fn info(&self, message: &str, context: Option<&LogContext>);
    fn warn(&self, message: &str, context: Option<&LogContext>);
    fn error(&self, message: &str, context: Option<&LogContext>);
}

/// Forwards to `tracing`, tagging every event with the adapter component
#[derive(Debug, Clone, Copy)]
pub struct TracingLogger {
    component: &'static str,
}

impl TracingLogger {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("kaiord")
    }
}

fn render(context: Option<&LogContext>) -> String {
    context.map(ToString::to_string).unwrap_or_default()
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str, context: Option<&LogContext>) {
        debug!(component = self.component, context = %render(context), "{}", message);
    }

    fn info(&self, message: &str, context: Option<&LogContext>) {
        info!(component = self.component, context = %render(context), "{}", message);
    }

    fn warn(&self, message: &str, context: Option<&LogContext>) {
        warn!(component = self.component, context = %render(context), "{}", message);
    }

    fn error(&self, message: &str, context: Option<&LogContext>) {
        error!(component = self.component, context = %render(context), "{}", message);
    }
}

/// A captured log call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub context: Option<LogContext>,
    pub timestamp: DateTime<Utc>,
}

/// Keeps every call in memory; cheap to clone, clones share the trail
#[derive(Debug, Clone, Default)]
pub struct RecordingLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, level: LogLevel, message: &str, context: Option<&LogContext>) {
        let entry = LogEntry {
            level,
            message: message.to_string(),
            context: context.cloned(),
            timestamp: Utc::now(),
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    /// Snapshot of the trail so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries()
            .iter()
            .filter(|entry| entry.level == level)
            .count()
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, message: &str, context: Option<&LogContext>) {
        self.record(LogLevel::Debug, message, context);
    }

    fn info(&self, message: &str, context: Option<&LogContext>) {
        self.record(LogLevel::Info, message, context);
    }

    fn warn(&self, message: &str, context: Option<&LogContext>) {
        self.record(LogLevel::Warn, message, context);
    }

    fn error(&self, message: &str, context: Option<&LogContext>) {
        self.record(LogLevel::Error, message, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert!(LogLevel::Error < LogLevel::Info);
    }

    #[test]
    fn test_format_names() {
        assert_eq!("Json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_context_display() {
        let context = LogContext::new().with("steps", 3).with("format", "FIT");
        assert_eq!(context.to_string(), "format=FIT steps=3");
        assert_eq!(context.get("steps"), Some("3"));
    }

    #[test]
    fn test_recording_logger_shares_trail() {
        let logger = RecordingLogger::new();
        let handle = logger.clone();
        logger.debug("start", None);
        logger.info("done", Some(&LogContext::new().with("bytes", 42)));
        logger.warn("dropped target", None);

        assert_eq!(handle.entries().len(), 3);
        assert_eq!(handle.count(LogLevel::Warn), 1);
        let done = &handle.entries()[1];
        assert_eq!(done.message, "done");
        assert_eq!(done.context.as_ref().and_then(|c| c.get("bytes")), Some("42"));
    }

    #[test]
    fn test_log_config_defaults_from_partial_toml() {
        let config: LogConfig = toml::from_str("level = \"debug\"").unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Compact);
    }
}
