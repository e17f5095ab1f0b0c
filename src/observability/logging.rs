//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Default filter directive.
const DEFAULT_DIRECTIVE: &str = "info";

/// Filter directive used with `--verbose`.
const VERBOSE_DIRECTIVE: &str = "debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; anything but `json` is pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `tracing_subscriber::EnvFilter` directive.
    pub directive: String,
    /// Optional log file; stderr when absent.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            directive: DEFAULT_DIRECTIVE.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from config settings with env overrides.
    ///
    /// The filter comes from `NOTECLASS_LOG`, then `RUST_LOG`, then `--verbose`,
    /// then the configured level. `NOTECLASS_LOG_FORMAT` overrides the format.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        Self::resolve(settings, verbose, |key| std::env::var(key).ok())
    }

    fn resolve<F>(settings: Option<&LoggingSettings>, verbose: bool, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let directive = env("NOTECLASS_LOG")
            .or_else(|| env("RUST_LOG"))
            .or_else(|| verbose.then(|| VERBOSE_DIRECTIVE.to_string()))
            .or_else(|| settings.and_then(|s| s.level.clone()))
            .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string());

        let format = env("NOTECLASS_LOG_FORMAT")
            .or_else(|| settings.and_then(|s| s.format.clone()))
            .map(|f| LogFormat::parse(&f))
            .unwrap_or_default();

        Self {
            format,
            directive,
            file: settings.and_then(|s| s.file.clone()),
        }
    }
}
