//! Configuration management.
//!
//! The service reads a single YAML file at startup:
//!
//! ```yaml
//! model_path: models/sentiment.json
//! tokens:
//!   - abc123
//! record_enabled: true
//! record_path: record.xls
//! host: 127.0.0.1
//! port: 3001
//! max_content_length: 3000
//! max_body_bytes: 16777216
//!
//! max_concurrent_predictions: 4
//! prediction_acquire_timeout_ms: 0
//! prediction_fail_fast: false
//!
//! logging:
//!   format: json
//!   level: info
//!   file: logs/noteclass.log
//!
//! metrics:
//!   enabled: true
//!   port: 9090
//! ```
//!
//! `model_path` and a non-empty `tokens` list are required; everything else
//! has a default.

use crate::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default path of the record file.
pub const DEFAULT_RECORD_PATH: &str = "record.xls";

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 3001;

/// Default maximum note length (in characters) passed to the model.
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 3000;

/// Default limit on request body size in bytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Default Prometheus exporter port.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Message reported when required fields are absent.
pub const MISSING_REQUIRED_MESSAGE: &str = "Model path or tokens missing in config.";

/// Main configuration for the service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Path to the classifier model file.
    pub model_path: PathBuf,
    /// Accepted bearer tokens.
    pub tokens: Vec<SecretString>,
    /// Path of the append-only record file.
    pub record_path: PathBuf,
    /// Host to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Whether successful predictions are appended to the record file.
    pub record_enabled: bool,
    /// Maximum number of characters passed to the model.
    pub max_content_length: usize,
    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
    /// Prediction worker pool settings.
    pub prediction: PredictionSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
    /// Problems found while loading that did not prevent startup.
    ///
    /// Loading happens before logging is initialized, so these are reported
    /// by the caller afterwards.
    pub warnings: Vec<String>,
}

/// Bounds on concurrent model invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionSettings {
    /// Maximum predictions running at once.
    pub max_concurrent: usize,
    /// Permit acquisition timeout in milliseconds (0 = wait indefinitely).
    pub acquire_timeout_ms: u64,
    /// Reject immediately instead of waiting when no permit is free.
    pub fail_fast: bool,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            max_concurrent: std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get),
            acquire_timeout_ms: 0,
            fail_fast: false,
        }
    }
}

/// Logging section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Output format: `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive, e.g. `info` or `noteclass=debug`.
    pub level: Option<String>,
    /// Optional log file (appended to instead of stderr).
    pub file: Option<PathBuf>,
}

/// Metrics section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSettings {
    /// Whether the Prometheus exporter is installed.
    pub enabled: bool,
    /// Exporter listen port.
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: DEFAULT_METRICS_PORT,
        }
    }
}

/// Configuration file structure (for YAML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Model path.
    pub model_path: Option<String>,
    /// Accepted tokens.
    pub tokens: Option<Vec<String>>,
    /// Record file path.
    pub record_path: Option<String>,
    /// Bind host.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<u16>,
    /// Recording flag.
    pub record_enabled: Option<bool>,
    /// Truncation length.
    pub max_content_length: Option<usize>,
    /// Request body limit.
    pub max_body_bytes: Option<usize>,
    /// Bulkhead size.
    pub max_concurrent_predictions: Option<usize>,
    /// Bulkhead permit timeout.
    pub prediction_acquire_timeout_ms: Option<u64>,
    /// Bulkhead fail-fast flag.
    pub prediction_fail_fast: Option<bool>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
    /// Metrics section.
    pub metrics: Option<ConfigFileMetrics>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Output format.
    pub format: Option<String>,
    /// Filter directive.
    pub level: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

/// Metrics section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMetrics {
    /// Exporter flag.
    pub enabled: Option<bool>,
    /// Exporter port.
    pub port: Option<u16>,
}

impl ServiceConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed, or if
    /// `model_path` or `tokens` is missing.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

        Self::load_from_str(&contents)
    }

    /// Parses configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text cannot be parsed or if required
    /// fields are missing.
    pub fn load_from_str(contents: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a map.
        let file: ConfigFile = if contents.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml_ng::from_str(contents).map_err(|e| Error::Config(e.to_string()))?
        };

        Self::from_config_file(file)
    }

    /// Converts a `ConfigFile` to `ServiceConfig`, applying defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] with [`MISSING_REQUIRED_MESSAGE`] if the model
    /// path is empty or no usable token is configured.
    pub fn from_config_file(file: ConfigFile) -> Result<Self> {
        let model_path = file
            .model_path
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        let mut warnings = Vec::new();

        // Credentials are trimmed before lookup, so configured tokens are too.
        let configured = file.tokens.unwrap_or_default();
        let configured_count = configured.len();
        let tokens: Vec<SecretString> = configured
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| SecretString::from(t.to_owned()))
            .collect();
        if tokens.len() < configured_count {
            warnings.push(format!(
                "ignored {} blank entries in tokens",
                configured_count - tokens.len()
            ));
        }

        let (Some(model_path), false) = (model_path, tokens.is_empty()) else {
            return Err(Error::Config(MISSING_REQUIRED_MESSAGE.to_string()));
        };

        let mut prediction = PredictionSettings::default();
        if let Some(max) = file.max_concurrent_predictions {
            prediction.max_concurrent = max.max(1);
        }
        if let Some(timeout_ms) = file.prediction_acquire_timeout_ms {
            prediction.acquire_timeout_ms = timeout_ms;
        }
        if let Some(fail_fast) = file.prediction_fail_fast {
            prediction.fail_fast = fail_fast;
        }

        let logging = file
            .logging
            .map(|section| LoggingSettings {
                format: section.format,
                level: section.level,
                file: section.file.map(PathBuf::from),
            })
            .unwrap_or_default();

        let mut metrics = MetricsSettings::default();
        if let Some(section) = file.metrics {
            if let Some(enabled) = section.enabled {
                metrics.enabled = enabled;
            }
            if let Some(port) = section.port {
                metrics.port = port;
            }
        }

        Ok(Self {
            model_path: PathBuf::from(model_path),
            tokens,
            record_path: PathBuf::from(
                file.record_path
                    .unwrap_or_else(|| DEFAULT_RECORD_PATH.to_string()),
            ),
            host: file.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: file.port.unwrap_or(DEFAULT_PORT),
            record_enabled: file.record_enabled.unwrap_or(false),
            max_content_length: file
                .max_content_length
                .unwrap_or(DEFAULT_MAX_CONTENT_LENGTH),
            max_body_bytes: file.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES),
            prediction,
            logging,
            metrics,
            warnings,
        })
    }

    /// Applies `NOTECLASS_*` environment variable overrides.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `NOTECLASS_HOST` | `host` |
    /// | `NOTECLASS_PORT` | `port` |
    /// | `NOTECLASS_RECORD_ENABLED` | `record_enabled` |
    /// | `NOTECLASS_RECORD_PATH` | `record_path` |
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(host) = value("NOTECLASS_HOST") {
            self.host = host;
        }
        if let Some(port) = value("NOTECLASS_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(e) => self
                    .warnings
                    .push(format!("ignored invalid NOTECLASS_PORT '{port}': {e}")),
            }
        }
        if let Some(enabled) = value("NOTECLASS_RECORD_ENABLED") {
            let enabled = enabled.to_lowercase();
            self.record_enabled = enabled == "true" || enabled == "1" || enabled == "yes";
        }
        if let Some(path) = value("NOTECLASS_RECORD_PATH") {
            self.record_path = PathBuf::from(path);
        }
        self
    }

    /// Returns the `host:port` socket address string.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults_applied() {
        let config = ServiceConfig::load_from_str("model_path: m.json\ntokens: [abc123]\n")
            .expect("config should load");

        assert_eq!(config.model_path, PathBuf::from("m.json"));
        assert_eq!(config.tokens.len(), 1);
        assert_eq!(config.tokens[0].expose_secret(), "abc123");
        assert_eq!(config.record_path, PathBuf::from("record.xls"));
        assert_eq!(config.bind_addr(), "127.0.0.1:3001");
        assert!(!config.record_enabled);
        assert_eq!(config.max_content_length, 3000);
        assert_eq!(config.prediction.acquire_timeout_ms, 0);
        assert!(!config.prediction.fail_fast);
        assert!(config.prediction.max_concurrent >= 1);
        assert!(!config.metrics.enabled);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn test_tokens_are_trimmed() {
        let config =
            ServiceConfig::load_from_str("model_path: m.json\ntokens: ['  abc123 ', \"\\tdef\"]\n")
                .expect("config should load");

        let tokens: Vec<&str> = config.tokens.iter().map(ExposeSecret::expose_secret).collect();
        assert_eq!(tokens, ["abc123", "def"]);
    }

    #[test]
    fn test_blank_tokens_reported_as_warning() {
        let config = ServiceConfig::load_from_str("model_path: m.json\ntokens: [abc, '', ' ']\n")
            .expect("config should load");

        assert_eq!(config.tokens.len(), 1);
        assert_eq!(config.warnings, ["ignored 2 blank entries in tokens"]);
    }

    #[test]
    fn test_all_fields() {
        let yaml = r"
model_path: /models/sentiment.json
tokens: [a, b]
record_path: /tmp/out.tsv
host: 0.0.0.0
port: 8080
record_enabled: true
max_content_length: 10
max_body_bytes: 4096
max_concurrent_predictions: 0
prediction_acquire_timeout_ms: 250
prediction_fail_fast: true
logging:
  format: json
  level: debug
  file: /var/log/noteclass.log
metrics:
  enabled: true
  port: 9100
";
        let config = ServiceConfig::load_from_str(yaml).expect("config should load");

        assert_eq!(config.tokens.len(), 2);
        assert_eq!(config.record_path, PathBuf::from("/tmp/out.tsv"));
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert!(config.record_enabled);
        assert_eq!(config.max_content_length, 10);
        assert_eq!(config.max_body_bytes, 4096);
        assert_eq!(config.prediction.max_concurrent, 1);
        assert_eq!(config.prediction.acquire_timeout_ms, 250);
        assert!(config.prediction.fail_fast);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        assert_eq!(
            config.logging.file,
            Some(PathBuf::from("/var/log/noteclass.log"))
        );
        assert_eq!(config.metrics.port, 9100);
    }

    #[test]
    fn test_missing_model_path() {
        let err = ServiceConfig::load_from_str("tokens: [abc]\n").expect_err("should fail");
        assert_eq!(
            err.to_string(),
            format!("configuration error: {MISSING_REQUIRED_MESSAGE}")
        );
    }

    #[test]
    fn test_missing_tokens() {
        assert!(ServiceConfig::load_from_str("model_path: m.json\n").is_err());
        assert!(ServiceConfig::load_from_str("model_path: m.json\ntokens: []\n").is_err());
        assert!(ServiceConfig::load_from_str("model_path: m.json\ntokens: ['', ' ']\n").is_err());
    }

    #[test]
    fn test_empty_document() {
        assert!(matches!(
            ServiceConfig::load_from_str(""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_unparsable_document() {
        assert!(matches!(
            ServiceConfig::load_from_str("tokens: {unterminated"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::load_from_str("model_path: m.json\ntokens: [abc]\n")
            .expect("config should load")
            .with_overrides(|key| match key {
                "NOTECLASS_HOST" => Some("0.0.0.0".to_string()),
                "NOTECLASS_PORT" => Some("not-a-port".to_string()),
                "NOTECLASS_RECORD_ENABLED" => Some("YES".to_string()),
                "NOTECLASS_RECORD_PATH" => Some(" ".to_string()),
                _ => None,
            });

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains("NOTECLASS_PORT"));
        assert!(config.record_enabled);
        assert_eq!(config.record_path, PathBuf::from(DEFAULT_RECORD_PATH));
    }
}
