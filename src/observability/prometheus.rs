//! Prometheus metrics exporter.

use crate::config::MetricsSettings;
use crate::{Error, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,
    /// Address to bind the metrics exporter.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self::from_settings(&MetricsSettings::default())
    }
}

impl MetricsConfig {
    /// Builds metrics configuration from config settings.
    #[must_use]
    pub fn from_settings(settings: &MetricsSettings) -> Self {
        Self {
            enabled: settings.enabled,
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), settings.port),
        }
    }
}

/// Installs the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a tokio runtime; the exporter runs as a task
/// on it. Returns false when metrics are disabled.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the exporter cannot be built or a
/// global recorder is already installed.
pub fn install_prometheus(config: &MetricsConfig) -> Result<bool> {
    if !config.enabled {
        return Ok(false);
    }

    let runtime = tokio::runtime::Handle::try_current().map_err(|e| Error::OperationFailed {
        operation: "metrics_exporter_install".to_string(),
        cause: e.to_string(),
    })?;

    let (recorder, exporter) = {
        let _guard = runtime.enter();
        PrometheusBuilder::new()
            .with_http_listener(config.listen_addr)
            .build()
            .map_err(|e| Error::OperationFailed {
                operation: "metrics_exporter_build".to_string(),
                cause: e.to_string(),
            })?
    };

    metrics::set_global_recorder(recorder).map_err(|e| Error::OperationFailed {
        operation: "metrics_recorder_install".to_string(),
        cause: e.to_string(),
    })?;
    runtime.spawn(async move {
        if let Err(e) = exporter.await {
            tracing::warn!(error = ?e, "Metrics exporter stopped");
        }
    });

    tracing::info!(addr = %config.listen_addr, "Prometheus exporter listening");
    Ok(true)
}
