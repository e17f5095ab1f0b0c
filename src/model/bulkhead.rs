//! Bulkhead pattern for classifier invocations.
//!
//! Classifier calls are blocking and CPU intensive, so they run on tokio's
//! blocking pool rather than on the async workers. A semaphore caps how many
//! run at once so a burst of requests cannot grow the blocking pool without
//! bound.
//!
//! # Usage
//!
//! ```rust,ignore
//! use noteclass::model::{LexiconClassifier, PredictionBulkhead, PredictionBulkheadConfig};
//!
//! let model = Arc::new(LexiconClassifier::load(path)?);
//! let bulkhead = PredictionBulkhead::new(model, PredictionBulkheadConfig::default());
//!
//! let raw = bulkhead.predict("Great service today!".to_string()).await?;
//! ```

use super::{Classifier, RawPrediction};
use crate::config::PredictionSettings;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Configuration for the prediction bulkhead.
#[derive(Debug, Clone)]
pub struct PredictionBulkheadConfig {
    /// Maximum concurrent classifier calls.
    ///
    /// Default: available parallelism.
    pub max_concurrent: usize,

    /// Timeout for acquiring a permit in milliseconds (0 = wait indefinitely).
    ///
    /// Default: 0.
    pub acquire_timeout_ms: u64,

    /// Whether to fail immediately when the bulkhead is full.
    ///
    /// Default: false (wait for permit).
    pub fail_fast: bool,
}

impl Default for PredictionBulkheadConfig {
    fn default() -> Self {
        Self::from(&PredictionSettings::default())
    }
}

impl From<&PredictionSettings> for PredictionBulkheadConfig {
    fn from(settings: &PredictionSettings) -> Self {
        Self {
            max_concurrent: settings.max_concurrent.max(1),
            acquire_timeout_ms: settings.acquire_timeout_ms,
            fail_fast: settings.fail_fast,
        }
    }
}

impl PredictionBulkheadConfig {
    /// Sets the maximum concurrent calls.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the acquire timeout in milliseconds.
    #[must_use]
    pub const fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Sets whether to fail fast when the bulkhead is full.
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// Runs a [`Classifier`] on the blocking pool with bounded concurrency.
#[derive(Clone)]
pub struct PredictionBulkhead {
    classifier: Arc<dyn Classifier>,
    config: PredictionBulkheadConfig,
    semaphore: Arc<Semaphore>,
}

impl std::fmt::Debug for PredictionBulkhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionBulkhead")
            .field("config", &self.config)
            .field("available_permits", &self.semaphore.available_permits())
            .finish_non_exhaustive()
    }
}

impl PredictionBulkhead {
    /// Creates a new bulkhead around `classifier`.
    #[must_use]
    pub fn new(classifier: Arc<dyn Classifier>, config: PredictionBulkheadConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            classifier,
            config,
            semaphore,
        }
    }

    /// Returns the current number of available permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Acquires a permit, respecting the configured timeout and fail-fast settings.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        let available = self.semaphore.available_permits();

        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("prediction_bulkhead_available_permits").set(available as f64);

        if self.config.fail_fast {
            return self.acquire_permit_fail_fast(available);
        }

        self.acquire_permit_with_timeout().await
    }

    /// Fast-fail acquisition that returns an error immediately if the bulkhead is full.
    fn acquire_permit_fail_fast(&self, available: usize) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().map_or_else(
            |_| {
                metrics::counter!("prediction_bulkhead_rejections_total", "reason" => "full")
                    .increment(1);
                Err(Error::Busy(format!(
                    "{} predictions in flight (max: {})",
                    self.config.max_concurrent.saturating_sub(available),
                    self.config.max_concurrent
                )))
            },
            |permit| {
                metrics::counter!("prediction_bulkhead_permits_acquired_total").increment(1);
                Ok(permit)
            },
        )
    }

    /// Waits for a permit, bounded by the acquire timeout when one is set.
    async fn acquire_permit_with_timeout(&self) -> Result<OwnedSemaphorePermit> {
        let acquire = Arc::clone(&self.semaphore).acquire_owned();

        let acquired = if self.config.acquire_timeout_ms == 0 {
            acquire.await
        } else {
            let timeout = Duration::from_millis(self.config.acquire_timeout_ms);
            if let Ok(acquired) = tokio::time::timeout(timeout, acquire).await {
                acquired
            } else {
                metrics::counter!("prediction_bulkhead_rejections_total", "reason" => "timeout")
                    .increment(1);
                return Err(Error::Busy(format!(
                    "timed out after {}ms waiting for a prediction slot",
                    timeout.as_millis()
                )));
            }
        };

        // The semaphore is never closed while `self` is alive.
        let permit = acquired.map_err(|e| Error::OperationFailed {
            operation: "prediction_bulkhead_acquire".to_string(),
            cause: e.to_string(),
        })?;
        metrics::counter!("prediction_bulkhead_permits_acquired_total").increment(1);
        Ok(permit)
    }

    /// Runs the classifier on `text` in the blocking pool.
    ///
    /// The permit moves into the blocking task, so it is held until the
    /// classifier returns even if the caller stops waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if no permit could be acquired and
    /// [`Error::Inference`] if the classifier fails or its task panics.
    pub async fn predict(&self, text: String) -> Result<RawPrediction> {
        let permit = self.acquire_permit().await?;
        tracing::trace!("Acquired prediction bulkhead permit");

        let classifier = Arc::clone(&self.classifier);
        let start = Instant::now();
        let joined = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            classifier.predict(&text)
        })
        .await;

        metrics::histogram!("prediction_duration_seconds").record(start.elapsed().as_secs_f64());

        let result = match joined {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(Error::Inference(cause))) => Err(Error::Inference(cause)),
            Ok(Err(other)) => Err(Error::Inference(other.to_string())),
            Err(join_error) => Err(Error::Inference(if join_error.is_panic() {
                "classifier panicked".to_string()
            } else {
                join_error.to_string()
            })),
        };

        tracing::trace!(
            success = result.is_ok(),
            elapsed_ms = start.elapsed().as_millis(),
            "Released prediction bulkhead permit"
        );

        result
    }
}
