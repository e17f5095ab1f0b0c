//! Best-effort record of processed notes.
//!
//! Each successful prediction appends one `note\tscore` line. The note is
//! written verbatim: embedded tabs and newlines are not escaped. Concurrent
//! requests append independently and may interleave at the OS buffering
//! granularity.

use crate::observability::current_request_id;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Formats a score the way it appears in the record file: shortest
/// round-trip form, with `.0` kept for integral values.
#[must_use]
pub fn format_score(score: f64) -> String {
    if score.is_finite() && score.fract() == 0.0 {
        format!("{score:.1}")
    } else {
        score.to_string()
    }
}

/// Formats a single record line, including the trailing newline.
#[must_use]
pub fn format_entry(note: &str, score: f64) -> String {
    format!("{note}\t{}\n", format_score(score))
}

/// Appends prediction results to the record file when enabled.
#[derive(Debug, Clone)]
pub struct ResultRecorder {
    path: PathBuf,
    enabled: bool,
}

impl ResultRecorder {
    /// Creates a recorder for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
        }
    }

    /// Creates a recorder that never writes.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(PathBuf::new(), false)
    }

    /// Returns true if recording is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the record file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry, creating the file if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recording`] if the file cannot be opened or written.
    pub fn append(&self, note: &str, score: f64) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::Recording(format!("{}: {e}", self.path.display())))?;

        // One write call per line keeps single-writer appends line-atomic.
        file.write_all(format_entry(note, score).as_bytes())
            .map_err(|e| Error::Recording(format!("{}: {e}", self.path.display())))
    }

    /// Records `note` and `score` if enabled. Failures are logged with the
    /// current request ID and swallowed.
    ///
    /// Returns true if an entry was written.
    pub fn record(&self, note: &str, score: f64) -> bool {
        self.record_for(note, score, current_request_id().as_deref())
    }

    fn record_for(&self, note: &str, score: f64, request_id: Option<&str>) -> bool {
        if !self.enabled {
            return false;
        }

        match self.append(note, score) {
            Ok(()) => true,
            Err(e) => {
                metrics::counter!("record_failures_total").increment(1);
                tracing::error!(
                    error = %e,
                    path = %self.path.display(),
                    request_id = request_id.unwrap_or("-"),
                    "Record failed"
                );
                false
            },
        }
    }

    /// Records on the blocking pool and waits for the write to finish.
    ///
    /// Never fails; a write error or a lost task is only logged. The request
    /// ID is read here because task-locals do not reach the blocking pool.
    pub async fn record_async(&self, note: String, score: f64) -> bool {
        if !self.enabled {
            return false;
        }

        let recorder = self.clone();
        let request_id = current_request_id();
        let span = tracing::Span::current();
        let task = tokio::task::spawn_blocking(move || {
            span.in_scope(|| recorder.record_for(&note, score, request_id.as_deref()))
        });
        match task.await {
            Ok(written) => written,
            Err(e) => {
                metrics::counter!("record_failures_total").increment(1);
                tracing::error!(error = %e, "Record task failed");
                false
            },
        }
    }
}
