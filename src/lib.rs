//! # Noteclass
//!
//! Token-authenticated text classification inference service.
//!
//! A caller posts a short note and receives the label predicted by a
//! classifier loaded at startup, together with the model's confidence in
//! that label. Inputs and scores can optionally be appended to a record file
//! for later review.
//!
//! ## Pipeline
//!
//! - [`services::TokenSet`] gates every request on a bearer token
//! - [`services::validate_note`] enforces the shape of the note and truncates it
//! - [`services::PredictionService`] runs the blocking classifier on a bounded
//!   worker pool and rounds the score
//! - [`services::ResultRecorder`] appends `note\tscore` lines, best effort
//! - [`server`] wires the above into an axum router
//!
//! ## Example
//!
//! ```rust,ignore
//! use noteclass::config::ServiceConfig;
//! use noteclass::server::{AppState, router};
//!
//! let config = ServiceConfig::load_from_file("config.yaml".as_ref())?;
//! let state = AppState::from_config(&config)?;
//! let app = router(state);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod model;
pub mod observability;
pub mod server;
pub mod services;

pub use config::ServiceConfig;
pub use model::{Classifier, LexiconClassifier, RawPrediction};
pub use services::{Prediction, PredictionService, ResultRecorder, TokenSet, ValidationError};

/// Error type for noteclass operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | HTTP status |
/// |---------|-------------|-------------|
/// | `Config` | Config file unreadable, unparsable, or missing required fields | startup only |
/// | `ModelLoad` | Model file unreadable or malformed | startup only |
/// | `Unauthorized` | Missing, malformed or unknown bearer token | 403 |
/// | `InvalidInput` | Note is empty, too short, or invisible | 400 |
/// | `MalformedBody` | Request body is not a JSON object with a string `note` | 400 |
/// | `PayloadTooLarge` | Request body exceeds `max_body_bytes` | 413 |
/// | `Inference` | Classifier failed, panicked, or returned an unusable result | 500 |
/// | `Busy` | Prediction bulkhead full (fail-fast) or permit wait timed out | 503 |
/// | `OperationFailed` | Any other I/O or runtime failure | 500 |
/// | `Recording` | Record file append failed (logged, never returned to callers) | - |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// The classifier could not be loaded.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// The bearer credential was rejected.
    #[error("{0}")]
    Unauthorized(String),

    /// The note failed validation.
    #[error(transparent)]
    InvalidInput(#[from] ValidationError),

    /// The request body could not be interpreted.
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    /// The request body exceeded the configured size limit.
    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    /// The classifier call failed.
    #[error("inference failed: {0}")]
    Inference(String),

    /// No prediction capacity was available.
    #[error("prediction capacity exhausted: {0}")]
    Busy(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Appending to the record file failed.
    #[error("record failed: {0}")]
    Recording(String),
}

/// Result type alias for noteclass operations.
pub type Result<T> = std::result::Result<T, Error>;
