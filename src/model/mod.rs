//! Classification model capability.
//!
//! The service treats the model as an opaque, synchronous and possibly slow
//! capability. [`Classifier`] is the narrow seam the rest of the crate depends
//! on; [`LexiconClassifier`] is the implementation loaded by the binary.

mod bulkhead;
mod lexicon;

pub use bulkhead::{PredictionBulkhead, PredictionBulkheadConfig};
pub use lexicon::LexiconClassifier;

use crate::Result;

/// Raw classifier output: the chosen label, the probability distribution over
/// all labels, and the index of the chosen label within that distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    /// Predicted label.
    pub label: String,
    /// Probability per label, in the model's label order.
    pub distribution: Vec<f64>,
    /// Index of `label` in `distribution`.
    pub index: usize,
}

/// Trait for text classifiers.
///
/// Implementations are shared across worker threads and may be invoked
/// concurrently; any internal serialization is their own concern.
pub trait Classifier: Send + Sync {
    /// Classifies `text`.
    ///
    /// This call may block for a long time and must not be made directly from
    /// an async task; see [`PredictionBulkhead`].
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot produce a prediction.
    fn predict(&self, text: &str) -> Result<RawPrediction>;
}
