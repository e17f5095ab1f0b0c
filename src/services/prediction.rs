//! Prediction orchestration.
//!
//! Dispatches validated notes to the classifier through the bulkhead and
//! reduces the raw output to a label and a confidence score.

use crate::model::{PredictionBulkhead, RawPrediction};
use crate::{Error, Result};
use serde::Serialize;

/// Number of decimal places kept in scores.
pub const SCORE_DECIMALS: usize = 4;

/// A label and the model's confidence in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Predicted label.
    pub label: String,
    /// Probability of `label`, in `[0, 1]`, rounded to [`SCORE_DECIMALS`] places.
    pub score: f64,
}

/// Rounds a probability to [`SCORE_DECIMALS`] places after clamping it into
/// `[0, 1]`.
///
/// Rounding works on the exact binary value and breaks ties to even, so
/// `0.03125` becomes `0.0312`.
#[must_use]
pub fn round_score(probability: f64) -> f64 {
    let clamped = probability.clamp(0.0, 1.0);
    format!("{clamped:.prec$}", prec = SCORE_DECIMALS)
        .parse()
        .unwrap_or(clamped)
}

impl TryFrom<RawPrediction> for Prediction {
    type Error = Error;

    fn try_from(raw: RawPrediction) -> Result<Self> {
        let probability = raw.distribution.get(raw.index).copied().ok_or_else(|| {
            Error::Inference(format!(
                "label index {} outside distribution of {} entries",
                raw.index,
                raw.distribution.len()
            ))
        })?;

        if !probability.is_finite() {
            return Err(Error::Inference(format!(
                "non-finite probability {probability} for label '{}'",
                raw.label
            )));
        }

        Ok(Self {
            label: raw.label,
            score: round_score(probability),
        })
    }
}

/// Runs predictions for validated notes.
#[derive(Debug, Clone)]
pub struct PredictionService {
    bulkhead: PredictionBulkhead,
}

impl PredictionService {
    /// Creates a new prediction service.
    #[must_use]
    pub const fn new(bulkhead: PredictionBulkhead) -> Self {
        Self { bulkhead }
    }

    /// Predicts the label for `text`.
    ///
    /// `text` must already have passed validation and truncation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Inference`] if the classifier fails or yields an
    /// unusable result, and [`Error::Busy`] if the bulkhead rejects the call.
    pub async fn predict(&self, text: String) -> Result<Prediction> {
        let chars = text.chars().count();
        let raw = self.bulkhead.predict(text).await?;
        let prediction = Prediction::try_from(raw)?;

        tracing::debug!(
            chars,
            label = %prediction.label,
            score = prediction.score,
            "Prediction complete"
        );

        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classifier, PredictionBulkheadConfig};
    use std::sync::{Arc, Mutex};
    use test_case::test_case;

    struct FixedClassifier {
        raw: RawPrediction,
        seen: Mutex<Vec<String>>,
    }

    impl Classifier for FixedClassifier {
        fn predict(&self, text: &str) -> Result<RawPrediction> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(text.to_string());
            }
            Ok(self.raw.clone())
        }
    }

    fn raw(label: &str, distribution: Vec<f64>, index: usize) -> RawPrediction {
        RawPrediction {
            label: label.to_string(),
            distribution,
            index,
        }
    }

    #[test_case(0.923_456_7, 0.9235 ; "rounds up")]
    #[test_case(0.923_44, 0.9234 ; "rounds down")]
    #[test_case(0.5, 0.5 ; "exact")]
    #[test_case(0.999_96, 1.0 ; "rounds to one")]
    #[test_case(0.000_04, 0.0 ; "rounds to zero")]
    #[test_case(1.000_000_1, 1.0 ; "clamped high")]
    #[test_case(-0.01, 0.0 ; "clamped low")]
    #[test_case(0.031_25, 0.0312 ; "exact tie to even down")]
    #[test_case(0.093_75, 0.0938 ; "exact tie to even up")]
    fn test_round_score(input: f64, expected: f64) {
        assert!((round_score(input) - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn test_extracts_probability_at_index() {
        let prediction =
            Prediction::try_from(raw("positive", vec![0.076_543_3, 0.923_456_7], 1))
                .expect("valid");

        assert_eq!(prediction.label, "positive");
        assert!((prediction.score - 0.9235).abs() < f64::EPSILON);
    }

    #[test]
    fn test_index_out_of_range() {
        let err = Prediction::try_from(raw("x", vec![1.0], 3)).expect_err("should fail");
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn test_non_finite_probability() {
        let err = Prediction::try_from(raw("x", vec![f64::NAN], 0)).expect_err("should fail");
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn test_serializes_label_and_score() {
        let prediction = Prediction {
            label: "positive".to_string(),
            score: 0.9235,
        };
        let json = serde_json::to_string(&prediction).expect("serialize");

        assert_eq!(json, r#"{"label":"positive","score":0.9235}"#);
    }

    #[tokio::test]
    async fn test_service_is_deterministic() {
        let classifier = Arc::new(FixedClassifier {
            raw: raw("positive", vec![0.1, 0.9], 1),
            seen: Mutex::new(Vec::new()),
        });
        let service = PredictionService::new(PredictionBulkhead::new(
            Arc::clone(&classifier) as Arc<dyn Classifier>,
            PredictionBulkheadConfig::default(),
        ));

        let first = service.predict("same note".to_string()).await.expect("predict");
        let second = service.predict("same note".to_string()).await.expect("predict");

        assert_eq!(first, second);
        assert_eq!(first.score.to_bits(), second.score.to_bits());
        let seen = classifier.seen.lock().expect("lock");
        assert_eq!(seen.as_slice(), ["same note", "same note"]);
    }
}
