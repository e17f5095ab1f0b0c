//! Bag-of-words linear classifier loaded from JSON.
//!
//! Model file format:
//!
//! ```json
//! {
//!   "labels": ["negative", "positive"],
//!   "bias": [0.1, -0.1],
//!   "weights": {
//!     "great": [-1.2, 2.3],
//!     "slow": [1.4, -0.9]
//!   },
//!   "lowercase": true
//! }
//! ```
//!
//! Each alphanumeric run in the input adds its weight row to the bias; the
//! softmax of the sum is the distribution and its argmax the label.

use super::{Classifier, RawPrediction};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct LexiconFile {
    labels: Vec<String>,
    #[serde(default)]
    bias: Option<Vec<f64>>,
    #[serde(default)]
    weights: HashMap<String, Vec<f64>>,
    #[serde(default = "default_lowercase")]
    lowercase: bool,
}

const fn default_lowercase() -> bool {
    true
}

/// Linear softmax classifier over a token lexicon.
#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    labels: Vec<String>,
    bias: Vec<f64>,
    weights: HashMap<String, Vec<f64>>,
    lowercase: bool,
}

impl LexiconClassifier {
    /// Loads a model from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelLoad`] if the file cannot be read, is not valid
    /// JSON, or has inconsistent dimensions.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ModelLoad(format!("{}: {e}", path.display())))?;
        let model = Self::from_json(&contents)?;

        tracing::info!(
            path = %path.display(),
            labels = model.labels.len(),
            vocabulary = model.weights.len(),
            "Loaded lexicon classifier"
        );

        Ok(model)
    }

    /// Parses a model from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelLoad`] if the JSON is invalid or the dimensions
    /// are inconsistent.
    pub fn from_json(contents: &str) -> Result<Self> {
        let file: LexiconFile =
            serde_json::from_str(contents).map_err(|e| Error::ModelLoad(e.to_string()))?;

        let width = file.labels.len();
        if width == 0 {
            return Err(Error::ModelLoad("model declares no labels".to_string()));
        }

        let bias = file.bias.unwrap_or_else(|| vec![0.0; width]);
        if bias.len() != width {
            return Err(Error::ModelLoad(format!(
                "bias has {} entries, expected {width}",
                bias.len()
            )));
        }
        if bias.iter().any(|b| !b.is_finite()) {
            return Err(Error::ModelLoad("bias contains non-finite values".to_string()));
        }

        let mut weights = HashMap::with_capacity(file.weights.len());
        for (token, row) in file.weights {
            if row.len() != width {
                return Err(Error::ModelLoad(format!(
                    "weights for '{token}' have {} entries, expected {width}",
                    row.len()
                )));
            }
            if row.iter().any(|w| !w.is_finite()) {
                return Err(Error::ModelLoad(format!(
                    "weights for '{token}' contain non-finite values"
                )));
            }
            let token = if file.lowercase {
                token.to_lowercase()
            } else {
                token
            };
            // Keys that differ only in case fold onto the same entry.
            if weights.contains_key(&token) {
                return Err(Error::ModelLoad(format!(
                    "duplicate token '{token}' after lowercasing"
                )));
            }
            weights.insert(token, row);
        }

        Ok(Self {
            labels: file.labels,
            bias,
            weights,
            lowercase: file.lowercase,
        })
    }

    /// Returns the model's labels in distribution order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn logits(&self, text: &str) -> Vec<f64> {
        let mut logits = self.bias.clone();
        for raw in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let row = if self.lowercase {
                self.weights.get(&raw.to_lowercase())
            } else {
                self.weights.get(raw)
            };
            if let Some(row) = row {
                for (logit, weight) in logits.iter_mut().zip(row) {
                    *logit += weight;
                }
            }
        }
        logits
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

impl Classifier for LexiconClassifier {
    fn predict(&self, text: &str) -> Result<RawPrediction> {
        let distribution = softmax(&self.logits(text));

        // First label wins ties.
        let mut index = 0;
        for (i, p) in distribution.iter().enumerate() {
            if *p > distribution[index] {
                index = i;
            }
        }

        let label = self
            .labels
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Inference(format!("no label at index {index}")))?;

        Ok(RawPrediction {
            label,
            distribution,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SENTIMENT: &str = r#"{
        "labels": ["negative", "positive"],
        "bias": [0.0, 0.0],
        "weights": {
            "great": [-1.0, 2.0],
            "Slow": [1.5, -1.0]
        }
    }"#;

    #[test]
    fn test_predicts_positive() {
        let model = LexiconClassifier::from_json(SENTIMENT).expect("model should parse");
        let prediction = model.predict("Great service today!").expect("should predict");

        assert_eq!(prediction.label, "positive");
        assert_eq!(prediction.index, 1);
        assert_eq!(prediction.distribution.len(), 2);
        assert!(prediction.distribution[1] > 0.9);
    }

    #[test]
    fn test_lowercases_vocabulary_and_input() {
        let model = LexiconClassifier::from_json(SENTIMENT).expect("model should parse");
        let prediction = model.predict("SLOW, slow, slow.").expect("should predict");

        assert_eq!(prediction.label, "negative");
    }

    #[test]
    fn test_case_sensitive_model() {
        let json = r#"{"labels": ["a", "b"], "weights": {"Yes": [0.0, 3.0]}, "lowercase": false}"#;
        let model = LexiconClassifier::from_json(json).expect("model should parse");

        assert_eq!(model.predict("Yes").expect("should predict").label, "b");
        assert_eq!(model.predict("yes").expect("should predict").label, "a");
    }

    #[test]
    fn test_unknown_tokens_tie_to_first_label() {
        let model = LexiconClassifier::from_json(SENTIMENT).expect("model should parse");
        let prediction = model.predict("zzz qqq").expect("should predict");

        assert_eq!(prediction.index, 0);
        assert_eq!(prediction.label, "negative");
        assert!((prediction.distribution[0] - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_distribution_sums_to_one() {
        let model = LexiconClassifier::from_json(SENTIMENT).expect("model should parse");
        let prediction = model
            .predict("great great great great slow")
            .expect("should predict");
        let total: f64 = prediction.distribution.iter().sum();

        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let json = r#"{"labels": ["a", "b"], "weights": {"x": [1.0]}}"#;
        assert!(matches!(
            LexiconClassifier::from_json(json),
            Err(Error::ModelLoad(_))
        ));

        let json = r#"{"labels": ["a", "b"], "bias": [1.0, 2.0, 3.0]}"#;
        assert!(matches!(
            LexiconClassifier::from_json(json),
            Err(Error::ModelLoad(_))
        ));
    }

    #[test]
    fn test_rejects_keys_equal_after_lowercasing() {
        let json = r#"{"labels": ["a", "b"], "weights": {"Great": [1.0, 0.0], "great": [0.0, 1.0]}}"#;
        let err = LexiconClassifier::from_json(json).expect_err("should fail");
        assert!(matches!(err, Error::ModelLoad(ref m) if m.contains("'great'")));

        let json = r#"{"labels": ["a", "b"], "weights": {"Great": [1.0, 0.0], "great": [0.0, 1.0]}, "lowercase": false}"#;
        let model = LexiconClassifier::from_json(json).expect("case-sensitive keys are distinct");
        assert_eq!(model.predict("Great").expect("predict").index, 0);
        assert_eq!(model.predict("great").expect("predict").index, 1);
    }

    #[test]
    fn test_rejects_empty_labels() {
        assert!(LexiconClassifier::from_json(r#"{"labels": []}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SENTIMENT.as_bytes()).expect("write model");

        let model = LexiconClassifier::load(file.path()).expect("model should load");
        assert_eq!(model.labels(), ["negative", "positive"]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = LexiconClassifier::load(Path::new("/nonexistent/model.json"))
            .expect_err("should fail");
        assert!(matches!(err, Error::ModelLoad(_)));
    }
}
