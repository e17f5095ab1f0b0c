//! Request pipeline services.
//!
//! Authorization, validation, prediction and recording, each usable on its
//! own and composed by [`crate::server`].

mod auth;
mod prediction;
mod recorder;
mod validation;

pub use auth::{TokenSet, UNAUTHORIZED_MESSAGE, bearer_credential};
pub use prediction::{Prediction, PredictionService, SCORE_DECIMALS, round_score};
pub use recorder::{ResultRecorder, format_entry, format_score};
pub use validation::{
    MIN_NOTE_CHARS, ValidationError, is_invisible, is_printable, truncate_chars, validate_note,
};
