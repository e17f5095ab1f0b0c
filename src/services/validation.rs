//! Note validation and truncation.
//!
//! Checks run in a fixed order on the note as submitted; truncation is the
//! last step and never produces an error.
//!
//! 1. empty → [`ValidationError::MissingInput`]
//! 2. fewer than [`MIN_NOTE_CHARS`] characters → [`ValidationError::TooShort`]
//! 3. no printable character → [`ValidationError::InvisibleContent`]
//! 4. longer than the configured maximum → keep the leading characters
//!
//! Lengths count Unicode scalar values, not bytes.

use std::borrow::Cow;
use thiserror::Error as ThisError;
use unicode_general_category::{GeneralCategory, get_general_category};

/// Minimum note length in characters.
pub const MIN_NOTE_CHARS: usize = 3;

/// Reasons a note is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum ValidationError {
    /// The note is empty or absent.
    #[error("Note is required")]
    MissingInput,
    /// The note has fewer than [`MIN_NOTE_CHARS`] characters.
    #[error("Note is too short")]
    TooShort,
    /// The note has no printable character.
    #[error("Note contains only invisible characters")]
    InvisibleContent,
}

/// Returns true if `c` renders as a visible glyph.
///
/// Whitespace (including the ASCII space) is non-printable, as are the
/// general categories Cc, Cf, Cs, Co and Cn (which covers noncharacters such
/// as U+FFFF) and the separators Zl, Zp and Zs.
#[must_use]
pub fn is_printable(c: char) -> bool {
    if c.is_whitespace() {
        return false;
    }
    !matches!(
        get_general_category(c),
        GeneralCategory::Control
            | GeneralCategory::Format
            | GeneralCategory::Surrogate
            | GeneralCategory::PrivateUse
            | GeneralCategory::Unassigned
            | GeneralCategory::LineSeparator
            | GeneralCategory::ParagraphSeparator
            | GeneralCategory::SpaceSeparator
    )
}

/// Returns true if no character of `content` is printable.
#[must_use]
pub fn is_invisible(content: &str) -> bool {
    !content.chars().any(is_printable)
}

/// Returns the first `max_chars` characters of `content`, borrowing when no
/// truncation is needed.
#[must_use]
pub fn truncate_chars(content: &str, max_chars: usize) -> Cow<'_, str> {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => Cow::Borrowed(&content[..byte_idx]),
        None => Cow::Borrowed(content),
    }
}

/// Validates a note and truncates it to `max_chars` characters.
///
/// # Errors
///
/// Returns the first failing [`ValidationError`]. All checks see the note as
/// submitted.
pub fn validate_note(note: &str, max_chars: usize) -> Result<Cow<'_, str>, ValidationError> {
    if note.is_empty() {
        return Err(ValidationError::MissingInput);
    }

    if note.chars().take(MIN_NOTE_CHARS).count() < MIN_NOTE_CHARS {
        return Err(ValidationError::TooShort);
    }

    if is_invisible(note) {
        return Err(ValidationError::InvisibleContent);
    }

    let truncated = truncate_chars(note, max_chars);
    if truncated.len() < note.len() {
        tracing::debug!(
            max_chars,
            original_bytes = note.len(),
            truncated_bytes = truncated.len(),
            "Truncated note before prediction"
        );
    }

    Ok(truncated)
}
