use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{truncate_utf8_safe, ErrorKind};

/// Digit-group separators users paste or type: space, no-break space,
/// narrow no-break space, underscore.
const GROUP_SEPARATORS: [char; 4] = [' ', '\u{a0}', '\u{202f}', '_'];

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FieldError {
    #[error("value cannot be negative")]
    Negative,

    #[error("minimum {min} exceeds maximum {max}")]
    MinExceedsMax { min: u64, max: u64 },
}

impl FieldError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }

    /// Message shown under the input.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Negative => "Значение не может быть отрицательным",
            Self::MinExceedsMax { .. } => "Минимум больше максимума",
        }
    }
}

/// Interpretation of a numeric free-text input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountInput {
    Empty,
    Value(u64),
    Negative,
    /// Not a number (yet). Ignored without an error so half-typed input is
    /// tolerated.
    NotNumeric,
}

#[must_use]
pub fn parse_amount(raw: &str) -> AmountInput {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !GROUP_SEPARATORS.contains(c))
        .collect();

    if compact.is_empty() {
        return AmountInput::Empty;
    }

    let (negative, digits) = match compact.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, compact.as_str()),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return AmountInput::NotNumeric;
    }
    if negative {
        return AmountInput::Negative;
    }

    match digits.parse::<u64>() {
        Ok(value) => AmountInput::Value(value),
        Err(_) => AmountInput::NotNumeric,
    }
}

pub fn check_range(min: Option<u64>, max: Option<u64>) -> Result<(), FieldError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(FieldError::MinExceedsMax { min, max }),
        _ => Ok(()),
    }
}

/// Trimmed, length-capped search text; `None` when nothing is left.
#[must_use]
pub fn normalize_query(raw: &str, max_len: usize) -> Option<String> {
    let mut query = raw.trim().to_string();
    truncate_utf8_safe(&mut query, max_len);
    let trimmed = query.trim_end();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
