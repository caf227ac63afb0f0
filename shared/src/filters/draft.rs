//! Per-field draft text for the free-text filter inputs.
//!
//! A draft diverges from the applied value while the user types and is
//! promoted (or rejected) when the field's debounce fires or it loses focus.
//! Each keystroke bumps a generation so a timer armed for an older keystroke
//! can tell it lost the race.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::validate::FieldError;
use super::{AppliedFilters, DraftField};

/// Result of [`FilterSynchronizer::edit`](super::sync::FilterSynchronizer::edit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// A commit is due after `delay` unless a newer keystroke supersedes it.
    Scheduled { generation: u64, delay: Duration },
    /// The field was emptied and the applied value cleared at once.
    Cleared,
}

/// Result of trying to promote a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftCommit {
    /// Applied filters changed.
    Promoted,
    /// Draft was valid but already matched the applied value.
    Unchanged,
    /// Not a number yet; left alone without an error.
    Ignored,
    Rejected(FieldError),
    /// A newer keystroke or an earlier blur already handled this field.
    Stale,
}

#[derive(Debug, Default)]
pub struct DraftBook {
    texts: HashMap<DraftField, String>,
    errors: HashMap<DraftField, FieldError>,
    editing: HashSet<DraftField>,
    pending: HashMap<DraftField, u64>,
    next_generation: u64,
    /// Applied values the texts were last refreshed from.
    synced: AppliedFilters,
}

impl DraftBook {
    pub fn seed(&mut self, applied: &AppliedFilters) {
        self.texts = DraftField::ALL
            .iter()
            .map(|field| (*field, applied.value(*field).unwrap_or_default()))
            .collect();
        self.errors.clear();
        self.editing.clear();
        self.pending.clear();
        self.synced = applied.clone();
    }

    /// Pulls externally changed applied values into the drafts. Fields the
    /// user is typing into are left untouched. Returns the fields updated.
    pub fn refresh(&mut self, applied: &AppliedFilters) -> Vec<DraftField> {
        let mut updated = Vec::new();
        for field in DraftField::ALL {
            let value = applied.value(field);
            if value == self.synced.value(field) || self.editing.contains(&field) {
                continue;
            }
            self.texts.insert(field, value.unwrap_or_default());
            self.errors.remove(&field);
            if field.is_price() {
                self.clear_range_error();
            }
            updated.push(field);
        }
        self.synced = applied.clone();
        updated
    }

    /// Records applied values the caller is about to write itself, so the
    /// echo does not overwrite the drafts that produced them.
    pub fn mark_synced(&mut self, applied: &AppliedFilters) {
        self.synced = applied.clone();
    }

    #[must_use]
    pub fn text(&self, field: DraftField) -> &str {
        self.texts.get(&field).map_or("", String::as_str)
    }

    /// Stores a keystroke and returns the generation its debounce must carry.
    pub fn set_text(&mut self, field: DraftField, text: &str) -> u64 {
        self.texts.insert(field, text.to_string());
        self.editing.insert(field);
        self.next_generation += 1;
        self.pending.insert(field, self.next_generation);
        self.next_generation
    }

    /// Consumes the pending debounce if `generation` is still the latest.
    pub fn take_pending(&mut self, field: DraftField, generation: u64) -> bool {
        if self.pending.get(&field) == Some(&generation) {
            self.pending.remove(&field);
            true
        } else {
            false
        }
    }

    pub fn cancel_pending(&mut self, field: DraftField) -> bool {
        self.pending.remove(&field).is_some()
    }

    pub fn finish_editing(&mut self, field: DraftField) {
        self.editing.remove(&field);
    }

    #[must_use]
    pub fn is_editing(&self, field: DraftField) -> bool {
        self.editing.contains(&field)
    }

    #[must_use]
    pub fn any_editing(&self) -> bool {
        !self.editing.is_empty()
    }

    #[must_use]
    pub fn error(&self, field: DraftField) -> Option<&FieldError> {
        self.errors.get(&field)
    }

    pub fn set_error(&mut self, field: DraftField, error: FieldError) {
        self.errors.insert(field, error);
    }

    pub fn clear_error(&mut self, field: DraftField) {
        self.errors.remove(&field);
    }

    pub fn clear_range_error(&mut self) {
        for field in [DraftField::PriceMin, DraftField::PriceMax] {
            if matches!(self.errors.get(&field), Some(FieldError::MinExceedsMax { .. })) {
                self.errors.remove(&field);
            }
        }
    }

    /// Empties a field outright: text, error, timer and editing state.
    pub fn clear_field(&mut self, field: DraftField) {
        self.texts.insert(field, String::new());
        self.errors.remove(&field);
        self.pending.remove(&field);
        self.editing.remove(&field);
        if field.is_price() {
            self.clear_range_error();
        }
    }
}
