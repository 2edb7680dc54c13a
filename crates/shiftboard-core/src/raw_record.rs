//! Raw record type produced by document parsers.
//!
//! This module defines [`RawRecord`], an unvalidated row of schedule data as
//! it was found in the source markup, before normalization.
//!
//! A raw record preserves the labels verbatim (after markup stripping) and
//! is then resolved into a [`Shift`](crate::Shift) by the normalizer.

use serde::{Deserialize, Serialize};

/// An unvalidated schedule row.
///
/// No field has been interpreted: dates and times are still the source's
/// label text. `index` is the record's position in document order and
/// seeds the tie-break before the normalizer re-sorts by time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Position of the record in document order (top-to-bottom, left-to-right).
    pub index: usize,

    /// The provider label as written in the source (e.g. "Dr. Jane Smith, MD").
    pub provider_label: String,

    /// The date label (e.g. "Mon 02/03/2025").
    pub date_label: String,

    /// The time label (e.g. "9:00 AM-12:00 PM", "All Day", "09:15:00").
    pub time_label: String,

    /// The location label, if the row carries one.
    pub location_label: Option<String>,

    /// A free-text note attached to the row.
    pub note: Option<String>,
}

impl RawRecord {
    /// Creates a new raw record with the required labels.
    pub fn new(
        index: usize,
        provider_label: impl Into<String>,
        date_label: impl Into<String>,
        time_label: impl Into<String>,
    ) -> Self {
        Self {
            index,
            provider_label: provider_label.into(),
            date_label: date_label.into(),
            time_label: time_label.into(),
            location_label: None,
            note: None,
        }
    }

    /// Builder method to set the location label.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location_label = Some(location.into());
        self
    }

    /// Builder method to set the note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Returns the location label, treating blank text as absent.
    pub fn effective_location(&self) -> Option<&str> {
        self.location_label
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the note, treating blank text as absent.
    pub fn effective_note(&self) -> Option<&str> {
        self.note.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_record_creation() {
        let record = RawRecord::new(0, "Dr. Jane Smith", "2025-02-03", "9:00 AM-12:00 PM");
        assert_eq!(record.index, 0);
        assert_eq!(record.provider_label, "Dr. Jane Smith");
        assert!(record.effective_location().is_none());
        assert!(record.effective_note().is_none());
    }

    #[test]
    fn raw_record_builder() {
        let record = RawRecord::new(4, "Jane Smith", "2025-02-03", "All Day")
            .with_location("  Main Street ")
            .with_note("on call");
        assert_eq!(record.effective_location(), Some("Main Street"));
        assert_eq!(record.effective_note(), Some("on call"));
    }

    #[test]
    fn blank_optional_fields_are_absent() {
        let record = RawRecord::new(1, "Jane Smith", "2025-02-03", "All Day")
            .with_location("   ")
            .with_note("");
        assert!(record.effective_location().is_none());
        assert!(record.effective_note().is_none());
    }
}
