//! Error types for schedule ingestion.
//!
//! Two tiers exist:
//!
//! - [`CoreError`] aborts a run (structural breakage, merge violations, bad
//!   options).
//! - [`RecordError`] concerns one raw record only; the normalizer drops the
//!   record and reports it as an [`IngestWarning`](crate::IngestWarning).

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::time::DateRange;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Run-level errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The document lacks the structural anchors the schedule source always
    /// uses, or no records could be found at all.
    #[error("malformed schedule document: {reason}")]
    MalformedDocument { reason: String },

    /// Two models being merged cover overlapping dates.
    #[error("conflicting sources: {first} overlaps {second}")]
    ConflictingSource { first: DateRange, second: DateRange },

    /// No parser is registered under the requested name.
    #[error("unknown document parser: {0}")]
    UnknownParser(String),

    /// A date range whose start lies after its end.
    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// A normalization or formatting option that cannot be used.
    #[error("invalid option `{option}`: {message}")]
    InvalidOption { option: String, message: String },

    /// Rendering failed.
    #[error("render failed: {0}")]
    Render(String),
}

impl CoreError {
    /// Creates a malformed document error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            reason: reason.into(),
        }
    }

    /// Creates an invalid option error.
    pub fn invalid_option(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error means the upstream layout changed.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::MalformedDocument { .. })
    }
}

/// Per-record resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordError {
    /// The date label matched none of the configured formats.
    #[error("unparseable date label {label:?}")]
    DateParse { label: String },

    /// The time label matched none of the configured shapes.
    #[error("unparseable time label {label:?}")]
    TimeParse { label: String },

    /// The provider label is blank.
    #[error("record has no provider label")]
    EmptyProvider,
}

impl RecordError {
    /// Returns the offending label.
    pub fn label(&self) -> &str {
        match self {
            Self::DateParse { label } | Self::TimeParse { label } => label,
            Self::EmptyProvider => "",
        }
    }
}
