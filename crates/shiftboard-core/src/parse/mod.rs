//! Document parsers: raw markup to [`RawRecord`]s.
//!
//! A parser only locates records and extracts their label text. It never
//! interprets dates or times; that is the normalizer's job.

mod markup;
mod slots;
mod table;

pub use slots::{DEFAULT_SLOT_MINUTES, SlotFeedParser};
pub use table::TableParser;

use crate::error::{CoreError, CoreResult};
use crate::normalize::IngestWarning;
use crate::raw_record::RawRecord;

/// Identifiers accepted by [`parser_for`].
pub const PARSER_NAMES: &[&str] = &["table", "slots"];

/// Records found in one document plus the entries a parser passed over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    pub records: Vec<RawRecord>,
    /// Only [`IngestWarning::SkippedEntry`] and [`IngestWarning::Truncated`].
    pub warnings: Vec<IngestWarning>,
}

impl ParsedDocument {
    /// Appends a record, numbering it in document order.
    pub(crate) fn push(&mut self, mut record: RawRecord) {
        record.index = self.records.len();
        self.records.push(record);
    }

    pub(crate) fn skip(&mut self, entry: impl Into<String>, reason: impl Into<String>) {
        let warning = IngestWarning::SkippedEntry {
            entry: entry.into(),
            reason: reason.into(),
        };
        tracing::warn!(%warning, "skipping document entry");
        self.warnings.push(warning);
    }
}

/// Turns one raw document into raw records in document order.
pub trait DocumentParser: Send + Sync {
    /// Identifier used in configuration (`parser = "table"`).
    fn name(&self) -> &'static str;

    /// Extracts the records of `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedDocument`] when the structural anchors
    /// this parser relies on are absent. A single bad row or entry is never
    /// an error.
    fn parse(&self, raw: &str) -> CoreResult<ParsedDocument>;

    /// Minutes a bare time label stands for in this kind of document, used
    /// when `slot_minutes` is not configured.
    fn implied_slot_minutes(&self) -> Option<u32> {
        None
    }
}

/// Returns the parser registered under `name`.
///
/// # Errors
///
/// Returns [`CoreError::UnknownParser`] for unrecognized names.
pub fn parser_for(name: &str) -> CoreResult<Box<dyn DocumentParser>> {
    match name.trim().to_lowercase().as_str() {
        "table" | "html" => Ok(Box::new(TableParser::new())),
        "slots" | "json" => Ok(Box::new(SlotFeedParser::new())),
        other => Err(CoreError::UnknownParser(other.to_string())),
    }
}
