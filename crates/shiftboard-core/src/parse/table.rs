//! Parser for the portal's HTML schedule page.

use tracing::debug;

use super::markup::{self, Cell};
use super::{DocumentParser, ParsedDocument};
use crate::error::{CoreError, CoreResult};
use crate::raw_record::RawRecord;

/// Column positions of one schedule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    provider: usize,
    date: usize,
    time: usize,
    location: Option<usize>,
    note: Option<usize>,
}

impl Columns {
    const POSITIONAL: Columns = Columns {
        provider: 0,
        date: 1,
        time: 2,
        location: Some(3),
        note: Some(4),
    };

    /// Maps columns by header text. Returns `None` unless provider, date
    /// and time columns are all named.
    fn from_header(cells: &[Cell]) -> Option<Self> {
        let mut provider = None;
        let mut date = None;
        let mut time = None;
        let mut location = None;
        let mut note = None;

        for (idx, cell) in cells.iter().enumerate() {
            let slot = match cell.text.to_lowercase().as_str() {
                "provider" | "doctor" | "name" => &mut provider,
                "date" | "day" => &mut date,
                "time" | "hours" => &mut time,
                "location" | "site" | "office" => &mut location,
                "note" | "notes" => &mut note,
                _ => continue,
            };
            slot.get_or_insert(idx);
        }

        Some(Self {
            provider: provider?,
            date: date?,
            time: time?,
            location,
            note,
        })
    }

    fn required_width(&self) -> usize {
        self.provider.max(self.date).max(self.time) + 1
    }
}

/// Extracts records from a `<table>` whose class or id mentions "schedule".
///
/// Each row holding at least one `<td>` is a data row; `<th scope="row">`
/// cells in it count as columns too. The first all-`<th>` row, if any, may
/// rename columns; otherwise cells are read as provider, date, time,
/// location, note. Data rows too narrow for the mapped columns are reported
/// as skipped entries, blank ones are ignored.
#[derive(Debug, Clone)]
pub struct TableParser {
    anchor: String,
}

impl Default for TableParser {
    fn default() -> Self {
        Self {
            anchor: "schedule".to_string(),
        }
    }
}

impl TableParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a different class/id fragment to locate the table.
    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = anchor.into();
        self
    }
}

impl DocumentParser for TableParser {
    fn name(&self) -> &'static str {
        "table"
    }

    fn parse(&self, raw: &str) -> CoreResult<ParsedDocument> {
        let table = markup::find_table(raw, &self.anchor).ok_or_else(|| {
            CoreError::malformed(format!("no <table> tagged {:?}", self.anchor))
        })?;

        let mut columns = Columns::POSITIONAL;
        let mut seen_data = false;
        let mut doc = ParsedDocument::default();

        for (row_no, cells) in markup::rows(table).into_iter().enumerate() {
            if !cells.is_empty() && cells.iter().all(|c| c.header) {
                if !seen_data {
                    if let Some(mapped) = Columns::from_header(&cells) {
                        debug!(?mapped, "schedule table header mapped");
                        columns = mapped;
                    }
                }
                continue;
            }

            if cells.iter().all(|c| c.text.is_empty()) {
                continue;
            }
            if cells.len() < columns.required_width() {
                let shown: Vec<&str> = cells.iter().map(|c| c.text.as_str()).collect();
                doc.skip(
                    format!("table row {}", row_no + 1),
                    format!(
                        "{} cell(s) where {} are needed: {:?}",
                        cells.len(),
                        columns.required_width(),
                        shown.join(" | ")
                    ),
                );
                continue;
            }
            seen_data = true;

            let text = |idx: usize| cells[idx].text.clone();
            let optional = |idx: Option<usize>| {
                idx.and_then(|i| cells.get(i))
                    .map(|c| c.text.clone())
                    .filter(|t| !t.is_empty())
            };

            let mut record = RawRecord::new(
                0,
                text(columns.provider),
                text(columns.date),
                text(columns.time),
            );
            record.location_label = optional(columns.location);
            record.note = optional(columns.note);
            doc.push(record);
        }

        debug!(
            records = doc.records.len(),
            skipped = doc.warnings.len(),
            "parsed schedule table"
        );
        Ok(doc)
    }
}
