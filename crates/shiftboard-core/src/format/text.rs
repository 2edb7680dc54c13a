use std::fmt::{self, Write};

use super::{FormatOptions, OutputFormat, Renderer};
use crate::error::{CoreError, CoreResult};
use crate::model::{ScheduleModel, Shift};
use crate::normalize::IngestWarning;

/// Plain-text renderer.
///
/// ```text
/// Provider schedule: 2025-02-03 to 2025-02-04
///
/// == Mon 2025-02-03 ==
///   09:00-12:00  Jane Smith  @ Main Street [MS]  (walk-ins)
/// ! 11:00-13:00  Bob Jones  @ Annex
///
/// == Tue 2025-02-04 ==
///   (no shifts)
/// ```
///
/// Lines of conflicting shifts start with `!`.
#[derive(Debug, Clone)]
pub struct TextRenderer {
    options: FormatOptions,
}

impl TextRenderer {
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    fn write_shift(&self, out: &mut String, shift: &Shift) -> fmt::Result {
        let marker = if shift.conflict { '!' } else { ' ' };
        write!(
            out,
            "{marker} {}  {}  @ {}",
            self.options.time_format.format_range(&shift.range),
            shift.provider,
            self.options.location_text(&shift.location)
        )?;
        if let Some(note) = &shift.note {
            write!(out, "  ({note})")?;
        }
        writeln!(out)
    }

    fn write_document(
        &self,
        out: &mut String,
        model: &ScheduleModel,
        warnings: &[IngestWarning],
    ) -> fmt::Result {
        let range = model.range();
        writeln!(out, "{}: {} to {}", self.options.title, range.start(), range.end())?;

        for day in model.days() {
            writeln!(out)?;
            writeln!(out, "== {} ==", day.date().format("%a %Y-%m-%d"))?;
            if day.is_empty() {
                writeln!(out, "  (no shifts)")?;
            }
            for shift in day.shifts() {
                self.write_shift(out, shift)?;
            }
        }

        if !warnings.is_empty() {
            writeln!(out)?;
            writeln!(out, "Warnings:")?;
            for warning in warnings {
                writeln!(out, "  - {warning}")?;
            }
        }
        Ok(())
    }
}

impl Renderer for TextRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Text
    }

    fn render(&self, model: &ScheduleModel, warnings: &[IngestWarning]) -> CoreResult<String> {
        let mut out = String::new();
        self.write_document(&mut out, model, warnings)
            .map_err(|e| CoreError::Render(e.to_string()))?;
        Ok(out)
    }
}
