use chrono::NaiveDate;
use serde::Serialize;

use super::{FormatOptions, OutputFormat, Renderer};
use crate::error::{CoreError, CoreResult};
use crate::model::{DaySchedule, ScheduleModel, Shift};
use crate::normalize::IngestWarning;

/// JSON output document.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput<'a> {
    pub title: &'a str,
    pub range: JsonRange,
    pub providers: Vec<JsonProvider<'a>>,
    pub days: Vec<JsonDay<'a>>,
    pub warnings: &'a [IngestWarning],
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct JsonRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonProvider<'a> {
    pub name: &'a str,
    pub aliases: Vec<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonDay<'a> {
    pub date: NaiveDate,
    /// Short weekday name (e.g. "Mon").
    pub weekday: String,
    pub shifts: Vec<JsonShift<'a>>,
}

/// A shift with times already formatted per [`FormatOptions::time_format`].
#[derive(Debug, Clone, Serialize)]
pub struct JsonShift<'a> {
    pub provider: &'a str,
    pub start: String,
    pub end: String,
    pub location: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'a str>,
    pub conflict: bool,
}

/// Pretty-printed JSON renderer.
#[derive(Debug, Clone)]
pub struct JsonRenderer {
    options: FormatOptions,
}

impl JsonRenderer {
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    /// Builds the serializable document without encoding it.
    pub fn document<'a>(
        &'a self,
        model: &'a ScheduleModel,
        warnings: &'a [IngestWarning],
    ) -> JsonOutput<'a> {
        JsonOutput {
            title: &self.options.title,
            range: JsonRange {
                start: model.range().start(),
                end: model.range().end(),
            },
            providers: model
                .providers()
                .iter()
                .map(|p| JsonProvider {
                    name: p.canonical_name(),
                    aliases: p.aliases().iter().map(String::as_str).collect(),
                })
                .collect(),
            days: model.days().map(|d| self.day(d)).collect(),
            warnings,
        }
    }

    fn day<'a>(&self, day: &'a DaySchedule) -> JsonDay<'a> {
        JsonDay {
            date: day.date(),
            weekday: day.date().format("%a").to_string(),
            shifts: day.shifts().iter().map(|s| self.shift(s)).collect(),
        }
    }

    fn shift<'a>(&self, shift: &'a Shift) -> JsonShift<'a> {
        let time = self.options.time_format;
        JsonShift {
            provider: &shift.provider,
            start: time.format_time(shift.range.start()),
            end: time.format_time(shift.range.end()),
            location: &shift.location.name,
            location_code: shift.location.code.as_deref(),
            note: shift.note.as_deref(),
            conflict: shift.conflict,
        }
    }
}

impl Renderer for JsonRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn render(&self, model: &ScheduleModel, warnings: &[IngestWarning]) -> CoreResult<String> {
        let mut out = serde_json::to_string_pretty(&self.document(model, warnings))
            .map_err(|e| CoreError::Render(e.to_string()))?;
        out.push('\n');
        Ok(out)
    }
}
