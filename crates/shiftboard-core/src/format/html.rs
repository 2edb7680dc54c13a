use std::fmt::{self, Write};

use super::{FormatOptions, OutputFormat, Renderer, ellipsis, html_escape};
use crate::error::{CoreError, CoreResult};
use crate::model::{DaySchedule, ScheduleModel};
use crate::normalize::IngestWarning;

const STYLE: &str = "\
table.schedule { border-collapse: collapse; font-family: sans-serif; }
table.schedule th, table.schedule td { border: 1px solid #999; padding: 4px 8px; vertical-align: top; }
table.schedule td.empty { background: #f4f4f4; }
table.schedule td.conflict, table.schedule span.conflict { background: #fbd5d5; }
ul.warnings { color: #8a4b00; }";

/// Standalone HTML page with one row per provider and one column per date.
///
/// Cells holding a conflicting shift carry the `conflict` class; cells with
/// no shift carry `empty`.
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    options: FormatOptions,
}

impl HtmlRenderer {
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    fn write_cell(&self, out: &mut String, day: &DaySchedule, provider: &str) -> fmt::Result {
        let shifts: Vec<_> = day.shifts_of(provider).collect();
        if shifts.is_empty() {
            return writeln!(out, "<td class=\"empty\"></td>");
        }

        let class = if shifts.iter().any(|s| s.conflict) {
            " class=\"conflict\""
        } else {
            ""
        };
        let entries: Vec<String> = shifts
            .iter()
            .map(|s| {
                let mut text = format!(
                    "{} {}",
                    self.options.time_format.format_range(&s.range),
                    self.options.location_text(&s.location)
                );
                if let Some(note) = &s.note {
                    text.push_str(&format!(" ({note})"));
                }
                let span_class = if s.conflict { "shift conflict" } else { "shift" };
                format!("<span class=\"{span_class}\">{}</span>", html_escape(&text))
            })
            .collect();
        writeln!(out, "<td{class}>{}</td>", entries.join("<br>"))
    }

    fn write_document(
        &self,
        out: &mut String,
        model: &ScheduleModel,
        warnings: &[IngestWarning],
    ) -> fmt::Result {
        let title = html_escape(&self.options.title);
        let range = model.range();

        writeln!(out, "<!DOCTYPE html>")?;
        writeln!(out, "<html lang=\"en\">")?;
        writeln!(out, "<head>")?;
        writeln!(out, "<meta charset=\"utf-8\">")?;
        writeln!(out, "<title>{title}</title>")?;
        writeln!(out, "<style>\n{STYLE}\n</style>")?;
        writeln!(out, "</head>")?;
        writeln!(out, "<body>")?;
        writeln!(out, "<h1>{title}</h1>")?;
        writeln!(out, "<p class=\"range\">{} to {}</p>", range.start(), range.end())?;
        writeln!(out, "<table class=\"schedule\">")?;

        write!(out, "<thead><tr><th>Provider</th>")?;
        for day in model.days() {
            write!(
                out,
                "<th><time datetime=\"{}\">{}</time></th>",
                day.date(),
                day.date().format("%a %m/%d")
            )?;
        }
        writeln!(out, "</tr></thead>")?;

        writeln!(out, "<tbody>")?;
        let mut providers: Vec<&str> = model
            .providers()
            .iter()
            .map(|p| p.canonical_name())
            .filter(|name| model.shifts().any(|s| s.provider == *name))
            .collect();
        providers.sort_unstable();

        if providers.is_empty() {
            writeln!(
                out,
                "<tr><td class=\"empty\" colspan=\"{}\">No shifts scheduled</td></tr>",
                model.range().len_days() + 1
            )?;
        }
        for provider in providers {
            let shown = match self.options.max_name_length {
                Some(max) => ellipsis(provider, max),
                None => provider.into(),
            };
            writeln!(out, "<tr>")?;
            writeln!(
                out,
                "<th scope=\"row\" title=\"{}\">{}</th>",
                html_escape(provider),
                html_escape(&shown)
            )?;
            for day in model.days() {
                self.write_cell(out, day, provider)?;
            }
            writeln!(out, "</tr>")?;
        }
        writeln!(out, "</tbody>")?;
        writeln!(out, "</table>")?;

        if !warnings.is_empty() {
            writeln!(out, "<h2>Warnings</h2>")?;
            writeln!(out, "<ul class=\"warnings\">")?;
            for warning in warnings {
                writeln!(out, "<li>{}</li>", html_escape(&warning.to_string()))?;
            }
            writeln!(out, "</ul>")?;
        }

        writeln!(out, "</body>")?;
        writeln!(out, "</html>")
    }
}

impl Renderer for HtmlRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Html
    }

    fn render(&self, model: &ScheduleModel, warnings: &[IngestWarning]) -> CoreResult<String> {
        let mut out = String::new();
        self.write_document(&mut out, model, warnings)
            .map_err(|e| CoreError::Render(e.to_string()))?;
        Ok(out)
    }
}
