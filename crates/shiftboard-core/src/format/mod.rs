//! Rendering of schedule models.
//!
//! This module provides renderers for the normalized schedule:
//! - **Text**: one block per date, one line per shift, for terminals and mail
//! - **JSON**: machine-readable model plus warnings
//! - **HTML**: a provider-by-date grid page
//!
//! # Example
//!
//! ```ignore
//! use shiftboard_core::format::{renderer_for, FormatOptions, OutputFormat};
//!
//! let renderer = renderer_for(OutputFormat::Text, FormatOptions::default());
//! let page = renderer.render(&outcome.model, &outcome.warnings)?;
//! ```

mod html;
mod json;
mod text;

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::model::{Location, ScheduleModel};
use crate::normalize::IngestWarning;
use crate::time::TimeRange;

pub use html::HtmlRenderer;
pub use json::{JsonDay, JsonOutput, JsonProvider, JsonRange, JsonRenderer, JsonShift};
pub use text::TextRenderer;

/// The template identifier selecting a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Plain text, one block per date.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
    /// Standalone HTML page with a provider-by-date grid.
    Html,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Html => "html",
        }
    }

    /// Conventional file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
            Self::Html => "html",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            other => Err(crate::error::CoreError::invalid_option(
                "format",
                format!("unknown output format {other:?}"),
            )),
        }
    }
}

/// Time format preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    /// 24-hour format (e.g., "14:30").
    #[default]
    H24,
    /// 12-hour format with AM/PM (e.g., "2:30 PM").
    H12,
}

impl TimeFormat {
    pub fn format_time(&self, t: NaiveTime) -> String {
        match self {
            Self::H24 => t.format("%H:%M").to_string(),
            Self::H12 => t.format("%-I:%M %p").to_string(),
        }
    }

    pub fn format_range(&self, range: &TimeRange) -> String {
        format!(
            "{}-{}",
            self.format_time(range.start()),
            self.format_time(range.end())
        )
    }
}

/// Configuration options for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub time_format: TimeFormat,
    /// Show location short codes next to location names.
    pub show_codes: bool,
    /// Document title.
    pub title: String,
    /// Maximum provider name length in the HTML grid (truncated with ellipsis).
    pub max_name_length: Option<usize>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            time_format: TimeFormat::H24,
            show_codes: true,
            title: "Provider schedule".to_string(),
            max_name_length: None,
        }
    }
}

impl FormatOptions {
    /// Location text as shown in listings: name, plus the code if enabled.
    pub fn location_text(&self, location: &Location) -> String {
        match (&location.code, self.show_codes) {
            (Some(code), true) => format!("{} [{}]", location.name, code),
            _ => location.name.clone(),
        }
    }
}

/// Renders a model and its warnings into an output document.
pub trait Renderer: Send + Sync {
    /// The template identifier of this renderer.
    fn format(&self) -> OutputFormat;

    /// Renders the document.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Render`](crate::CoreError::Render) when the
    /// document cannot be produced.
    fn render(&self, model: &ScheduleModel, warnings: &[IngestWarning]) -> CoreResult<String>;
}

/// Returns the renderer for a template identifier.
pub fn renderer_for(format: OutputFormat, options: FormatOptions) -> Box<dyn Renderer> {
    match format {
        OutputFormat::Text => Box::new(TextRenderer::new(options)),
        OutputFormat::Json => Box::new(JsonRenderer::new(options)),
        OutputFormat::Html => Box::new(HtmlRenderer::new(options)),
    }
}

/// Truncates a string to a maximum number of characters, adding "..." if truncated.
pub fn ellipsis(s: &str, max_len: usize) -> Cow<'_, str> {
    if max_len == 0 {
        return Cow::Borrowed("");
    }
    if s.chars().count() <= max_len {
        return Cow::Borrowed(s);
    }
    let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
    Cow::Owned(format!("{truncated}..."))
}

/// Escapes text for HTML display.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    mod helpers {
        use super::*;

        #[test]
        fn ellipsis_truncates() {
            assert_eq!(ellipsis("hello", 10), "hello");
            assert_eq!(ellipsis("hello world", 8), "hello...");
            assert_eq!(ellipsis("hello", 0), "");
        }

        #[test]
        fn html_escape_special_chars() {
            assert_eq!(
                html_escape("<b>O'Neil & \"Co\"</b>"),
                "&lt;b&gt;O&#x27;Neil &amp; &quot;Co&quot;&lt;/b&gt;"
            );
        }
    }

    mod options {
        use super::*;

        #[test]
        fn time_formats() {
            let range = TimeRange::from_hm((9, 5), (13, 30)).unwrap();
            assert_eq!(TimeFormat::H24.format_range(&range), "09:05-13:30");
            assert_eq!(TimeFormat::H12.format_range(&range), "9:05 AM-1:30 PM");
        }

        #[test]
        fn location_text_respects_show_codes() {
            let location = Location::new("Main Street").with_code("MS");
            let mut options = FormatOptions::default();
            assert_eq!(options.location_text(&location), "Main Street [MS]");
            options.show_codes = false;
            assert_eq!(options.location_text(&location), "Main Street");
        }

        #[test]
        fn output_format_parsing() {
            assert_eq!("HTML".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
            assert_eq!("txt".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
            assert!("pdf".parse::<OutputFormat>().is_err());
            assert_eq!(OutputFormat::Json.extension(), "json");
            assert_eq!(
                serde_json::to_string(&OutputFormat::Html).unwrap(),
                "\"html\""
            );
        }

        #[test]
        fn renderer_for_matches_format() {
            for format in [OutputFormat::Text, OutputFormat::Json, OutputFormat::Html] {
                assert_eq!(renderer_for(format, FormatOptions::default()).format(), format);
            }
        }
    }
}
