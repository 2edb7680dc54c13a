//! Core types: schedule model, document parsers, normalizer, renderers

pub mod error;
pub mod format;
pub mod identity;
pub mod model;
pub mod normalize;
pub mod parse;
pub mod raw_record;
pub mod time;
pub mod tracing;

pub use error::{CoreError, CoreResult, RecordError};
pub use format::{
    FormatOptions, HtmlRenderer, JsonOutput, JsonRenderer, OutputFormat, Renderer, TextRenderer,
    TimeFormat, ellipsis, html_escape, renderer_for,
};
pub use identity::{AliasTable, IdentityRules, normalize_ws};
pub use model::{DaySchedule, Location, Provider, ScheduleModel, Shift};
pub use normalize::{IngestOutcome, IngestWarning, NormalizeOptions, Normalizer, ingest};
pub use parse::{
    DEFAULT_SLOT_MINUTES, DocumentParser, PARSER_NAMES, ParsedDocument, SlotFeedParser, TableParser,
    parser_for,
};
pub use raw_record::RawRecord;
pub use time::{DateRange, TimeRange};
pub use crate::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
