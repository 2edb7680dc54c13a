//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/shiftboard/config.toml` by default.
//!
//! ```toml
//! [range]
//! start = "2025-02-03"
//! days = 5
//!
//! [[sources]]
//! name = "main"
//! url = "https://portal.example.com/schedule"
//! landing_url = "https://portal.example.com/"
//! session = "env::PORTAL_SESSION"
//! parser = "table"
//!
//! [[sources]]
//! name = "feed"
//! url = "https://portal.example.com/slots"
//! landing_url = "https://portal.example.com/practice"
//! parser = "slots"
//!
//! [sources.form]
//! visit_code = "SICK"
//!
//! [sources.fan_out]
//! facility_id = ["13", "14"]
//! provider_npi = ["1234567890", "1098765432"]
//!
//! [sources.more_slots]
//! url = "https://portal.example.com/more-slots"
//! form = { end_time = "23:59:00" }
//! carry = { provider_npi = "npi", facility_id = "facility_id" }
//!
//! [normalize]
//! all_day_start = "08:00"
//!
//! [providers]
//! "Jane Smith" = ["J. Smith", "Smith, Jane"]
//!
//! [locations]
//! "Main Street" = "MS"
//!
//! [output]
//! format = "html"
//! ```
//!
//! Session values support secret references (see [`crate::secret`]).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use shiftboard_core::{
    DateRange, FormatOptions, NormalizeOptions, Normalizer, OutputFormat, TimeFormat, parser_for,
};
use shiftboard_sources::{FileSource, RetryPolicy, ScheduleSource};

use crate::error::{ClientError, ClientResult};

/// Number of days shown when neither `days` nor `end` is configured.
pub const DEFAULT_DAYS: u32 = 5;

/// Configuration for the shiftboard client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Requested date range.
    pub range: RangeSettings,

    /// Fetch behaviour shared by all sources.
    pub fetch: FetchSettings,

    /// Label resolution settings passed to the normalizer.
    pub normalize: NormalizeOptions,

    /// Canonical provider name to its known aliases.
    pub providers: BTreeMap<String, Vec<String>>,

    /// Location name to short code.
    pub locations: BTreeMap<String, String>,

    /// Output settings.
    pub output: OutputSettings,

    /// Schedule sources, merged in order.
    pub sources: Vec<SourceSettings>,
}

/// The requested date range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeSettings {
    /// First date (defaults to today).
    pub start: Option<NaiveDate>,

    /// Number of days, start included.
    pub days: Option<u32>,

    /// Last date, as an alternative to `days`.
    pub end: Option<NaiveDate>,
}

impl RangeSettings {
    /// Resolves the range against today's date.
    pub fn resolve(&self, today: NaiveDate) -> ClientResult<DateRange> {
        let start = self.start.unwrap_or(today);
        let range = match (self.days, self.end) {
            (Some(_), Some(_)) => {
                return Err(ClientError::Config(
                    "range: set either `days` or `end`, not both".to_string(),
                ));
            }
            (None, Some(end)) => DateRange::new(start, end)?,
            (days, None) => DateRange::from_start_and_days(start, days.unwrap_or(DEFAULT_DAYS))?,
        };
        Ok(range)
    }
}

/// Fetch behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Attempts per source for transient failures.
    pub attempts: u32,

    /// HTTP request timeout in seconds.
    pub timeout: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: 30,
        }
    }
}

impl FetchSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_attempts(self.attempts)
    }
}

/// Output settings for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Renderer to use.
    pub format: OutputFormat,

    /// Write to this file instead of stdout.
    pub path: Option<PathBuf>,

    pub time_format: TimeFormat,

    /// Document title.
    pub title: Option<String>,

    /// Show location codes next to names.
    pub show_codes: bool,

    /// Maximum provider name length in the HTML grid.
    pub max_name_length: Option<usize>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            path: None,
            time_format: TimeFormat::H24,
            title: None,
            show_codes: true,
            max_name_length: None,
        }
    }
}

impl OutputSettings {
    /// Converts to renderer options.
    pub fn format_options(&self) -> FormatOptions {
        let mut options = FormatOptions {
            time_format: self.time_format,
            show_codes: self.show_codes,
            max_name_length: self.max_name_length,
            ..Default::default()
        };
        if let Some(ref title) = self.title {
            options.title = title.clone();
        }
        options
    }
}

/// A schedule source: a local file or an HTTP endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Name used in logs and errors.
    pub name: String,

    /// URL of the schedule page or feed.
    pub url: Option<String>,

    /// Path of a saved schedule page or feed.
    pub path: Option<PathBuf>,

    /// Parser identifier (`table` or `slots`); guessed from the document when unset.
    pub parser: Option<String>,

    /// Raw `Cookie` header value (supports `pass::`, `env::` and `file::` prefixes).
    pub session: Option<String>,

    /// Page loaded first to obtain cookies and the CSRF token.
    pub landing_url: Option<String>,

    /// First date covered by this source (defaults to the global range start).
    pub start: Option<NaiveDate>,

    /// Days covered by this source (defaults to the global range length).
    pub days: Option<u32>,

    /// Form fields; when present the document is requested with POST.
    pub form: BTreeMap<String, String>,

    /// Form fields requested once per listed value.
    pub fan_out: BTreeMap<String, Vec<String>>,

    /// Endpoint continuing slot feed days cut short by `next_start_time`.
    pub more_slots: Option<MoreSlotsSettings>,
}

/// The "more slots" endpoint of a slot feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoreSlotsSettings {
    pub url: String,

    /// Requests per provider day before giving up; unset uses the default bound.
    pub max_requests: Option<usize>,

    /// Fixed form fields.
    pub form: BTreeMap<String, String>,

    /// Request form fields copied over, keyed by request field name.
    pub carry: BTreeMap<String, String>,
}

impl SourceSettings {
    /// Ad hoc source from a command-line argument: URLs start with
    /// `http://` or `https://`, anything else is a path.
    pub fn from_arg(arg: &str) -> Self {
        let is_url = arg.starts_with("http://") || arg.starts_with("https://");
        Self {
            name: arg.to_string(),
            url: is_url.then(|| arg.to_string()),
            path: (!is_url).then(|| PathBuf::from(arg)),
            ..Default::default()
        }
    }

    /// Date range this source is requested for.
    pub fn range(&self, global: DateRange) -> ClientResult<DateRange> {
        if self.start.is_none() && self.days.is_none() {
            return Ok(global);
        }
        let start = self.start.unwrap_or(global.start());
        let days = match self.days {
            Some(days) => days,
            None => u32::try_from(global.len_days())
                .map_err(|_| ClientError::Config(format!("source {}: range too long", self.name)))?,
        };
        Ok(DateRange::from_start_and_days(start, days)?)
    }

    /// Builds the source.
    pub fn build(&self, fetch: &FetchSettings) -> ClientResult<Box<dyn ScheduleSource>> {
        match (&self.url, &self.path) {
            (Some(_), Some(_)) => Err(ClientError::Config(format!(
                "source {}: set either `url` or `path`, not both",
                self.name
            ))),
            (None, None) => Err(ClientError::Config(format!(
                "source {}: one of `url` or `path` is required",
                self.name
            ))),
            (None, Some(path)) => Ok(Box::new(FileSource::new(&self.name, path))),
            (Some(url), None) => self.build_http(url, fetch),
        }
    }

    #[cfg(feature = "http")]
    fn build_http(&self, url: &str, fetch: &FetchSettings) -> ClientResult<Box<dyn ScheduleSource>> {
        use shiftboard_sources::{HttpConfig, HttpSource, SlotContinuation};

        let invalid = |field: &str, reason: String| {
            ClientError::Config(format!("source {}: invalid {}: {}", self.name, field, reason))
        };

        let mut config = HttpConfig::new(url)
            .map_err(|e| invalid("url", e.to_string()))?
            .with_timeout(std::time::Duration::from_secs(fetch.timeout));
        if let Some(ref landing) = self.landing_url {
            config = config
                .with_landing_url(landing)
                .map_err(|e| invalid("landing_url", e.to_string()))?;
        }
        let session = crate::secret::resolve_optional(self.session.as_deref()).map_err(|e| {
            ClientError::Config(format!("source {}: failed to resolve session: {}", self.name, e))
        })?;
        if let Some(session) = session {
            config = config.with_session(session);
        }
        for (key, value) in &self.form {
            config = config.with_form_field(key, value);
        }
        for (key, values) in &self.fan_out {
            config = config.with_fan_out(key, values);
        }
        if let Some(ref more) = self.more_slots {
            let mut continuation = SlotContinuation::new(&more.url)
                .map_err(|e| invalid("more_slots.url", e.to_string()))?;
            if let Some(max) = more.max_requests {
                continuation = continuation.with_max_requests(max);
            }
            for (key, value) in &more.form {
                continuation = continuation.with_form_field(key, value);
            }
            for (from, to) in &more.carry {
                continuation = continuation.with_carried_field(from, to);
            }
            config = config.with_continuation(continuation);
        }

        Ok(Box::new(HttpSource::new(&self.name, config)?))
    }

    #[cfg(not(feature = "http"))]
    fn build_http(&self, _url: &str, _fetch: &FetchSettings) -> ClientResult<Box<dyn ScheduleSource>> {
        Err(ClientError::Config(format!(
            "source {}: built without HTTP support",
            self.name
        )))
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shiftboard")
    }

    /// Normalizer options with the `[providers]` and `[locations]` tables applied.
    pub fn normalize_options(&self) -> NormalizeOptions {
        let mut options = self.normalize.clone();
        for (canonical, aliases) in &self.providers {
            options = options.with_provider(canonical.as_str(), aliases.iter().map(String::as_str));
        }
        for (name, code) in &self.locations {
            options = options.with_location_code(name, code.as_str());
        }
        options
    }

    /// Checks everything that can be checked without fetching.
    pub fn validate(&self, today: NaiveDate) -> ClientResult<()> {
        if self.sources.is_empty() {
            return Err(ClientError::Config("no sources configured".to_string()));
        }
        if self.fetch.attempts == 0 {
            return Err(ClientError::Config("fetch.attempts must be at least 1".to_string()));
        }

        let global = self.range.resolve(today)?;
        let options = self.normalize_options();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ClientError::Config("every source needs a name".to_string()));
            }
            if let Some(ref parser) = source.parser {
                parser_for(parser)?;
            }
            match (&source.url, &source.path) {
                (Some(_), Some(_)) | (None, None) => {
                    return Err(ClientError::Config(format!(
                        "source {}: exactly one of `url` or `path` is required",
                        source.name
                    )));
                }
                _ => {}
            }
            Normalizer::new(options.clone(), source.range(global)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod range {
        use super::*;

        #[test]
        fn defaults_to_five_days_from_today() {
            let range = RangeSettings::default().resolve(date(2025, 2, 3)).unwrap();
            assert_eq!(range.start(), date(2025, 2, 3));
            assert_eq!(range.end(), date(2025, 2, 7));
        }

        #[test]
        fn end_or_days() {
            let by_end = RangeSettings {
                start: Some(date(2025, 3, 1)),
                end: Some(date(2025, 3, 2)),
                ..Default::default()
            };
            assert_eq!(by_end.resolve(date(2025, 1, 1)).unwrap().len_days(), 2);

            let both = RangeSettings {
                days: Some(3),
                end: Some(date(2025, 3, 2)),
                ..Default::default()
            };
            assert!(matches!(
                both.resolve(date(2025, 3, 1)),
                Err(ClientError::Config(_))
            ));

            let inverted = RangeSettings {
                start: Some(date(2025, 3, 5)),
                end: Some(date(2025, 3, 2)),
                ..Default::default()
            };
            assert!(matches!(
                inverted.resolve(date(2025, 3, 1)),
                Err(ClientError::Core(_))
            ));
        }

        #[test]
        fn source_range_falls_back_to_global() {
            let global = DateRange::from_start_and_days(date(2025, 2, 3), 5).unwrap();
            let source = SourceSettings::from_arg("week.html");
            assert_eq!(source.range(global).unwrap(), global);

            let later = SourceSettings {
                start: Some(date(2025, 2, 10)),
                ..source
            };
            let range = later.range(global).unwrap();
            assert_eq!(range.start(), date(2025, 2, 10));
            assert_eq!(range.len_days(), 5);
        }
    }

    mod sources {
        use super::*;

        #[test]
        fn from_arg_tells_urls_from_paths() {
            let url = SourceSettings::from_arg("https://portal.example.com/week");
            assert!(url.url.is_some() && url.path.is_none());

            let path = SourceSettings::from_arg("exports/week.html");
            assert_eq!(path.path, Some(PathBuf::from("exports/week.html")));
            assert!(path.url.is_none());
        }

        #[test]
        fn build_requires_exactly_one_location() {
            let fetch = FetchSettings::default();
            let neither = SourceSettings {
                name: "empty".to_string(),
                ..Default::default()
            };
            assert!(neither.build(&fetch).is_err());

            let both = SourceSettings {
                url: Some("https://a.example.com/".to_string()),
                ..SourceSettings::from_arg("week.html")
            };
            assert!(both.build(&fetch).is_err());

            let file = SourceSettings::from_arg("week.html").build(&fetch).unwrap();
            assert_eq!(file.name(), "week.html");
            assert_eq!(file.location(), "week.html");
        }

        #[cfg(feature = "http")]
        #[test]
        fn build_http_source_resolves_session() {
            unsafe {
                std::env::set_var("_SHIFTBOARD_CONFIG_TEST_SESSION", "SID=1");
            }
            let settings = SourceSettings {
                session: Some("env::_SHIFTBOARD_CONFIG_TEST_SESSION".to_string()),
                landing_url: Some("https://portal.example.com/".to_string()),
                ..SourceSettings::from_arg("https://portal.example.com/week")
            };
            let source = settings.build(&FetchSettings::default()).unwrap();
            assert_eq!(source.location(), "https://portal.example.com/week");

            let broken = SourceSettings {
                landing_url: Some("not a url".to_string()),
                ..settings
            };
            assert!(broken.build(&FetchSettings::default()).is_err());

            let bad_more = SourceSettings {
                landing_url: None,
                more_slots: Some(MoreSlotsSettings {
                    url: "::".to_string(),
                    ..Default::default()
                }),
                ..broken
            };
            let err = bad_more.build(&FetchSettings::default()).err().expect("expected build to fail");
            assert!(err.to_string().contains("more_slots.url"));
            unsafe {
                std::env::remove_var("_SHIFTBOARD_CONFIG_TEST_SESSION");
            }
        }
    }

    mod toml_files {
        use super::*;

        const SAMPLE: &str = r#"
debug = true

[range]
start = "2025-02-03"
days = 2

[normalize]
all_day_start = "07:30"
honorifics = ["dr"]

[providers]
"Jane Smith" = ["J. Smith"]

[locations]
"Main Street" = "MS"

[output]
format = "html"
time_format = "h12"
title = "Clinic"

[[sources]]
name = "export"
path = "week.html"
parser = "table"

[[sources]]
name = "feed"
url = "https://portal.example.com/slots"
start = "2025-02-05"
days = 1

[sources.form]
facility_id = "13"

[sources.fan_out]
provider_npi = ["1", "2"]

[sources.more_slots]
url = "https://portal.example.com/more"
form = { end_time = "23:59:00" }
carry = { provider_npi = "npi" }
"#;

        #[test]
        fn parses_full_file() {
            let config: ClientConfig = toml::from_str(SAMPLE).unwrap();
            assert!(config.debug);
            assert_eq!(config.range.days, Some(2));
            assert_eq!(config.normalize.all_day_start, "07:30");
            assert_eq!(config.normalize.identity.honorifics, vec!["dr".to_string()]);
            assert_eq!(config.normalize.all_day_end, "17:00");
            assert_eq!(config.output.format, OutputFormat::Html);
            assert_eq!(config.output.format_options().time_format, TimeFormat::H12);
            assert_eq!(config.output.format_options().title, "Clinic");
            assert_eq!(config.sources.len(), 2);
            assert_eq!(config.sources[1].form.get("facility_id").map(String::as_str), Some("13"));
            assert_eq!(config.sources[1].fan_out["provider_npi"], vec!["1", "2"]);
            let more = config.sources[1].more_slots.as_ref().unwrap();
            assert_eq!(more.carry.get("provider_npi").map(String::as_str), Some("npi"));
            assert_eq!(more.max_requests, None);
            assert!(config.sources[0].more_slots.is_none());
            assert!(config.validate(date(2025, 2, 1)).is_ok());
        }

        #[test]
        fn providers_and_locations_reach_normalizer_options() {
            let config: ClientConfig = toml::from_str(SAMPLE).unwrap();
            let options = config.normalize_options();
            assert_eq!(
                options.known_providers,
                vec![("Jane Smith".to_string(), vec!["J. Smith".to_string()])]
            );
            assert_eq!(options.location_codes.get("main street").map(String::as_str), Some("MS"));
        }

        #[test]
        fn empty_file_is_default() {
            let config: ClientConfig = toml::from_str("").unwrap();
            assert!(!config.debug);
            assert!(config.sources.is_empty());
            assert_eq!(config.fetch, FetchSettings::default());
            assert!(matches!(
                config.validate(date(2025, 2, 1)),
                Err(ClientError::Config(_))
            ));
        }

        #[test]
        fn validate_rejects_unknown_parser_and_bad_options() {
            let mut config: ClientConfig = toml::from_str(SAMPLE).unwrap();
            config.sources[0].parser = Some("pdf".to_string());
            assert!(matches!(
                config.validate(date(2025, 2, 1)),
                Err(ClientError::Core(_))
            ));

            let mut config: ClientConfig = toml::from_str(SAMPLE).unwrap();
            config.normalize.all_day_end = "06:00".to_string();
            assert!(config.validate(date(2025, 2, 1)).is_err());
        }

        #[test]
        fn dump_round_trips() {
            let config: ClientConfig = toml::from_str(SAMPLE).unwrap();
            let dumped = toml::to_string_pretty(&config).unwrap();
            let reloaded: ClientConfig = toml::from_str(&dumped).unwrap();
            assert_eq!(reloaded.sources, config.sources);
            assert_eq!(reloaded.normalize, config.normalize);
            assert_eq!(reloaded.range, config.range);
        }

        #[test]
        fn load_from_reports_parse_errors() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("config.toml");
            std::fs::write(&path, "debug = \"yes\"").unwrap();
            assert!(ClientConfig::load_from(&path).unwrap_err().contains("parse"));

            std::fs::write(&path, SAMPLE).unwrap();
            assert_eq!(ClientConfig::load_from(&path).unwrap().sources.len(), 2);
        }
    }
}
