//! Date and time label resolution.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveTime};
use regex::Regex;

use crate::error::RecordError;
use crate::identity::normalize_ws;
use crate::time::TimeRange;

static ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").expect("Invalid ordinal regex"));

/// Separators between the start and end of a time label.
static RANGE_SEP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:-|\u{2013}|\u{2014}|\bto\b|\buntil\b)\s*").expect("Invalid separator regex")
});

static MERIDIEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*?)\s*([ap])\.?\s*m\.?$").expect("Invalid meridiem regex")
});

static HOUR_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}$").expect("Invalid hour regex"));

/// Resolves a date label against chrono format strings, tried in order.
///
/// Surrounding whitespace, a trailing period and ordinal suffixes
/// ("3rd", "21st") are tolerated.
pub(crate) fn resolve_date(label: &str, formats: &[String]) -> Result<NaiveDate, RecordError> {
    let cleaned = normalize_ws(label);
    let cleaned = cleaned.trim_end_matches('.');
    let stripped = ORDINAL_RE.replace_all(cleaned, "$1");

    [cleaned, stripped.as_ref()]
        .into_iter()
        .find_map(|candidate| {
            formats
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
        })
        .ok_or_else(|| RecordError::DateParse {
            label: label.to_string(),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    fn other(self) -> Self {
        match self {
            Self::Am => Self::Pm,
            Self::Pm => Self::Am,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Am => "AM",
            Self::Pm => "PM",
        }
    }
}

/// One side of a time label, split into clock text and meridiem.
#[derive(Debug, Clone)]
struct ClockLabel {
    raw: String,
    clock: String,
    meridiem: Option<Meridiem>,
}

impl ClockLabel {
    fn new(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.to_lowercase().as_str() {
            "noon" => return Self::fixed(raw, "12:00", Meridiem::Pm),
            "midnight" => return Self::fixed(raw, "12:00", Meridiem::Am),
            _ => {}
        }

        let (clock, meridiem) = match MERIDIEM_RE.captures(raw) {
            Some(caps) => {
                let meridiem = if caps[2].eq_ignore_ascii_case("a") {
                    Meridiem::Am
                } else {
                    Meridiem::Pm
                };
                (caps[1].trim().to_string(), Some(meridiem))
            }
            None => (raw.to_string(), None),
        };
        let clock = if HOUR_ONLY_RE.is_match(&clock) {
            format!("{clock}:00")
        } else {
            clock
        };
        Self {
            raw: raw.to_string(),
            clock,
            meridiem,
        }
    }

    fn fixed(raw: &str, clock: &str, meridiem: Meridiem) -> Self {
        Self {
            raw: raw.to_string(),
            clock: clock.to_string(),
            meridiem: Some(meridiem),
        }
    }

    /// Parses the label, optionally borrowing a meridiem it lacks.
    fn resolve(&self, formats: &[String], borrowed: Option<Meridiem>) -> Option<NaiveTime> {
        let mut candidates = vec![self.raw.clone()];
        match self.meridiem.or(borrowed) {
            Some(m) => candidates.push(format!("{} {}", self.clock, m.suffix())),
            None => candidates.push(self.clock.clone()),
        }
        // A borrowed meridiem must win over the bare 24h reading of "9:00".
        if self.meridiem.is_none() && borrowed.is_some() {
            candidates.reverse();
        }
        candidates.iter().find_map(|c| {
            formats
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(c, fmt).ok())
        })
    }
}

/// Rules for resolving time labels into [`TimeRange`]s.
#[derive(Debug, Clone)]
pub(crate) struct TimeRules<'a> {
    pub formats: &'a [String],
    pub all_day_labels: &'a [String],
    pub all_day: TimeRange,
    pub slot: Option<Duration>,
}

impl TimeRules<'_> {
    /// Resolves a time label.
    ///
    /// Accepted shapes are an all-day label, `start <sep> end` where the
    /// separator is a hyphen, an en or em dash, "to" or "until", and a
    /// single time when a slot length is configured. A side lacking AM/PM
    /// borrows it from the other side. Ranges ending at or before their
    /// start are rejected.
    pub fn resolve(&self, label: &str) -> Result<TimeRange, RecordError> {
        let fail = || RecordError::TimeParse {
            label: label.to_string(),
        };
        let cleaned = normalize_ws(label);
        if cleaned.is_empty() {
            return Err(fail());
        }
        if self
            .all_day_labels
            .iter()
            .any(|l| normalize_ws(l).eq_ignore_ascii_case(&cleaned))
        {
            return Ok(self.all_day);
        }

        let parts: Vec<&str> = RANGE_SEP_RE
            .split(&cleaned)
            .filter(|p| !p.is_empty())
            .collect();
        match parts.as_slice() {
            [single] => {
                let slot = self.slot.ok_or_else(fail)?;
                let start = ClockLabel::new(single)
                    .resolve(self.formats, None)
                    .ok_or_else(fail)?;
                TimeRange::from_duration(start, slot).ok_or_else(fail)
            }
            [start, end] => self.resolve_pair(start, end).ok_or_else(fail),
            _ => Err(fail()),
        }
    }

    fn resolve_pair(&self, start: &str, end: &str) -> Option<TimeRange> {
        let start = ClockLabel::new(start);
        let end = ClockLabel::new(end);

        match (start.meridiem, end.meridiem) {
            (None, Some(m)) => {
                let end_time = end.resolve(self.formats, None)?;
                [m, m.other()].into_iter().find_map(|guess| {
                    let start_time = start.resolve(self.formats, Some(guess))?;
                    TimeRange::new(start_time, end_time)
                })
            }
            (Some(m), None) => {
                let start_time = start.resolve(self.formats, None)?;
                let end_time = end
                    .resolve(self.formats, Some(m))
                    .filter(|t| *t > start_time)
                    .or_else(|| end.resolve(self.formats, Some(m.other())))?;
                TimeRange::new(start_time, end_time)
            }
            _ => TimeRange::new(
                start.resolve(self.formats, None)?,
                end.resolve(self.formats, None)?,
            ),
        }
    }
}
