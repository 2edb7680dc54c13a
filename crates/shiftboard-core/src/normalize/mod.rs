//! Schedule normalization: raw records to a [`ScheduleModel`].
//!
//! The normalizer resolves each record's labels, unifies provider
//! identities, reconciles overlapping shifts and assembles the model for the
//! requested date range. Records that fail to resolve are dropped and
//! reported as [`IngestWarning`]s; only an empty record list fails the run.

mod conflicts;
mod labels;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult, RecordError};
use crate::identity::{AliasTable, IdentityRules, normalize_ws};
use crate::model::{Location, ScheduleModel, Shift};
use crate::parse::DocumentParser;
use crate::raw_record::RawRecord;
use crate::time::{DateRange, TimeRange};

use labels::TimeRules;

/// Options controlling label resolution and conflict handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// chrono date formats, tried in order.
    pub date_formats: Vec<String>,
    /// chrono time formats, tried in order for each side of a time label.
    pub time_formats: Vec<String>,
    /// Labels meaning "the whole working day" (case-insensitive).
    pub all_day_labels: Vec<String>,
    pub all_day_start: String,
    pub all_day_end: String,
    /// Location assigned to records without one.
    pub default_location: String,
    /// Length of the range a single slot time stands for. Unset means a
    /// single time is unparseable, unless the parser implies a length (see
    /// [`NormalizeOptions::for_parser`]).
    pub slot_minutes: Option<u32>,
    /// Also merge same-location shifts that merely touch.
    pub coalesce_adjacent: bool,
    #[serde(flatten)]
    pub identity: IdentityRules,
    /// Short codes keyed by location name (case-insensitive).
    #[serde(skip)]
    pub location_codes: HashMap<String, String>,
    /// Canonical providers and their aliases, seeded before any record.
    #[serde(skip)]
    pub known_providers: Vec<(String, Vec<String>)>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            date_formats: [
                "%Y-%m-%d",
                "%m/%d/%Y",
                "%m/%d/%y",
                "%a %m/%d/%Y",
                "%A, %B %d, %Y",
                "%a, %b %d, %Y",
                "%B %d, %Y",
                "%b %d, %Y",
                "%d %B %Y",
                "%d %b %Y",
            ]
            .map(String::from)
            .to_vec(),
            time_formats: ["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p", "%I:%M%p"]
                .map(String::from)
                .to_vec(),
            all_day_labels: vec!["All Day".to_string()],
            all_day_start: "08:00".to_string(),
            all_day_end: "17:00".to_string(),
            default_location: "Unassigned".to_string(),
            slot_minutes: None,
            coalesce_adjacent: false,
            identity: IdentityRules::default(),
            location_codes: HashMap::new(),
            known_providers: Vec::new(),
        }
    }
}

impl NormalizeOptions {
    /// Builder method to register a location short code.
    pub fn with_location_code(mut self, name: &str, code: impl Into<String>) -> Self {
        self.location_codes
            .insert(normalize_ws(name).to_lowercase(), code.into());
        self
    }

    /// Fills in the slot length the parser implies when none is configured.
    pub fn for_parser(mut self, parser: &dyn DocumentParser) -> Self {
        if self.slot_minutes.is_none() {
            self.slot_minutes = parser.implied_slot_minutes();
        }
        self
    }

    /// Builder method to seed a provider identity.
    pub fn with_provider<I, S>(mut self, canonical: impl Into<String>, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_providers.push((
            canonical.into(),
            aliases.into_iter().map(Into::into).collect(),
        ));
        self
    }
}

/// A non-fatal issue found while normalizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestWarning {
    /// A record failed to resolve and was left out.
    DroppedRecord { index: usize, error: RecordError },
    /// A provider has overlapping shifts at different locations.
    Conflict {
        provider: String,
        date: NaiveDate,
        shifts: Vec<Shift>,
    },
    /// A record is dated outside the requested range.
    OutOfRange { index: usize, date: NaiveDate },
    /// A document entry looked like schedule data but yielded no record.
    SkippedEntry { entry: String, reason: String },
    /// The feed stopped early for a provider's day; later slots are missing.
    Truncated {
        provider: String,
        date: String,
        next_start: String,
    },
}

impl IngestWarning {
    /// Rewrites provider names to the canonical names of `model`.
    ///
    /// Used after [`ScheduleModel::merge`] renamed providers of a source.
    pub fn canonicalize(&mut self, model: &ScheduleModel) {
        let rename = |name: &mut String| {
            if let Some(provider) = model.provider(name) {
                *name = provider.canonical_name().to_string();
            }
        };
        match self {
            Self::Conflict {
                provider, shifts, ..
            } => {
                rename(provider);
                for shift in shifts {
                    rename(&mut shift.provider);
                }
            }
            Self::Truncated { provider, .. } => rename(provider),
            Self::DroppedRecord { .. } | Self::OutOfRange { .. } | Self::SkippedEntry { .. } => {}
        }
    }
}

impl fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DroppedRecord { index, error } => {
                write!(f, "record {index} dropped: {error}")
            }
            Self::Conflict {
                provider,
                date,
                shifts,
            } => {
                let spans: Vec<String> = shifts
                    .iter()
                    .map(|s| format!("{} @ {}", s.range, s.location.name))
                    .collect();
                write!(
                    f,
                    "{provider} double-booked on {date}: {}",
                    spans.join(", ")
                )
            }
            Self::OutOfRange { index, date } => {
                write!(f, "record {index} dated {date} is outside the requested range")
            }
            Self::SkippedEntry { entry, reason } => write!(f, "{entry} skipped: {reason}"),
            Self::Truncated {
                provider,
                date,
                next_start,
            } => write!(
                f,
                "{provider} on {date}: feed stops before {next_start}, later slots are missing"
            ),
        }
    }
}

/// Result of one normalization run.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub model: ScheduleModel,
    pub warnings: Vec<IngestWarning>,
}

impl IngestOutcome {
    /// Returns true if the run produced no warnings.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Turns raw records into a schedule model for one requested date range.
#[derive(Debug, Clone)]
pub struct Normalizer {
    options: NormalizeOptions,
    range: DateRange,
    all_day: TimeRange,
    slot: Option<Duration>,
}

impl Normalizer {
    /// Creates a normalizer.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOption`] when no formats are configured,
    /// the all-day bounds do not form a range, or `slot_minutes` is zero.
    pub fn new(options: NormalizeOptions, range: DateRange) -> CoreResult<Self> {
        if options.date_formats.is_empty() {
            return Err(CoreError::invalid_option("date_formats", "at least one format is required"));
        }
        if options.time_formats.is_empty() {
            return Err(CoreError::invalid_option("time_formats", "at least one format is required"));
        }

        let bound = |name: &str, label: &str| {
            options
                .time_formats
                .iter()
                .find_map(|fmt| chrono::NaiveTime::parse_from_str(label.trim(), fmt).ok())
                .ok_or_else(|| CoreError::invalid_option(name, format!("unparseable time {label:?}")))
        };
        let start = bound("all_day_start", &options.all_day_start)?;
        let end = bound("all_day_end", &options.all_day_end)?;
        let all_day = TimeRange::new(start, end)
            .ok_or_else(|| CoreError::invalid_option("all_day_end", "must be after all_day_start"))?;

        let slot = match options.slot_minutes {
            Some(0) => return Err(CoreError::invalid_option("slot_minutes", "must be positive")),
            Some(minutes) => Some(Duration::minutes(i64::from(minutes))),
            None => None,
        };

        Ok(Self {
            options,
            range,
            all_day,
            slot,
        })
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Normalizes records given in document order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedDocument`] when `records` is empty.
    /// Per-record failures are reported in [`IngestOutcome::warnings`].
    pub fn normalize(&self, records: &[RawRecord]) -> CoreResult<IngestOutcome> {
        if records.is_empty() {
            return Err(CoreError::malformed("document contains no schedule records"));
        }

        let mut table = AliasTable::new(self.options.identity.clone());
        for (canonical, aliases) in &self.options.known_providers {
            table.seed(canonical, aliases);
        }

        let rules = TimeRules {
            formats: &self.options.time_formats,
            all_day_labels: &self.options.all_day_labels,
            all_day: self.all_day,
            slot: self.slot,
        };

        let mut warnings = Vec::new();
        let mut groups: BTreeMap<(NaiveDate, String), Vec<Shift>> = BTreeMap::new();

        for record in records {
            // Identities follow document order, whether or not the row survives.
            let provider = (!record.provider_label.trim().is_empty())
                .then(|| table.resolve(&record.provider_label).to_string());
            let resolved = self.resolve(record, &rules);
            let (date, range) = match resolved {
                Ok(parts) => parts,
                Err(error) => {
                    warn!(index = record.index, %error, "dropping schedule record");
                    warnings.push(IngestWarning::DroppedRecord {
                        index: record.index,
                        error,
                    });
                    continue;
                }
            };
            if !self.range.contains(date) {
                debug!(index = record.index, %date, "record outside requested range");
                warnings.push(IngestWarning::OutOfRange {
                    index: record.index,
                    date,
                });
                continue;
            }

            let Some(provider) = provider else {
                continue;
            };
            let mut shift = Shift::new(provider.clone(), date, range, self.location(record));
            shift.note = record.effective_note().map(normalize_ws);
            groups.entry((date, provider)).or_default().push(shift);
        }

        let mut shifts = Vec::new();
        for ((date, provider), group) in groups {
            let resolved = conflicts::reconcile(group, self.options.coalesce_adjacent);
            let flagged: Vec<Shift> = resolved.iter().filter(|s| s.conflict).cloned().collect();
            if !flagged.is_empty() {
                let warning = IngestWarning::Conflict {
                    provider,
                    date,
                    shifts: flagged,
                };
                warn!(%warning, "scheduling conflict");
                warnings.push(warning);
            }
            shifts.extend(resolved);
        }

        debug!(
            records = records.len(),
            shifts = shifts.len(),
            providers = table.len(),
            warnings = warnings.len(),
            "normalized schedule"
        );
        let model = ScheduleModel::assemble(
            self.range,
            table.into_providers(),
            shifts,
            self.options.identity.clone(),
        );
        Ok(IngestOutcome { model, warnings })
    }

    fn resolve(
        &self,
        record: &RawRecord,
        rules: &TimeRules<'_>,
    ) -> Result<(NaiveDate, TimeRange), RecordError> {
        if record.provider_label.trim().is_empty() {
            return Err(RecordError::EmptyProvider);
        }
        let date = labels::resolve_date(&record.date_label, &self.options.date_formats)?;
        let range = rules.resolve(&record.time_label)?;
        Ok((date, range))
    }

    fn location(&self, record: &RawRecord) -> Location {
        let location = Location::new(
            record
                .effective_location()
                .unwrap_or(self.options.default_location.as_str()),
        );
        match self.options.location_codes.get(&location.key()) {
            Some(code) => location.with_code(code.clone()),
            None => location,
        }
    }
}

/// Parses and normalizes one raw document.
///
/// # Errors
///
/// Returns [`CoreError::MalformedDocument`] when the parser finds no
/// anchors or no records. Entries the parser skipped come first in the
/// outcome's warnings.
pub fn ingest(
    raw: &str,
    parser: &dyn DocumentParser,
    normalizer: &Normalizer,
) -> CoreResult<IngestOutcome> {
    let parsed = parser.parse(raw)?;
    debug!(
        parser = parser.name(),
        records = parsed.records.len(),
        skipped = parsed.warnings.len(),
        "parsed document"
    );
    let mut outcome = normalizer.normalize(&parsed.records)?;
    let mut warnings = parsed.warnings;
    warnings.append(&mut outcome.warnings);
    outcome.warnings = warnings;
    Ok(outcome)
}
