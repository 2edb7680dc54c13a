//! Canonical schedule model.
//!
//! This module provides the types handed to rendering:
//! - [`Provider`]: a canonical provider identity with its label variants
//! - [`Location`]: a site a provider works at
//! - [`Shift`]: one provider's assignment to a time range and location
//! - [`DaySchedule`]: the ordered shifts of one date
//! - [`ScheduleModel`]: every date of the requested range plus the providers
//!
//! The model is built once per ingestion run by the normalizer and is
//! read-only afterwards; only shared references to its parts are handed out.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::identity::{AliasTable, IdentityRules, normalize_ws};
use crate::time::{DateRange, TimeRange};

/// A provider (physician, nurse practitioner, ...) known to the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provider {
    canonical_name: String,
    aliases: BTreeSet<String>,
}

impl Provider {
    /// Creates a provider with no alias variants.
    pub fn new(canonical_name: impl Into<String>) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            aliases: BTreeSet::new(),
        }
    }

    /// The canonical name (the first label seen for this provider).
    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    /// Label variants seen besides the canonical name.
    pub fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }

    /// Returns true if `label` is the canonical name or a recorded alias.
    pub fn answers_to(&self, label: &str) -> bool {
        let label = normalize_ws(label);
        self.canonical_name == label || self.aliases.contains(&label)
    }

    pub(crate) fn add_alias(&mut self, alias: &str) {
        if alias != self.canonical_name {
            self.aliases.insert(alias.to_string());
        }
    }
}

/// A named site a provider works at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    /// Display name, whitespace-normalized.
    pub name: String,
    /// Optional short code (e.g. "MS" for "Main Street").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Location {
    /// Creates a location without a short code.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: normalize_ws(name.as_ref()),
            code: None,
        }
    }

    /// Builder method to set the short code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Case-insensitive comparison key.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Returns the short code if set, otherwise the name.
    pub fn label(&self) -> &str {
        self.code.as_deref().unwrap_or(&self.name)
    }
}

/// One provider's assignment to a time range and location on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shift {
    /// Canonical name of the provider.
    pub provider: String,
    /// Calendar date of the shift.
    pub date: NaiveDate,
    /// Wall-clock span.
    pub range: TimeRange,
    /// Where the shift takes place.
    pub location: Location,
    /// Free-text note carried over from the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Set when the shift overlaps another shift of the same provider on
    /// the same date at a different location.
    pub conflict: bool,
}

impl Shift {
    /// Creates a new shift.
    pub fn new(
        provider: impl Into<String>,
        date: NaiveDate,
        range: TimeRange,
        location: Location,
    ) -> Self {
        Self {
            provider: provider.into(),
            date,
            range,
            location,
            note: None,
            conflict: false,
        }
    }

    /// Builder method to set the note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Returns true if the shift overlaps `other` in time.
    pub fn overlaps(&self, other: &Shift) -> bool {
        self.date == other.date && self.range.overlaps(&other.range)
    }

    fn sort_key(&self) -> (chrono::NaiveTime, &str, chrono::NaiveTime, String) {
        (
            self.range.start(),
            self.provider.as_str(),
            self.range.end(),
            self.location.key(),
        )
    }
}

/// The ordered shifts of one calendar date.
///
/// Shifts are sorted by start time, ties broken by provider canonical name,
/// then end time, then location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySchedule {
    date: NaiveDate,
    shifts: Vec<Shift>,
}

impl DaySchedule {
    fn new(date: NaiveDate, mut shifts: Vec<Shift>) -> Self {
        shifts.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Self { date, shifts }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn shifts(&self) -> &[Shift] {
        &self.shifts
    }

    /// Returns true if nobody works this date.
    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }

    /// Returns true if any shift on this date is flagged as a conflict.
    pub fn has_conflict(&self) -> bool {
        self.shifts.iter().any(|s| s.conflict)
    }

    /// Shifts of one provider (by canonical name) on this date.
    pub fn shifts_of<'a>(&'a self, canonical: &'a str) -> impl Iterator<Item = &'a Shift> + 'a {
        self.shifts.iter().filter(move |s| s.provider == canonical)
    }
}

/// The canonical, date-complete schedule of one run.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleModel {
    range: DateRange,
    days: BTreeMap<NaiveDate, DaySchedule>,
    providers: Vec<Provider>,
    #[serde(skip)]
    rules: IdentityRules,
}

impl ScheduleModel {
    /// Builds a model from resolved shifts.
    ///
    /// Every date of `range` gets a [`DaySchedule`], empty or not. Shifts
    /// dated outside `range` are discarded.
    pub(crate) fn assemble(
        range: DateRange,
        providers: Vec<Provider>,
        shifts: Vec<Shift>,
        rules: IdentityRules,
    ) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Vec<Shift>> =
            range.days().map(|d| (d, Vec::new())).collect();
        for shift in shifts {
            if let Some(bucket) = by_date.get_mut(&shift.date) {
                bucket.push(shift);
            }
        }
        let days = by_date
            .into_iter()
            .map(|(date, shifts)| (date, DaySchedule::new(date, shifts)))
            .collect();

        Self {
            range,
            days,
            providers,
            rules,
        }
    }

    /// The requested date range this model covers.
    pub fn range(&self) -> DateRange {
        self.range
    }

    /// The schedule of one date, if it lies within the range.
    pub fn day(&self, date: NaiveDate) -> Option<&DaySchedule> {
        self.days.get(&date)
    }

    /// All day schedules in date order.
    pub fn days(&self) -> impl Iterator<Item = &DaySchedule> {
        self.days.values()
    }

    /// All known providers in first-seen order.
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Finds a provider by canonical name, recorded alias, or match key.
    pub fn provider(&self, label: &str) -> Option<&Provider> {
        self.providers
            .iter()
            .find(|p| p.answers_to(label))
            .or_else(|| {
                let key = self.rules.match_key(label);
                self.providers
                    .iter()
                    .find(|p| self.rules.match_key(p.canonical_name()) == key)
            })
    }

    /// Shifts of one provider on one date, in day order.
    ///
    /// `provider` may be any label that resolves to a known provider.
    pub fn shifts_for(&self, provider: &str, date: NaiveDate) -> Vec<&Shift> {
        let (Some(provider), Some(day)) = (self.provider(provider), self.day(date)) else {
            return Vec::new();
        };
        day.shifts_of(provider.canonical_name()).collect()
    }

    /// All shifts in date order.
    pub fn shifts(&self) -> impl Iterator<Item = &Shift> {
        self.days.values().flat_map(|d| d.shifts.iter())
    }

    /// All shifts flagged as conflicts, in date order.
    pub fn conflicts(&self) -> impl Iterator<Item = &Shift> {
        self.shifts().filter(|s| s.conflict)
    }

    /// Total number of shifts across all dates.
    pub fn shift_count(&self) -> usize {
        self.days.values().map(|d| d.shifts.len()).sum()
    }

    /// Merges independently normalized models by date-range union.
    ///
    /// Provider identities are unified through a fresh alias table walked
    /// in the given order, so the first model's canonical names win.
    /// Dates lying between merged ranges are filled with empty days.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConflictingSource`] when two ranges share a
    /// date, and [`CoreError::InvalidOption`] when `models` is empty.
    pub fn merge(models: Vec<ScheduleModel>, rules: &IdentityRules) -> CoreResult<ScheduleModel> {
        if models.is_empty() {
            return Err(CoreError::invalid_option("sources", "nothing to merge"));
        }

        let mut ranges: Vec<DateRange> = models.iter().map(|m| m.range).collect();
        ranges.sort_by_key(|r| r.start());
        for pair in ranges.windows(2) {
            if pair[0].overlaps(&pair[1]) {
                return Err(CoreError::ConflictingSource {
                    first: pair[0],
                    second: pair[1],
                });
            }
        }
        let span = ranges
            .iter()
            .skip(1)
            .fold(ranges[0], |acc, r| acc.span(r));

        let mut table = AliasTable::new(rules.clone());
        let mut shifts = Vec::new();
        for model in models {
            let mut renames: HashMap<String, String> = HashMap::new();
            for provider in &model.providers {
                let canonical = table.resolve(provider.canonical_name()).to_string();
                for alias in &provider.aliases {
                    table.seed(&canonical, [alias]);
                }
                renames.insert(provider.canonical_name.clone(), canonical);
            }
            for day in model.days.into_values() {
                for mut shift in day.shifts {
                    if let Some(canonical) = renames.get(&shift.provider) {
                        shift.provider = canonical.clone();
                    }
                    shifts.push(shift);
                }
            }
        }

        debug!(range = %span, shifts = shifts.len(), "merged schedule models");
        Ok(Self::assemble(
            span,
            table.into_providers(),
            shifts,
            rules.clone(),
        ))
    }
}
