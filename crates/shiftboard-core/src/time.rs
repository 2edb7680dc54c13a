//! Time types for schedule shifts.
//!
//! This module provides [`TimeRange`] for the wall-clock span of a shift on
//! one calendar date, and [`DateRange`] for the contiguous set of dates a
//! run covers.

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// A wall-clock interval on a single calendar date.
///
/// Represents a half-open interval `[start, end)` in the source schedule's
/// time zone. `start < end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeRange {
    /// Start of the range (inclusive).
    start: NaiveTime,
    /// End of the range (exclusive).
    end: NaiveTime,
}

impl TimeRange {
    /// Creates a new time range.
    ///
    /// Returns `None` if `start` is not strictly before `end`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Creates a range from a start time and a duration.
    ///
    /// Returns `None` if the duration is not positive or the range would
    /// wrap past midnight.
    pub fn from_duration(start: NaiveTime, duration: Duration) -> Option<Self> {
        let (end, wrapped) = start.overflowing_add_signed(duration);
        if wrapped != 0 {
            return None;
        }
        Self::new(start, end)
    }

    /// Creates a range from hour/minute pairs.
    pub fn from_hm(start: (u32, u32), end: (u32, u32)) -> Option<Self> {
        let start = NaiveTime::from_hms_opt(start.0, start.1, 0)?;
        let end = NaiveTime::from_hms_opt(end.0, end.1, 0)?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Returns the duration of this range.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Checks if a time falls within this range.
    ///
    /// Uses half-open interval semantics: `[start, end)`.
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t < self.end
    }

    /// Checks if two ranges share any instant.
    ///
    /// Ranges that only touch (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Checks if one range ends exactly where the other starts.
    pub fn touches(&self, other: &TimeRange) -> bool {
        self.end == other.start || other.end == self.start
    }

    /// Returns the smallest range covering both ranges.
    pub fn union(&self, other: &TimeRange) -> TimeRange {
        TimeRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl PartialOrd for TimeRange {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeRange {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| self.end.cmp(&other.end))
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// An inclusive range of calendar dates.
///
/// This is the "requested date range" of an ingestion run: every date from
/// `start` through `end` appears in the resulting model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    /// First date (inclusive).
    start: NaiveDate,
    /// Last date (inclusive).
    end: NaiveDate,
}

impl DateRange {
    /// Creates a new date range.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRange`] if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> CoreResult<Self> {
        if start > end {
            return Err(CoreError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Creates a range of `days` dates beginning at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOption`] if `days` is zero or the end
    /// date is out of chrono's supported range.
    pub fn from_start_and_days(start: NaiveDate, days: u32) -> CoreResult<Self> {
        if days == 0 {
            return Err(CoreError::invalid_option("days", "must be at least 1"));
        }
        let end = start
            .checked_add_signed(Duration::days(i64::from(days) - 1))
            .ok_or_else(|| CoreError::invalid_option("days", "end date out of range"))?;
        Self::new(start, end)
    }

    /// A range holding exactly one date.
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of dates in the range.
    pub fn len_days(&self) -> usize {
        // start <= end is guaranteed by construction.
        ((self.end - self.start).num_days() + 1) as usize
    }

    /// Checks if a date falls within this range (inclusive on both ends).
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Checks if two ranges share at least one date.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Returns the smallest range covering both ranges.
    pub fn span(&self, other: &DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Iterates over every date in the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod time_range {
        use super::*;

        #[test]
        fn creation() {
            let range = TimeRange::new(hm(9, 0), hm(12, 0)).unwrap();
            assert_eq!(range.start(), hm(9, 0));
            assert_eq!(range.end(), hm(12, 0));
            assert_eq!(range.duration(), Duration::hours(3));
        }

        #[test]
        fn rejects_empty_and_inverted() {
            assert!(TimeRange::new(hm(9, 0), hm(9, 0)).is_none());
            assert!(TimeRange::new(hm(12, 0), hm(9, 0)).is_none());
        }

        #[test]
        fn from_duration_rejects_wrap() {
            let slot = TimeRange::from_duration(hm(9, 45), Duration::minutes(15)).unwrap();
            assert_eq!(slot.end(), hm(10, 0));
            assert!(TimeRange::from_duration(hm(23, 50), Duration::minutes(15)).is_none());
        }

        #[test]
        fn contains_half_open() {
            let range = TimeRange::from_hm((9, 0), (17, 0)).unwrap();
            assert!(range.contains(hm(9, 0)));
            assert!(range.contains(hm(16, 59)));
            assert!(!range.contains(hm(17, 0)));
            assert!(!range.contains(hm(8, 59)));
        }

        #[test]
        fn overlap_and_touch() {
            let morning = TimeRange::from_hm((9, 0), (12, 0)).unwrap();
            let late_morning = TimeRange::from_hm((11, 0), (13, 0)).unwrap();
            let afternoon = TimeRange::from_hm((12, 0), (17, 0)).unwrap();

            assert!(morning.overlaps(&late_morning));
            assert!(late_morning.overlaps(&morning));
            assert!(!morning.overlaps(&afternoon));
            assert!(morning.touches(&afternoon));
            assert!(afternoon.touches(&morning));
            assert!(!morning.touches(&late_morning));
        }

        #[test]
        fn union_spans_both() {
            let a = TimeRange::from_hm((9, 0), (12, 0)).unwrap();
            let b = TimeRange::from_hm((11, 0), (13, 30)).unwrap();
            assert_eq!(a.union(&b), TimeRange::from_hm((9, 0), (13, 30)).unwrap());
        }

        #[test]
        fn ordering_by_start_then_end() {
            let a = TimeRange::from_hm((9, 0), (10, 0)).unwrap();
            let b = TimeRange::from_hm((9, 0), (11, 0)).unwrap();
            let c = TimeRange::from_hm((8, 0), (12, 0)).unwrap();
            let mut ranges = vec![b, a, c];
            ranges.sort();
            assert_eq!(ranges, vec![c, a, b]);
        }

        #[test]
        fn display() {
            let range = TimeRange::from_hm((9, 5), (13, 0)).unwrap();
            assert_eq!(range.to_string(), "09:05-13:00");
        }
    }

    mod date_range {
        use super::*;

        #[test]
        fn creation() {
            let range = DateRange::new(date(2025, 2, 3), date(2025, 2, 7)).unwrap();
            assert_eq!(range.len_days(), 5);
            assert!(range.contains(date(2025, 2, 3)));
            assert!(range.contains(date(2025, 2, 7)));
            assert!(!range.contains(date(2025, 2, 8)));
        }

        #[test]
        fn invalid_range() {
            let err = DateRange::new(date(2025, 2, 7), date(2025, 2, 3)).unwrap_err();
            assert!(matches!(err, CoreError::InvalidRange { .. }));
        }

        #[test]
        fn from_start_and_days() {
            let range = DateRange::from_start_and_days(date(2025, 2, 27), 3).unwrap();
            assert_eq!(range.end(), date(2025, 3, 1));
            assert!(DateRange::from_start_and_days(date(2025, 2, 27), 0).is_err());
        }

        #[test]
        fn days_iterates_inclusive() {
            let range = DateRange::new(date(2025, 2, 3), date(2025, 2, 5)).unwrap();
            let days: Vec<_> = range.days().collect();
            assert_eq!(
                days,
                vec![date(2025, 2, 3), date(2025, 2, 4), date(2025, 2, 5)]
            );
            assert_eq!(DateRange::single(date(2025, 2, 3)).days().count(), 1);
        }

        #[test]
        fn overlaps_and_span() {
            let a = DateRange::new(date(2025, 2, 3), date(2025, 2, 5)).unwrap();
            let b = DateRange::new(date(2025, 2, 5), date(2025, 2, 9)).unwrap();
            let c = DateRange::new(date(2025, 2, 10), date(2025, 2, 12)).unwrap();
            assert!(a.overlaps(&b));
            assert!(!a.overlaps(&c));
            let span = a.span(&c);
            assert_eq!(span.start(), date(2025, 2, 3));
            assert_eq!(span.end(), date(2025, 2, 12));
        }
    }
}
