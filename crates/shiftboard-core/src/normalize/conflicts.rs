//! Overlap reconciliation for one provider on one date.

use crate::model::Shift;

/// Reconciles the shifts of a single provider on a single date.
///
/// Shifts at the same location that overlap (or touch, with `coalesce`)
/// are replaced by their union, repeatedly, so chains collapse into one
/// shift. Remaining shifts that overlap a shift at another location are
/// flagged as conflicts.
pub(super) fn reconcile(mut shifts: Vec<Shift>, coalesce: bool) -> Vec<Shift> {
    shifts.sort_by(|a, b| {
        a.location
            .key()
            .cmp(&b.location.key())
            .then_with(|| a.range.cmp(&b.range))
    });

    let mut merged: Vec<Shift> = Vec::with_capacity(shifts.len());
    for mut shift in shifts {
        let absorbed = match merged.last_mut() {
            Some(last)
                if last.location.key() == shift.location.key()
                    && (last.range.overlaps(&shift.range)
                        || (coalesce && last.range.touches(&shift.range))) =>
            {
                last.range = last.range.union(&shift.range);
                last.note = join_notes(last.note.take(), shift.note.take());
                true
            }
            _ => false,
        };
        if !absorbed {
            merged.push(shift);
        }
    }

    for i in 0..merged.len() {
        for j in (i + 1)..merged.len() {
            if merged[i].location.key() != merged[j].location.key()
                && merged[i].range.overlaps(&merged[j].range)
            {
                merged[i].conflict = true;
                merged[j].conflict = true;
            }
        }
    }
    merged
}

fn join_notes(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => {
            let mut parts: Vec<&str> = a.split("; ").collect();
            for part in b.split("; ") {
                if !parts.contains(&part) {
                    parts.push(part);
                }
            }
            Some(parts.join("; "))
        }
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::Location;
    use crate::time::TimeRange;

    fn shift(start: (u32, u32), end: (u32, u32), location: &str) -> Shift {
        Shift::new(
            "Jane Smith",
            NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(),
            TimeRange::from_hm(start, end).unwrap(),
            Location::new(location),
        )
    }

    #[test]
    fn chain_collapses_into_one() {
        let shifts = vec![
            shift((13, 0), (15, 0), "Main"),
            shift((9, 0), (11, 0), "Main"),
            shift((10, 30), (13, 30), "Main"),
        ];
        let out = reconcile(shifts, false);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].range, TimeRange::from_hm((9, 0), (15, 0)).unwrap());
        assert!(!out[0].conflict);
    }

    #[test]
    fn duplicate_rows_collapse() {
        let shifts = vec![
            shift((9, 0), (12, 0), "Main").with_note("clinic"),
            shift((9, 0), (12, 0), "Main").with_note("clinic"),
        ];
        let out = reconcile(shifts, false);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].note.as_deref(), Some("clinic"));
    }

    #[test]
    fn merged_shift_takes_part_in_conflicts() {
        let shifts = vec![
            shift((9, 0), (10, 30), "Main"),
            shift((10, 0), (12, 0), "Main"),
            shift((11, 0), (12, 0), "Annex"),
        ];
        let out = reconcile(shifts, false);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| s.conflict));
    }

    #[test]
    fn touching_at_other_location_is_not_a_conflict() {
        let out = reconcile(
            vec![shift((9, 0), (12, 0), "Main"), shift((12, 0), (14, 0), "Annex")],
            true,
        );
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| !s.conflict));
    }

    #[test]
    fn notes_join_without_duplicates() {
        assert_eq!(
            join_notes(Some("a; b".to_string()), Some("b; c".to_string())).as_deref(),
            Some("a; b; c")
        );
        assert_eq!(join_notes(None, Some("x".to_string())).as_deref(), Some("x"));
        assert_eq!(join_notes(None, None), None);
    }
}
