//! Week-range label parsing and calendar resolution.
//!
//! Sheet names declare their coverage as `Week N` or `Weeks N-M` (1-based,
//! inclusive). Resolution turns week indices into concrete Monday dates
//! anchored at the term start; weeks that land past the term end are
//! dropped and reported rather than failing the upload.

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::types::{TermWindow, WeekRangeSpec};

/// Outcome of matching a sheet name against the week-label patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelScope {
    /// `Week N` or `Weeks N-M` with a well-formed range.
    Range(WeekRangeSpec),
    /// Matches neither pattern; the sheet falls back to the full term.
    Unscoped,
    /// Pattern matched but the range itself is malformed.
    Invalid { label: String, reason: String },
}

fn label_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*weeks?\s+(\d+)\s*(?:-\s*(\d+))?\s*$").unwrap()
    })
}

/// Parse a sheet name into its declared week scope, case-insensitive.
pub fn parse_label(sheet_name: &str) -> LabelScope {
    let caps = match label_pattern().captures(sheet_name) {
        Some(c) => c,
        None => return LabelScope::Unscoped,
    };

    let invalid = |reason: &str| LabelScope::Invalid {
        label: sheet_name.trim().to_string(),
        reason: reason.to_string(),
    };

    let start_week: u32 = match caps[1].parse() {
        Ok(v) => v,
        Err(_) => return invalid("week index out of range"),
    };
    let end_week: u32 = match caps.get(2) {
        Some(m) => match m.as_str().parse() {
            Ok(v) => v,
            Err(_) => return invalid("week index out of range"),
        },
        None => start_week,
    };

    if start_week == 0 {
        return invalid("week indices are 1-based");
    }
    if end_week < start_week {
        return invalid("range end precedes range start");
    }

    LabelScope::Range(WeekRangeSpec {
        sheet_name: sheet_name.trim().to_string(),
        start_week,
        end_week,
    })
}

/// Monday of the calendar week containing `term_start + 7*(index-1)` days.
pub fn week_start(term_start: NaiveDate, index: u32) -> NaiveDate {
    let anchor = term_start + Duration::days(7 * (i64::from(index) - 1));
    anchor - Duration::days(i64::from(anchor.weekday().num_days_from_monday()))
}

/// Weeks a spec resolves to within the term, plus the indices that were
/// dropped for falling past the term end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWeeks {
    pub weeks: Vec<NaiveDate>,
    pub dropped: Vec<u32>,
}

pub fn resolve(spec: &WeekRangeSpec, term: &TermWindow) -> ResolvedWeeks {
    let mut weeks = Vec::new();
    let mut dropped = Vec::new();
    for index in spec.start_week..=spec.end_week {
        let start = week_start(term.start, index);
        if start > term.end {
            dropped.push(index);
        } else {
            weeks.push(start);
        }
    }
    ResolvedWeeks { weeks, dropped }
}

/// Every week of the term, for unscoped sheets.
pub fn resolve_full_term(term: &TermWindow) -> Vec<NaiveDate> {
    let mut weeks = Vec::new();
    let mut index = 1;
    loop {
        let start = week_start(term.start, index);
        if start > term.end {
            break;
        }
        weeks.push(start);
        index += 1;
    }
    weeks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn term(start: NaiveDate, end: NaiveDate) -> TermWindow {
        TermWindow::new(start, end).unwrap()
    }

    #[test]
    fn test_parse_single_week() {
        match parse_label("Week 5") {
            LabelScope::Range(spec) => {
                assert_eq!(spec.start_week, 5);
                assert_eq!(spec.end_week, 5);
            }
            other => panic!("expected range, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_range_case_insensitive() {
        match parse_label("  WEEKS 1-4 ") {
            LabelScope::Range(spec) => {
                assert_eq!(spec.start_week, 1);
                assert_eq!(spec.end_week, 4);
            }
            other => panic!("expected range, got {:?}", other),
        }
        assert!(matches!(parse_label("week 2"), LabelScope::Range(_)));
        assert!(matches!(parse_label("Weeks 3 - 6"), LabelScope::Range(_)));
    }

    #[test]
    fn test_parse_unscoped() {
        assert_eq!(parse_label("Timetable"), LabelScope::Unscoped);
        assert_eq!(parse_label("Sheet1"), LabelScope::Unscoped);
        assert_eq!(parse_label("Weekly plan"), LabelScope::Unscoped);
    }

    #[test]
    fn test_parse_invalid_ranges() {
        assert!(matches!(parse_label("Weeks 5-3"), LabelScope::Invalid { .. }));
        assert!(matches!(parse_label("Week 0"), LabelScope::Invalid { .. }));
    }

    #[test]
    fn test_resolve_weeks_1_to_3_from_monday_term() {
        // Term starts on a Monday
        let t = term(date(2024, 1, 1), date(2024, 6, 30));
        let spec = WeekRangeSpec {
            sheet_name: "Weeks 1-3".into(),
            start_week: 1,
            end_week: 3,
        };
        let resolved = resolve(&spec, &t);
        assert_eq!(
            resolved.weeks,
            vec![date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 15)]
        );
        assert!(resolved.dropped.is_empty());
    }

    #[test]
    fn test_resolve_count_and_spacing() {
        let t = term(date(2024, 1, 1), date(2024, 12, 31));
        let spec = WeekRangeSpec {
            sheet_name: "Weeks 2-6".into(),
            start_week: 2,
            end_week: 6,
        };
        let resolved = resolve(&spec, &t);
        assert_eq!(resolved.weeks.len(), 5);
        assert_eq!(resolved.weeks[0], date(2024, 1, 1) + Duration::days(7));
        for pair in resolved.weeks.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::days(7));
        }
    }

    #[test]
    fn test_week_start_floors_to_monday() {
        // 2024-01-03 is a Wednesday; its week's Monday is 2024-01-01
        assert_eq!(week_start(date(2024, 1, 3), 1), date(2024, 1, 1));
        assert_eq!(week_start(date(2024, 1, 3), 2), date(2024, 1, 8));
    }

    #[test]
    fn test_trailing_weeks_dropped() {
        let t = term(date(2024, 1, 1), date(2024, 1, 10));
        let spec = WeekRangeSpec {
            sheet_name: "Weeks 1-4".into(),
            start_week: 1,
            end_week: 4,
        };
        let resolved = resolve(&spec, &t);
        assert_eq!(resolved.weeks, vec![date(2024, 1, 1), date(2024, 1, 8)]);
        assert_eq!(resolved.dropped, vec![3, 4]);
    }

    #[test]
    fn test_resolve_full_term() {
        let t = term(date(2024, 1, 1), date(2024, 1, 28));
        let weeks = resolve_full_term(&t);
        assert_eq!(
            weeks,
            vec![
                date(2024, 1, 1),
                date(2024, 1, 8),
                date(2024, 1, 15),
                date(2024, 1, 22)
            ]
        );
    }

    #[test]
    fn test_resolve_full_term_single_day() {
        let t = term(date(2024, 1, 3), date(2024, 1, 3));
        // The Monday of the start week precedes the term end, so one week
        assert_eq!(resolve_full_term(&t), vec![date(2024, 1, 1)]);
    }
}
