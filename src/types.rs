//! Core domain types for timetable ingestion and venue booking.

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SchedulingError;

/// Day of the week a class meets on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// Parse a day cell. Accepts full names and three-letter abbreviations,
    /// case-insensitive ("Monday", "monday", "MON").
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        let day = match lower.as_str() {
            "monday" | "mon" => DayOfWeek::Monday,
            "tuesday" | "tue" | "tues" => DayOfWeek::Tuesday,
            "wednesday" | "wed" => DayOfWeek::Wednesday,
            "thursday" | "thu" | "thur" | "thurs" => DayOfWeek::Thursday,
            "friday" | "fri" => DayOfWeek::Friday,
            "saturday" | "sat" => DayOfWeek::Saturday,
            "sunday" | "sun" => DayOfWeek::Sunday,
            _ => return None,
        };
        Some(day)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }
}

impl std::fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Academic term bounds supplied at upload time. Week indices are counted
/// from `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TermWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, SchedulingError> {
        if start > end {
            return Err(SchedulingError::Term { start, end });
        }
        Ok(Self { start, end })
    }
}

/// Scope of a booking or availability query: a single calendar week
/// (identified by its Monday) or the whole term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekScope {
    Term,
    Week(NaiveDate),
}

/// One data row as read from a worksheet, untouched apart from trimming.
/// `row_number` is 1-based over the sheet's data rows (header excluded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawScheduleRow {
    pub sheet_name: String,
    pub row_number: usize,
    pub subject: String,
    pub teacher_email: String,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
}

/// Declared week coverage of a sheet, parsed from its name.
/// 1-based, inclusive on both ends; `start_week <= end_week` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekRangeSpec {
    pub sheet_name: String,
    pub start_week: u32,
    pub end_week: u32,
}

/// An expanded class occurrence before identity is assigned. The expander
/// emits these; the repository turns them into [`TimetableEntry`]s at
/// commit. `PartialEq` so determinism of the expansion is checkable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryDraft {
    pub sheet_name: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    pub day: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_id: Option<String>,
    /// Monday of the calendar week this occurrence falls in.
    pub week_start: NaiveDate,
}

/// One concrete dated occurrence of a class meeting. A four-week range
/// produces four entries, not one recurring rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub id: String,
    pub department_id: String,
    pub term_start: NaiveDate,
    pub term_end: NaiveDate,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    pub day: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_id: Option<String>,
    pub week_start: NaiveDate,
    pub created_at: String,
}

impl TimetableEntry {
    pub fn from_draft(draft: EntryDraft, department_id: &str, term: &TermWindow) -> Self {
        Self {
            id: new_entry_id(),
            department_id: department_id.to_string(),
            term_start: term.start,
            term_end: term.end,
            subject: draft.subject,
            class_id: draft.class_id,
            teacher_id: draft.teacher_id,
            day: draft.day,
            start_time: draft.start_time,
            end_time: draft.end_time,
            venue_id: draft.venue_id,
            week_start: draft.week_start,
            created_at: now_iso8601(),
        }
    }
}

/// A reservation of a venue for a day/time/week. The unit over which
/// conflicts are checked: per venue and day, no two bookings with
/// intersecting scopes may have overlapping `[start_time, end_time)`
/// intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueBooking {
    pub id: String,
    pub venue_id: String,
    pub day: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub scope: WeekScope,
    pub owner_entry_id: String,
}

pub fn new_entry_id() -> String {
    format!("tt_{}", Uuid::new_v4().simple())
}

pub fn new_booking_id() -> String {
    format!("bk_{}", Uuid::new_v4().simple())
}

/// ISO8601 UTC timestamp for record creation times.
pub fn now_iso8601() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_day_parse_variants() {
        assert_eq!(DayOfWeek::parse("Monday"), Some(DayOfWeek::Monday));
        assert_eq!(DayOfWeek::parse("  wed "), Some(DayOfWeek::Wednesday));
        assert_eq!(DayOfWeek::parse("THURS"), Some(DayOfWeek::Thursday));
        assert_eq!(DayOfWeek::parse("Someday"), None);
        assert_eq!(DayOfWeek::parse(""), None);
    }

    #[test]
    fn test_term_window_rejects_inverted() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(TermWindow::new(start, end).is_err());
        assert!(TermWindow::new(end, start).is_ok());
        // A one-day term is allowed
        assert!(TermWindow::new(start, start).is_ok());
    }

    #[test]
    fn test_id_prefixes() {
        assert!(new_entry_id().starts_with("tt_"));
        assert!(new_booking_id().starts_with("bk_"));
    }
}
