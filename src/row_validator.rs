//! Row-local validation of parsed schedule rows.
//!
//! Validation never consults other rows. Hard failures (missing or
//! malformed required fields, end before start) classify the row as an
//! error; directory misses (unknown teacher email, unknown venue name) are
//! warnings and the row still expands with the reference unassigned.
//! Issues are structured codes; rendering to text happens in
//! [`RowIssue::message`] so the contract stays machine-checkable.

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::registry::DirectoryIndex;
use crate::types::{DayOfWeek, RawScheduleRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Valid,
    Warning,
    Error,
}

/// Structured issue codes attached to a row (or, for the week-scoped
/// variants, raised per sheet by the pipeline).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RowIssue {
    MissingSubject,
    MissingTeacherEmail,
    MalformedTeacherEmail { value: String },
    MissingDay,
    UnknownDay { value: String },
    MissingTime { field: &'static str },
    UnparseableTime { field: &'static str, value: String },
    EndNotAfterStart { start: String, end: String },
    UnknownTeacher { email: String },
    UnknownVenue { name: String },
    UnscopedWeekLabel { sheet: String },
    InvalidWeekLabel { label: String, reason: String },
    WeekOutsideTerm { week_index: u32, week_start: NaiveDate },
}

impl RowIssue {
    pub fn severity(&self) -> Severity {
        match self {
            RowIssue::MissingSubject
            | RowIssue::MissingTeacherEmail
            | RowIssue::MalformedTeacherEmail { .. }
            | RowIssue::MissingDay
            | RowIssue::UnknownDay { .. }
            | RowIssue::MissingTime { .. }
            | RowIssue::UnparseableTime { .. }
            | RowIssue::EndNotAfterStart { .. } => Severity::Error,
            RowIssue::UnknownTeacher { .. }
            | RowIssue::UnknownVenue { .. }
            | RowIssue::UnscopedWeekLabel { .. }
            | RowIssue::InvalidWeekLabel { .. }
            | RowIssue::WeekOutsideTerm { .. } => Severity::Warning,
        }
    }

    /// Human-readable rendering for preview summaries.
    pub fn message(&self) -> String {
        match self {
            RowIssue::MissingSubject => "subject is required".to_string(),
            RowIssue::MissingTeacherEmail => "teacher email is required".to_string(),
            RowIssue::MalformedTeacherEmail { value } => {
                format!("teacher email '{}' is not a valid email address", value)
            }
            RowIssue::MissingDay => "day of week is required".to_string(),
            RowIssue::UnknownDay { value } => {
                format!("'{}' is not a day of the week", value)
            }
            RowIssue::MissingTime { field } => format!("{} is required", field),
            RowIssue::UnparseableTime { field, value } => {
                format!("{} '{}' is not a valid HH:MM time", field, value)
            }
            RowIssue::EndNotAfterStart { start, end } => {
                format!("end time {} must be after start time {}", end, start)
            }
            RowIssue::UnknownTeacher { email } => {
                format!("teacher '{}' not found, will be unassigned", email)
            }
            RowIssue::UnknownVenue { name } => {
                format!("venue '{}' not found, will be unassigned", name)
            }
            RowIssue::UnscopedWeekLabel { sheet } => format!(
                "sheet '{}' has no week range in its name; covering the full term",
                sheet
            ),
            RowIssue::InvalidWeekLabel { label, reason } => {
                format!("week range '{}' is invalid ({}); sheet produced no entries", label, reason)
            }
            RowIssue::WeekOutsideTerm { week_index, week_start } => format!(
                "week {} starts {}, after the term ends; dropped",
                week_index, week_start
            ),
        }
    }
}

/// Typed fields of a row that passed the hard checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedFields {
    pub day: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub teacher_id: Option<String>,
    pub venue_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidatedRow {
    pub row: RawScheduleRow,
    pub status: RowStatus,
    pub issues: Vec<RowIssue>,
    /// None when status is error.
    pub parsed: Option<ParsedFields>,
}

impl ValidatedRow {
    /// Append an issue discovered after validation (sheet-scoped ones),
    /// escalating the status if needed.
    pub fn push_issue(&mut self, issue: RowIssue) {
        match issue.severity() {
            Severity::Error => {
                self.status = RowStatus::Error;
                self.parsed = None;
            }
            Severity::Warning => {
                if self.status == RowStatus::Valid {
                    self.status = RowStatus::Warning;
                }
            }
        }
        self.issues.push(issue);
    }
}

fn email_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

/// Validate one row against the directory snapshot.
pub fn validate(row: &RawScheduleRow, index: &DirectoryIndex) -> ValidatedRow {
    let mut issues = Vec::new();

    if row.subject.is_empty() {
        issues.push(RowIssue::MissingSubject);
    }

    let mut teacher_id = None;
    if row.teacher_email.is_empty() {
        issues.push(RowIssue::MissingTeacherEmail);
    } else if !email_pattern().is_match(&row.teacher_email) {
        issues.push(RowIssue::MalformedTeacherEmail {
            value: row.teacher_email.clone(),
        });
    } else {
        match index.teacher_for_email(&row.teacher_email) {
            Some(id) => teacher_id = Some(id.to_string()),
            None => issues.push(RowIssue::UnknownTeacher {
                email: row.teacher_email.clone(),
            }),
        }
    }

    let day = if row.day_of_week.is_empty() {
        issues.push(RowIssue::MissingDay);
        None
    } else {
        let parsed = DayOfWeek::parse(&row.day_of_week);
        if parsed.is_none() {
            issues.push(RowIssue::UnknownDay {
                value: row.day_of_week.clone(),
            });
        }
        parsed
    };

    let start_time = check_time(&row.start_time, "start time", &mut issues);
    let end_time = check_time(&row.end_time, "end time", &mut issues);

    if let (Some(start), Some(end)) = (start_time, end_time) {
        if end <= start {
            issues.push(RowIssue::EndNotAfterStart {
                start: row.start_time.clone(),
                end: row.end_time.clone(),
            });
        }
    }

    let mut venue_id = None;
    if let Some(name) = &row.venue {
        match index.venue_for_name(name) {
            Some(id) => venue_id = Some(id.to_string()),
            None => issues.push(RowIssue::UnknownVenue { name: name.clone() }),
        }
    }

    let has_error = issues.iter().any(|i| i.severity() == Severity::Error);
    let status = if has_error {
        RowStatus::Error
    } else if !issues.is_empty() {
        RowStatus::Warning
    } else {
        RowStatus::Valid
    };

    let parsed = match (day, start_time, end_time) {
        (Some(day), Some(start_time), Some(end_time)) if !has_error => Some(ParsedFields {
            day,
            start_time,
            end_time,
            teacher_id,
            venue_id,
        }),
        _ => None,
    };

    ValidatedRow {
        row: row.clone(),
        status,
        issues,
        parsed,
    }
}

fn check_time(value: &str, field: &'static str, issues: &mut Vec<RowIssue>) -> Option<NaiveTime> {
    if value.is_empty() {
        issues.push(RowIssue::MissingTime { field });
        return None;
    }
    let parsed = parse_time(value);
    if parsed.is_none() {
        issues.push(RowIssue::UnparseableTime {
            field,
            value: value.to_string(),
        });
    }
    parsed
}
