//! Error taxonomy for ingestion and booking operations.
//!
//! Only fatal conditions live here. Row-level and range-level issues are
//! accumulated into the preview summary instead, so the caller sees every
//! problem in one pass.

use axum::http::StatusCode;
use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::types::DayOfWeek;

#[derive(Debug, Error)]
pub enum SchedulingError {
    /// The workbook could not be opened or contained zero usable sheets.
    /// Aborts the whole operation; nothing partial is ever returned.
    #[error("workbook could not be parsed: {0}")]
    Parse(String),

    /// The supplied term window is inverted.
    #[error("invalid term window: start {start} is after end {end}")]
    Term { start: NaiveDate, end: NaiveDate },

    /// Rows failed required-field validation and the caller did not opt
    /// into committing with errors.
    #[error("{error_rows} row(s) failed validation; pass allow_errors=true to skip them")]
    Validation { error_rows: usize },

    /// An overlapping booking already exists for this venue/day/week.
    #[error("venue '{venue_id}' is already booked on {day} between {start} and {end}")]
    VenueConflict {
        venue_id: String,
        day: DayOfWeek,
        start: NaiveTime,
        end: NaiveTime,
    },

    #[error("timetable entry '{0}' not found")]
    EntryNotFound(String),

    #[error("venue '{0}' is not in the venue registry")]
    UnknownVenue(String),
}

impl SchedulingError {
    /// HTTP status this error maps to at the route boundary.
    pub fn status(&self) -> StatusCode {
        match self {
            SchedulingError::Parse(_) | SchedulingError::Term { .. } => StatusCode::BAD_REQUEST,
            SchedulingError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SchedulingError::VenueConflict { .. } => StatusCode::CONFLICT,
            SchedulingError::EntryNotFound(_) | SchedulingError::UnknownVenue(_) => {
                StatusCode::NOT_FOUND
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            SchedulingError::Parse("bad zip".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SchedulingError::Validation { error_rows: 2 }.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            SchedulingError::VenueConflict {
                venue_id: "v1".into(),
                day: DayOfWeek::Monday,
                start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            }
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            SchedulingError::EntryNotFound("tt_x".into()).status(),
            StatusCode::NOT_FOUND
        );
    }
}
