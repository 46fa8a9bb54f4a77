//! Workbook parsing for uploaded weekly schedules (.xlsx/.xlsm/.xlsb/.csv).
//!
//! Each worksheet is read under a fixed column contract (subject, teacher
//! email, day, start time, end time, optional venue) into
//! [`RawScheduleRow`]s. The sheet name doubles as the week-range label and
//! is resolved later against the term window.

use crate::error::SchedulingError;
use crate::types::RawScheduleRow;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx, Xlsb};
use chrono::NaiveDate;
use std::io::Cursor;

/// One worksheet's usable rows, in sheet order.
#[derive(Debug, Clone)]
pub struct ParsedSheet {
    pub name: String,
    pub rows: Vec<RawScheduleRow>,
}

/// Dispatch upload parsing by extension. A CSV upload becomes a one-sheet
/// workbook named by the file stem, so `Weeks 1-2.csv` is a scoped sheet.
pub fn parse_upload(filename: &str, data: &[u8]) -> Result<Vec<ParsedSheet>, SchedulingError> {
    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();

    match ext.as_str() {
        "csv" => parse_csv(filename, data),
        "xlsx" | "xlsm" => parse_excel_xlsx(data),
        "xlsb" => parse_excel_xlsb(data),
        _ => Err(SchedulingError::Parse(format!(
            "Unsupported file type: .{}. Supported: .csv, .xlsx, .xlsm, .xlsb",
            ext
        ))),
    }
}

/// Column positions for the schedule contract within one sheet.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    subject: usize,
    teacher_email: usize,
    day: usize,
    start: usize,
    end: usize,
    venue: Option<usize>,
}

/// Match headers against the contract, case-insensitive with punctuation
/// stripped ("Teacher Email", "teacher_email" and "TeacherEmail" all
/// match). Returns None when a required column is missing.
fn map_headers(headers: &[String]) -> Option<ColumnMap> {
    let normalized: Vec<String> = headers
        .iter()
        .map(|h| {
            h.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .collect();

    let find = |aliases: &[&str]| -> Option<usize> {
        normalized
            .iter()
            .position(|h| aliases.contains(&h.as_str()))
    };

    Some(ColumnMap {
        subject: find(&["subject", "course"])?,
        teacher_email: find(&["teacheremail", "teacher", "email"])?,
        day: find(&["dayofweek", "day", "weekday"])?,
        start: find(&["starttime", "start"])?,
        end: find(&["endtime", "end"])?,
        venue: find(&["venue", "venuename", "room"]),
    })
}

/// Build rows for one sheet from its header row and data rows.
/// `row_number` is the 1-based data-row position (header excluded); rows
/// whose required cells are all blank are skipped without being counted.
fn build_sheet(name: &str, headers: &[String], data_rows: Vec<Vec<String>>) -> Option<ParsedSheet> {
    let map = match map_headers(headers) {
        Some(m) => m,
        None => {
            tracing::warn!(
                "Skipping sheet '{}': headers {:?} do not satisfy the schedule column contract",
                name,
                headers
            );
            return None;
        }
    };

    let mut rows = Vec::new();
    for (i, cells) in data_rows.iter().enumerate() {
        let cell = |idx: usize| -> String {
            cells
                .get(idx)
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        let subject = cell(map.subject);
        let teacher_email = cell(map.teacher_email);
        let day_of_week = cell(map.day);
        let start_time = cell(map.start);
        let end_time = cell(map.end);

        if subject.is_empty()
            && teacher_email.is_empty()
            && day_of_week.is_empty()
            && start_time.is_empty()
            && end_time.is_empty()
        {
            continue;
        }

        let venue = map.venue.map(|idx| cell(idx)).filter(|v| !v.is_empty());

        rows.push(RawScheduleRow {
            sheet_name: name.to_string(),
            row_number: i + 1,
            subject,
            teacher_email,
            day_of_week,
            start_time,
            end_time,
            venue,
        });
    }

    if rows.is_empty() {
        return None;
    }

    Some(ParsedSheet {
        name: name.to_string(),
        rows,
    })
}

/// Parse a CSV file into a single sheet named by the file stem.
fn parse_csv(filename: &str, data: &[u8]) -> Result<Vec<ParsedSheet>, SchedulingError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SchedulingError::Parse(format!("Failed to read CSV headers: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut data_rows = Vec::new();
    for result in reader.records() {
        let record = result
            .map_err(|e| SchedulingError::Parse(format!("Failed to read CSV record: {}", e)))?;
        data_rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    let name = filename
        .rsplit('/')
        .next()
        .unwrap_or(filename)
        .rsplit('\\')
        .next()
        .unwrap_or(filename)
        .trim_end_matches(".csv")
        .trim_end_matches(".CSV")
        .to_string();

    match build_sheet(&name, &headers, data_rows) {
        Some(sheet) => Ok(vec![sheet]),
        None => Err(SchedulingError::Parse(
            "CSV contains no usable schedule rows".to_string(),
        )),
    }
}

/// Parse an xlsx/xlsm workbook. Every worksheet satisfying the column
/// contract becomes a ParsedSheet; the sheet name is kept verbatim as the
/// week-range label.
fn parse_excel_xlsx(data: &[u8]) -> Result<Vec<ParsedSheet>, SchedulingError> {
    let cursor = Cursor::new(data);
    let mut workbook: Xlsx<_> = open_workbook_from_rs(cursor)
        .map_err(|e| SchedulingError::Parse(format!("Failed to open Excel workbook: {}", e)))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut sheets = Vec::new();

    for name in &sheet_names {
        let range = match workbook.worksheet_range(name) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Skipping sheet '{}': {}", name, e);
                continue;
            }
        };

        if let Some(sheet) = range_to_sheet(name, &range) {
            sheets.push(sheet);
        }
    }

    if sheets.is_empty() {
        return Err(SchedulingError::Parse(
            "No usable schedule sheets found in workbook".to_string(),
        ));
    }

    Ok(sheets)
}

/// Parse an xlsb workbook.
fn parse_excel_xlsb(data: &[u8]) -> Result<Vec<ParsedSheet>, SchedulingError> {
    let cursor = Cursor::new(data);
    let mut workbook: Xlsb<_> = open_workbook_from_rs(cursor)
        .map_err(|e| SchedulingError::Parse(format!("Failed to open Excel workbook: {}", e)))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut sheets = Vec::new();

    for name in &sheet_names {
        let range = match workbook.worksheet_range(name) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Skipping sheet '{}': {}", name, e);
                continue;
            }
        };

        if let Some(sheet) = range_to_sheet(name, &range) {
            sheets.push(sheet);
        }
    }

    if sheets.is_empty() {
        return Err(SchedulingError::Parse(
            "No usable schedule sheets found in workbook".to_string(),
        ));
    }

    Ok(sheets)
}

/// Convert a calamine Range into a ParsedSheet. First row = headers.
fn range_to_sheet(name: &str, range: &calamine::Range<Data>) -> Option<ParsedSheet> {
    let mut row_iter = range.rows();

    let header_row = row_iter.next()?;
    let headers: Vec<String> = header_row.iter().map(cell_to_string).collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return None;
    }

    let data_rows: Vec<Vec<String>> = row_iter
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    build_sheet(name, &headers, data_rows)
}

/// Convert a calamine cell to its string form. Time-of-day cells (Excel
/// serial fraction < 1 day) render as `HH:MM` so they survive the
/// validator's time parse; date cells render ISO.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // Avoid trailing ".0" for whole numbers
            if *f == (*f as i64) as f64 && f.abs() < i64::MAX as f64 {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_string(dt.as_f64()),
        Data::DateTimeIso(s) => s.trim().to_string(),
        Data::DurationIso(s) => duration_iso_to_time(s).unwrap_or_else(|| s.trim().to_string()),
        Data::Error(e) => format!("#ERR:{:?}", e),
    }
}

/// Render an Excel serial number. Serial < 1 is a pure time of day; larger
/// serials are dated from the 1899-12-30 epoch.
fn excel_serial_to_string(serial: f64) -> String {
    let days = serial.trunc() as i64;
    let frac = serial - days as f64;
    let total_minutes = ((frac * 24.0 * 60.0).round() as i64).rem_euclid(24 * 60);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if days == 0 {
        return format!("{:02}:{:02}", hours, minutes);
    }

    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
    let date = epoch + chrono::Duration::days(days);
    if total_minutes == 0 {
        date.format("%Y-%m-%d").to_string()
    } else {
        format!("{} {:02}:{:02}", date.format("%Y-%m-%d"), hours, minutes)
    }
}

/// ISO8601 durations like `PT9H30M` show up for time-formatted cells in
/// some workbooks; fold them into `HH:MM`.
fn duration_iso_to_time(s: &str) -> Option<String> {
    let rest = s.trim().strip_prefix("PT")?;
    let mut hours = 0u32;
    let mut minutes = 0u32;
    let mut num = String::new();
    for ch in rest.chars() {
        if ch.is_ascii_digit() {
            num.push(ch);
        } else {
            let value: u32 = num.parse().ok()?;
            num.clear();
            match ch {
                'H' => hours = value,
                'M' => minutes = value,
                'S' => {}
                _ => return None,
            }
        }
    }
    if !num.is_empty() {
        return None;
    }
    Some(format!("{:02}:{:02}", hours, minutes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_contract() {
        let csv_data = b"Subject,Teacher Email,Day,Start Time,End Time,Venue\n\
            Math,ada@school.edu,Monday,09:00,10:00,Room A\n\
            Physics,alan@school.edu,Tuesday,10:00,11:30,\n";
        let sheets = parse_upload("Weeks 1-2.csv", csv_data).unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].name, "Weeks 1-2");
        assert_eq!(sheets[0].rows.len(), 2);

        let first = &sheets[0].rows[0];
        assert_eq!(first.subject, "Math");
        assert_eq!(first.teacher_email, "ada@school.edu");
        assert_eq!(first.day_of_week, "Monday");
        assert_eq!(first.start_time, "09:00");
        assert_eq!(first.end_time, "10:00");
        assert_eq!(first.venue.as_deref(), Some("Room A"));
        assert_eq!(first.row_number, 1);

        // Blank venue cell becomes None
        assert_eq!(sheets[0].rows[1].venue, None);
    }

    #[test]
    fn test_blank_rows_skipped_numbering_kept() {
        let csv_data = b"subject,teacher_email,day,start,end,venue\n\
            ,,,,,\n\
            Math,ada@school.edu,Monday,09:00,10:00,Room A\n";
        let sheets = parse_upload("Week 1.csv", csv_data).unwrap();
        assert_eq!(sheets[0].rows.len(), 1);
        // Physical position preserved so messages point at the right row
        assert_eq!(sheets[0].rows[0].row_number, 2);
    }

    #[test]
    fn test_header_aliases() {
        let csv_data = b"Course,Teacher,Weekday,Start,End,Room\n\
            Math,ada@school.edu,Monday,09:00,10:00,Room A\n";
        let sheets = parse_upload("Week 3.csv", csv_data).unwrap();
        assert_eq!(sheets[0].rows[0].subject, "Math");
        assert_eq!(sheets[0].rows[0].venue.as_deref(), Some("Room A"));
    }

    #[test]
    fn test_missing_required_header_is_parse_error() {
        // No end-time column anywhere
        let csv_data = b"subject,teacher_email,day,start\nMath,a@b.edu,Monday,09:00\n";
        let result = parse_upload("Week 1.csv", csv_data);
        assert!(matches!(result, Err(SchedulingError::Parse(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = parse_upload("schedule.txt", b"data");
        assert!(matches!(result, Err(SchedulingError::Parse(_))));
    }

    #[test]
    fn test_corrupt_workbook_is_parse_error() {
        let result = parse_upload("schedule.xlsx", b"definitely not a zip");
        assert!(matches!(result, Err(SchedulingError::Parse(_))));
    }

    #[test]
    fn test_cell_to_string_time_serial() {
        // 0.375 of a day = 09:00
        assert_eq!(cell_to_string(&Data::Float(42.0)), "42");
        assert_eq!(excel_serial_to_string(0.375), "09:00");
        assert_eq!(excel_serial_to_string(0.6875), "16:30");
    }

    #[test]
    fn test_cell_to_string_date_serial() {
        // 2024-01-01 is Excel serial 45292
        assert_eq!(excel_serial_to_string(45292.0), "2024-01-01");
        assert_eq!(excel_serial_to_string(45292.375), "2024-01-01 09:00");
    }

    #[test]
    fn test_duration_iso_to_time() {
        assert_eq!(duration_iso_to_time("PT9H30M").as_deref(), Some("09:30"));
        assert_eq!(duration_iso_to_time("PT14H").as_deref(), Some("14:00"));
        assert_eq!(duration_iso_to_time("9:30"), None);
    }
}
