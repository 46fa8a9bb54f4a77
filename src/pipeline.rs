//! The ingestion pipeline: parse → validate → resolve weeks → expand.
//!
//! Preview and commit are two independent executions of this same
//! deterministic pipeline over the same bytes; nothing is cached in
//! between, so a stale preview can never be committed silently. The
//! summary carries a SHA-256 fingerprint of the upload so callers can
//! tell whether a commit saw the same file they previewed.

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::SchedulingError;
use crate::expander::{self, SheetPlan};
use crate::registry::DirectoryIndex;
use crate::row_validator::{self, RowIssue, RowStatus, Severity};
use crate::sheet_parser;
use crate::types::{EntryDraft, TermWindow};
use crate::week_range::{self, LabelScope};

/// Read-only per-row record for the preview display.
#[derive(Debug, Clone, Serialize)]
pub struct RowPreview {
    pub sheet_name: String,
    pub row_number: usize,
    pub subject: String,
    pub teacher_email: String,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    pub status: RowStatus,
    pub issues: Vec<RowIssue>,
}

/// Aggregated dry-run output. Discarded after display, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewSummary {
    pub source_file: String,
    pub content_hash: String,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub warning_rows: usize,
    pub error_rows: usize,
    pub expanded_entries: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub rows: Vec<RowPreview>,
}

pub struct PipelineRun {
    pub summary: PreviewSummary,
    pub drafts: Vec<EntryDraft>,
}

/// Run the full pipeline over one upload. `department_id` is only in
/// scope at commit, where it drives subject → class resolution.
pub fn run(
    filename: &str,
    data: &[u8],
    term: &TermWindow,
    index: &DirectoryIndex,
    department_id: Option<&str>,
) -> Result<PipelineRun, SchedulingError> {
    let sheets = sheet_parser::parse_upload(filename, data)?;
    info!(
        "Parsed {} sheet(s) from '{}' ({} bytes)",
        sheets.len(),
        filename,
        data.len()
    );

    let mut plans = Vec::new();
    let mut week_notes: Vec<Vec<RowIssue>> = Vec::new();

    for sheet in &sheets {
        let mut notes = Vec::new();
        let (weeks, sheet_issue) = match week_range::parse_label(&sheet.name) {
            LabelScope::Range(spec) => {
                let resolved = week_range::resolve(&spec, term);
                for week_index in resolved.dropped {
                    notes.push(RowIssue::WeekOutsideTerm {
                        week_index,
                        week_start: week_range::week_start(term.start, week_index),
                    });
                }
                (resolved.weeks, None)
            }
            LabelScope::Unscoped => (
                week_range::resolve_full_term(term),
                Some(RowIssue::UnscopedWeekLabel {
                    sheet: sheet.name.clone(),
                }),
            ),
            LabelScope::Invalid { label, reason } => {
                (Vec::new(), Some(RowIssue::InvalidWeekLabel { label, reason }))
            }
        };
        debug!(
            "Sheet '{}' resolves to {} week(s)",
            sheet.name,
            weeks.len()
        );

        let mut rows: Vec<_> = sheet
            .rows
            .iter()
            .map(|r| row_validator::validate(r, index))
            .collect();

        if let Some(issue) = sheet_issue {
            for row in &mut rows {
                row.push_issue(issue.clone());
            }
        }

        plans.push(SheetPlan {
            sheet_name: sheet.name.clone(),
            weeks,
            rows,
        });
        week_notes.push(notes);
    }

    let drafts = expander::expand(&plans, department_id, index);

    let summary = assemble_summary(filename, data, &plans, &week_notes, drafts.len());
    info!(
        "Pipeline for '{}': {} rows ({} valid, {} warning, {} error), {} entries expanded",
        filename,
        summary.total_rows,
        summary.valid_rows,
        summary.warning_rows,
        summary.error_rows,
        summary.expanded_entries
    );

    Ok(PipelineRun { summary, drafts })
}

fn assemble_summary(
    filename: &str,
    data: &[u8],
    plans: &[SheetPlan],
    week_notes: &[Vec<RowIssue>],
    expanded_entries: usize,
) -> PreviewSummary {
    let content_hash = {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    };

    let mut total_rows = 0;
    let mut valid_rows = 0;
    let mut warning_rows = 0;
    let mut error_rows = 0;
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut rows = Vec::new();

    for (plan, notes) in plans.iter().zip(week_notes) {
        for row in &plan.rows {
            total_rows += 1;
            match row.status {
                RowStatus::Valid => valid_rows += 1,
                RowStatus::Warning => warning_rows += 1,
                RowStatus::Error => error_rows += 1,
            }

            for issue in &row.issues {
                let rendered = format!(
                    "sheet '{}' row {}: {}",
                    row.row.sheet_name,
                    row.row.row_number,
                    issue.message()
                );
                match issue.severity() {
                    Severity::Error => errors.push(rendered),
                    Severity::Warning => warnings.push(rendered),
                }
            }

            rows.push(RowPreview {
                sheet_name: row.row.sheet_name.clone(),
                row_number: row.row.row_number,
                subject: row.row.subject.clone(),
                teacher_email: row.row.teacher_email.clone(),
                day_of_week: row.row.day_of_week.clone(),
                start_time: row.row.start_time.clone(),
                end_time: row.row.end_time.clone(),
                venue: row.row.venue.clone(),
                status: row.status,
                issues: row.issues.clone(),
            });
        }

        for note in notes {
            warnings.push(format!("sheet '{}': {}", plan.sheet_name, note.message()));
        }
    }

    PreviewSummary {
        source_file: filename.to_string(),
        content_hash,
        total_rows,
        valid_rows,
        warning_rows,
        error_rows,
        expanded_entries,
        errors,
        warnings,
        rows,
    }
}
