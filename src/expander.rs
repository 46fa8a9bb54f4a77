//! Expansion of validated rows into dated entry drafts.
//!
//! Pure: no identity, no side effects. One draft per (row, week) pair, so
//! a sheet covering four weeks turns each row into four entries. Output
//! order is (sheet order, row order, ascending week), which keeps preview
//! and commit runs over the same input byte-for-byte identical.

use chrono::NaiveDate;

use crate::registry::DirectoryIndex;
use crate::row_validator::{RowStatus, ValidatedRow};
use crate::types::EntryDraft;

/// One sheet's validated rows plus the weeks its label resolved to.
#[derive(Debug, Clone)]
pub struct SheetPlan {
    pub sheet_name: String,
    pub weeks: Vec<NaiveDate>,
    pub rows: Vec<ValidatedRow>,
}

/// Cross-join non-error rows with their sheet's weeks. Class resolution
/// (subject + department) only applies when a department is in scope,
/// i.e. at commit; unresolved subjects leave `class_id` empty.
pub fn expand(
    plans: &[SheetPlan],
    department_id: Option<&str>,
    index: &DirectoryIndex,
) -> Vec<EntryDraft> {
    let mut drafts = Vec::new();

    for plan in plans {
        let mut weeks = plan.weeks.clone();
        weeks.sort_unstable();

        for row in &plan.rows {
            if row.status == RowStatus::Error {
                continue;
            }
            let parsed = match &row.parsed {
                Some(p) => p,
                None => continue,
            };

            let class_id = department_id
                .and_then(|dept| index.class_for(dept, &row.row.subject))
                .map(String::from);

            for week_start in &weeks {
                drafts.push(EntryDraft {
                    sheet_name: plan.sheet_name.clone(),
                    subject: row.row.subject.clone(),
                    class_id: class_id.clone(),
                    teacher_id: parsed.teacher_id.clone(),
                    day: parsed.day,
                    start_time: parsed.start_time,
                    end_time: parsed.end_time,
                    venue_id: parsed.venue_id.clone(),
                    week_start: *week_start,
                });
            }
        }
    }

    drafts
}
