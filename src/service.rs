//! Service façade over the ingestion pipeline and the repository:
//! preview, commit, availability, assignment.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::conflict::VenueConflictResolver;
use crate::error::SchedulingError;
use crate::pipeline::{self, PreviewSummary};
use crate::registry::RegistryStore;
use crate::store::ScheduleRepository;
use crate::types::{DayOfWeek, TermWindow, TimetableEntry, WeekScope};

/// Result of a confirmed upload.
#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub department_id: String,
    pub term_start: NaiveDate,
    pub created_entries: usize,
    pub replaced_entries: usize,
    pub skipped_error_rows: usize,
    pub content_hash: String,
    pub notes: Vec<String>,
}

pub struct TimetableService {
    registry: Arc<RegistryStore>,
    repo: Arc<dyn ScheduleRepository>,
    resolver: VenueConflictResolver,
}

impl TimetableService {
    pub fn new(registry: Arc<RegistryStore>, repo: Arc<dyn ScheduleRepository>) -> Self {
        let resolver = VenueConflictResolver::new(Arc::clone(&registry), Arc::clone(&repo));
        Self {
            registry,
            repo,
            resolver,
        }
    }

    /// Dry-run the pipeline over an upload. Persists nothing.
    pub async fn preview(
        &self,
        filename: &str,
        data: &[u8],
        term: &TermWindow,
    ) -> Result<PreviewSummary, SchedulingError> {
        let index = self.registry.index();
        let run = pipeline::run(filename, data, term, &index, None)?;
        Ok(run.summary)
    }

    /// Re-run the pipeline and atomically replace the department's
    /// schedule for the term. Refused while error rows remain, unless the
    /// caller explicitly opts into skipping them.
    pub async fn commit(
        &self,
        filename: &str,
        data: &[u8],
        department_id: &str,
        term: &TermWindow,
        allow_errors: bool,
    ) -> Result<CommitOutcome, SchedulingError> {
        let index = self.registry.index();
        let run = pipeline::run(filename, data, term, &index, Some(department_id))?;

        if run.summary.error_rows > 0 && !allow_errors {
            return Err(SchedulingError::Validation {
                error_rows: run.summary.error_rows,
            });
        }

        let skipped_error_rows = run.summary.error_rows;
        let content_hash = run.summary.content_hash.clone();
        let unresolved_classes = run.drafts.iter().filter(|d| d.class_id.is_none()).count();

        let outcome = self
            .repo
            .replace_schedule(department_id, term, run.drafts)
            .await?;

        info!(
            "Committed timetable for '{}' term {}: {} created, {} replaced, {} error row(s) skipped",
            department_id, term.start, outcome.created, outcome.replaced, skipped_error_rows
        );

        let mut notes = outcome.venue_conflicts;
        if unresolved_classes > 0 {
            notes.push(format!(
                "{} entr(ies) have no matching class for department '{}'",
                unresolved_classes, department_id
            ));
        }

        Ok(CommitOutcome {
            department_id: department_id.to_string(),
            term_start: term.start,
            created_entries: outcome.created,
            replaced_entries: outcome.replaced,
            skipped_error_rows,
            content_hash,
            notes,
        })
    }

    /// Venues free for the given day/window within the scope.
    pub async fn available_venues(
        &self,
        day: DayOfWeek,
        start: NaiveTime,
        end: NaiveTime,
        scope: WeekScope,
    ) -> Vec<String> {
        self.resolver.available_venues(day, start, end, scope).await
    }

    /// Bind a venue to a committed entry, or fail on overlap.
    pub async fn assign_venue(
        &self,
        entry_id: &str,
        venue_id: &str,
    ) -> Result<TimetableEntry, SchedulingError> {
        self.resolver.assign(entry_id, venue_id).await
    }

    /// Committed entries for a department/term.
    pub async fn entries_for(
        &self,
        department_id: &str,
        term_start: NaiveDate,
    ) -> Vec<TimetableEntry> {
        self.repo.entries_for(department_id, term_start).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ClassRecord, TeacherRecord, VenueRecord};
    use crate::store::InMemoryScheduleRepository;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn service() -> TimetableService {
        let registry = Arc::new(RegistryStore::empty());
        registry.add_teacher(TeacherRecord {
            id: "t1".into(),
            name: "Ada Lovelace".into(),
            email: "ada@school.edu".into(),
        });
        registry.add_venue(VenueRecord {
            id: "v1".into(),
            name: "Room A".into(),
            capacity: 30,
        });
        registry.add_venue(VenueRecord {
            id: "v2".into(),
            name: "Room B".into(),
            capacity: 60,
        });
        registry.add_class(ClassRecord {
            id: "c1".into(),
            subject: "Math".into(),
            department_id: "dep-sci".into(),
        });
        let repo = Arc::new(InMemoryScheduleRepository::new());
        TimetableService::new(registry, repo)
    }

    fn term() -> TermWindow {
        TermWindow::new(date(2024, 1, 1), date(2024, 1, 14)).unwrap()
    }

    const CLEAN_CSV: &[u8] = b"subject,teacher_email,day,start,end,venue\n\
        Math,ada@school.edu,Monday,09:00,10:00,Room A\n";

    const ERROR_CSV: &[u8] = b"subject,teacher_email,day,start,end,venue\n\
        Math,ada@school.edu,Monday,09:00,10:00,Room A\n\
        Physics,ada@school.edu,Tuesday,11:00,10:00,\n\
        ,ada@school.edu,Friday,09:00,10:00,\n";

    #[tokio::test]
    async fn test_preview_persists_nothing() {
        let svc = service();
        let summary = svc
            .preview("Weeks 1-2.csv", CLEAN_CSV, &term())
            .await
            .unwrap();
        assert_eq!(summary.expanded_entries, 2);
        assert!(svc.entries_for("dep-sci", date(2024, 1, 1)).await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_creates_dated_entries() {
        let svc = service();
        let outcome = svc
            .commit("Weeks 1-2.csv", CLEAN_CSV, "dep-sci", &term(), false)
            .await
            .unwrap();
        assert_eq!(outcome.created_entries, 2);
        assert_eq!(outcome.replaced_entries, 0);
        assert!(outcome.notes.is_empty());

        let entries = svc.entries_for("dep-sci", date(2024, 1, 1)).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].week_start, date(2024, 1, 1));
        assert_eq!(entries[1].week_start, date(2024, 1, 8));
        assert_eq!(entries[0].class_id.as_deref(), Some("c1"));
        assert_eq!(entries[0].teacher_id.as_deref(), Some("t1"));
        assert_eq!(entries[0].venue_id.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_commit_with_errors_rejected_store_unchanged() {
        let svc = service();
        let err = svc
            .commit("Weeks 1-2.csv", ERROR_CSV, "dep-sci", &term(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulingError::Validation { error_rows: 2 }));
        assert!(svc.entries_for("dep-sci", date(2024, 1, 1)).await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_with_override_skips_error_rows() {
        let svc = service();
        let outcome = svc
            .commit("Weeks 1-2.csv", ERROR_CSV, "dep-sci", &term(), true)
            .await
            .unwrap();
        // Only the clean Math row expands, across two weeks
        assert_eq!(outcome.created_entries, 2);
        assert_eq!(outcome.skipped_error_rows, 2);
    }

    #[tokio::test]
    async fn test_recommit_fully_replaces() {
        let svc = service();
        svc.commit("Weeks 1-2.csv", CLEAN_CSV, "dep-sci", &term(), false)
            .await
            .unwrap();
        let outcome = svc
            .commit("Week 1.csv", CLEAN_CSV, "dep-sci", &term(), false)
            .await
            .unwrap();
        assert_eq!(outcome.replaced_entries, 2);
        assert_eq!(outcome.created_entries, 1);
        assert_eq!(svc.entries_for("dep-sci", date(2024, 1, 1)).await.len(), 1);
    }

    #[tokio::test]
    async fn test_availability_reflects_commits() {
        let svc = service();
        svc.commit("Week 1.csv", CLEAN_CSV, "dep-sci", &term(), false)
            .await
            .unwrap();

        let free = svc
            .available_venues(
                DayOfWeek::Monday,
                time(9, 30),
                time(10, 30),
                WeekScope::Week(date(2024, 1, 1)),
            )
            .await;
        assert_eq!(free, vec!["v2".to_string()]);

        // The adjacent slot is free in both venues
        let free = svc
            .available_venues(
                DayOfWeek::Monday,
                time(10, 0),
                time(11, 0),
                WeekScope::Week(date(2024, 1, 1)),
            )
            .await;
        assert_eq!(free, vec!["v1".to_string(), "v2".to_string()]);
    }

    #[tokio::test]
    async fn test_assign_venue_conflict_and_unknown_venue() {
        let svc = service();
        // Two overlapping unvenued rows
        let csv: &[u8] = b"subject,teacher_email,day,start,end\n\
            Math,ada@school.edu,Monday,09:00,10:00\n\
            Math,ada@school.edu,Monday,09:30,10:30\n";
        svc.commit("Week 1.csv", csv, "dep-sci", &term(), false)
            .await
            .unwrap();
        let entries = svc.entries_for("dep-sci", date(2024, 1, 1)).await;

        let assigned = svc.assign_venue(&entries[0].id, "v1").await.unwrap();
        assert_eq!(assigned.venue_id.as_deref(), Some("v1"));

        let err = svc.assign_venue(&entries[1].id, "v1").await.unwrap_err();
        assert!(matches!(err, SchedulingError::VenueConflict { .. }));

        let err = svc.assign_venue(&entries[1].id, "v99").await.unwrap_err();
        assert!(matches!(err, SchedulingError::UnknownVenue(_)));
    }

    #[tokio::test]
    async fn test_commit_notes_unresolved_classes() {
        let svc = service();
        let csv: &[u8] = b"subject,teacher_email,day,start,end\n\
            Astronomy,ada@school.edu,Monday,09:00,10:00\n";
        let outcome = svc
            .commit("Week 1.csv", csv, "dep-sci", &term(), false)
            .await
            .unwrap();
        assert_eq!(outcome.notes.len(), 1);
        assert!(outcome.notes[0].contains("no matching class"));
    }
}
