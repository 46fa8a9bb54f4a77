//! Schedule persistence seam and its in-memory implementation.
//!
//! The repository is the only shared mutable state in the service. The
//! in-memory backend holds everything under one `RwLock`: full-replace
//! and venue assignment each run under a single write guard, so readers
//! never observe a half-replaced schedule and two concurrent assignments
//! for the same slot cannot both succeed.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::conflict::booking_blocks;
use crate::error::SchedulingError;
use crate::types::{
    new_booking_id, DayOfWeek, EntryDraft, TermWindow, TimetableEntry, VenueBooking, WeekScope,
};

/// Result of an atomic full-replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaceOutcome {
    pub created: usize,
    pub replaced: usize,
    /// Declared venues dropped because the slot was already booked.
    pub venue_conflicts: Vec<String>,
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Replace the whole schedule for a department/term with `drafts`,
    /// atomically with respect to readers. Venue-bound drafts are
    /// conflict-checked against the surviving bookings (and against
    /// earlier drafts in the same batch, first wins); a conflicting
    /// declaration is committed with its venue unassigned and noted in
    /// the outcome.
    async fn replace_schedule(
        &self,
        department_id: &str,
        term: &TermWindow,
        drafts: Vec<EntryDraft>,
    ) -> Result<ReplaceOutcome, SchedulingError>;

    /// Committed entries for a department/term, in commit order.
    async fn entries_for(&self, department_id: &str, term_start: NaiveDate) -> Vec<TimetableEntry>;

    /// Venue ids with at least one booking overlapping the window.
    async fn venues_booked_during(
        &self,
        day: DayOfWeek,
        start: NaiveTime,
        end: NaiveTime,
        scope: WeekScope,
    ) -> HashSet<String>;

    /// Check-and-set venue binding for one entry. Fails without touching
    /// anything when an overlapping booking already holds the slot.
    async fn assign_venue(
        &self,
        entry_id: &str,
        venue_id: &str,
    ) -> Result<TimetableEntry, SchedulingError>;
}

#[derive(Default)]
struct StoreState {
    entries: HashMap<String, TimetableEntry>,
    /// (department, term start) -> entry ids, in commit order.
    schedules: HashMap<(String, NaiveDate), Vec<String>>,
    /// Owner entry id -> its booking. One booking per entry.
    bookings: HashMap<String, VenueBooking>,
}

/// In-memory repository.
#[derive(Default)]
pub struct InMemoryScheduleRepository {
    state: RwLock<StoreState>,
}

impl InMemoryScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryScheduleRepository {
    async fn replace_schedule(
        &self,
        department_id: &str,
        term: &TermWindow,
        drafts: Vec<EntryDraft>,
    ) -> Result<ReplaceOutcome, SchedulingError> {
        let mut state = self.state.write().unwrap();

        let key = (department_id.to_string(), term.start);
        let old_ids = state.schedules.remove(&key).unwrap_or_default();
        for id in &old_ids {
            state.entries.remove(id);
            state.bookings.remove(id);
        }
        let replaced = old_ids.len();

        let mut venue_conflicts = Vec::new();
        let mut new_ids = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let mut entry = TimetableEntry::from_draft(draft, department_id, term);

            if let Some(venue_id) = entry.venue_id.clone() {
                let scope = WeekScope::Week(entry.week_start);
                let blocked = state.bookings.values().any(|b| {
                    booking_blocks(b, &venue_id, entry.day, entry.start_time, entry.end_time, scope)
                });
                if blocked {
                    venue_conflicts.push(format!(
                        "venue '{}' already booked on {} {}-{} (week of {}); '{}' committed unassigned",
                        venue_id,
                        entry.day,
                        entry.start_time.format("%H:%M"),
                        entry.end_time.format("%H:%M"),
                        entry.week_start,
                        entry.subject
                    ));
                    entry.venue_id = None;
                } else {
                    state.bookings.insert(
                        entry.id.clone(),
                        VenueBooking {
                            id: new_booking_id(),
                            venue_id,
                            day: entry.day,
                            start_time: entry.start_time,
                            end_time: entry.end_time,
                            scope,
                            owner_entry_id: entry.id.clone(),
                        },
                    );
                }
            }

            new_ids.push(entry.id.clone());
            state.entries.insert(entry.id.clone(), entry);
        }

        let created = new_ids.len();
        state.schedules.insert(key, new_ids);

        Ok(ReplaceOutcome {
            created,
            replaced,
            venue_conflicts,
        })
    }

    async fn entries_for(&self, department_id: &str, term_start: NaiveDate) -> Vec<TimetableEntry> {
        let state = self.state.read().unwrap();
        let key = (department_id.to_string(), term_start);
        state
            .schedules
            .get(&key)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.entries.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn venues_booked_during(
        &self,
        day: DayOfWeek,
        start: NaiveTime,
        end: NaiveTime,
        scope: WeekScope,
    ) -> HashSet<String> {
        let state = self.state.read().unwrap();
        state
            .bookings
            .values()
            .filter(|b| {
                b.day == day
                    && crate::conflict::scopes_intersect(b.scope, scope)
                    && crate::conflict::time_overlap(b.start_time, b.end_time, start, end)
            })
            .map(|b| b.venue_id.clone())
            .collect()
    }

    async fn assign_venue(
        &self,
        entry_id: &str,
        venue_id: &str,
    ) -> Result<TimetableEntry, SchedulingError> {
        let mut state = self.state.write().unwrap();

        let entry = state
            .entries
            .get(entry_id)
            .cloned()
            .ok_or_else(|| SchedulingError::EntryNotFound(entry_id.to_string()))?;

        let scope = WeekScope::Week(entry.week_start);
        let blocked = state.bookings.values().any(|b| {
            b.owner_entry_id != entry_id
                && booking_blocks(b, venue_id, entry.day, entry.start_time, entry.end_time, scope)
        });
        if blocked {
            return Err(SchedulingError::VenueConflict {
                venue_id: venue_id.to_string(),
                day: entry.day,
                start: entry.start_time,
                end: entry.end_time,
            });
        }

        // Replaces any booking this entry already owned
        state.bookings.insert(
            entry_id.to_string(),
            VenueBooking {
                id: new_booking_id(),
                venue_id: venue_id.to_string(),
                day: entry.day,
                start_time: entry.start_time,
                end_time: entry.end_time,
                scope,
                owner_entry_id: entry_id.to_string(),
            },
        );

        let entry = state
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| SchedulingError::EntryNotFound(entry_id.to_string()))?;
        entry.venue_id = Some(venue_id.to_string());
        Ok(entry.clone())
    }
}
