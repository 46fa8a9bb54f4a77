//! Venue conflict detection: interval overlap, scope intersection, and
//! the resolver answering availability and assignment requests.
//!
//! Intervals are half-open `[start, end)`: back-to-back bookings sharing
//! a boundary never conflict. The booking store is injected so the checks
//! run identically against the in-memory fake in tests.

use chrono::NaiveTime;
use std::sync::Arc;

use crate::error::SchedulingError;
use crate::registry::RegistryStore;
use crate::store::ScheduleRepository;
use crate::types::{DayOfWeek, TimetableEntry, VenueBooking, WeekScope};

pub fn time_overlap(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Term scope intersects everything; two week scopes intersect only when
/// they name the same Monday.
pub fn scopes_intersect(a: WeekScope, b: WeekScope) -> bool {
    match (a, b) {
        (WeekScope::Term, _) | (_, WeekScope::Term) => true,
        (WeekScope::Week(x), WeekScope::Week(y)) => x == y,
    }
}

/// Whether an existing booking blocks the requested venue/day/window.
pub fn booking_blocks(
    booking: &VenueBooking,
    venue_id: &str,
    day: DayOfWeek,
    start: NaiveTime,
    end: NaiveTime,
    scope: WeekScope,
) -> bool {
    booking.venue_id == venue_id
        && booking.day == day
        && scopes_intersect(booking.scope, scope)
        && time_overlap(booking.start_time, booking.end_time, start, end)
}

/// Availability queries and venue assignment.
pub struct VenueConflictResolver {
    registry: Arc<RegistryStore>,
    repo: Arc<dyn ScheduleRepository>,
}

impl VenueConflictResolver {
    pub fn new(registry: Arc<RegistryStore>, repo: Arc<dyn ScheduleRepository>) -> Self {
        Self { registry, repo }
    }

    /// Venues with no booking overlapping the window in the given scope.
    /// No ranking is imposed; output follows registry order.
    pub async fn available_venues(
        &self,
        day: DayOfWeek,
        start: NaiveTime,
        end: NaiveTime,
        scope: WeekScope,
    ) -> Vec<String> {
        let booked = self.repo.venues_booked_during(day, start, end, scope).await;
        self.registry
            .venues()
            .into_iter()
            .map(|v| v.id)
            .filter(|id| !booked.contains(id))
            .collect()
    }

    /// Bind a venue to a committed entry. The overlap check re-runs
    /// inside the store's write lock, so a stale availability answer can
    /// never turn into a double booking.
    pub async fn assign(
        &self,
        entry_id: &str,
        venue_id: &str,
    ) -> Result<TimetableEntry, SchedulingError> {
        if !self.registry.venue_exists(venue_id) {
            return Err(SchedulingError::UnknownVenue(venue_id.to_string()));
        }
        self.repo.assign_venue(entry_id, venue_id).await
    }
}
