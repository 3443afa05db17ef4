//! Blast radius computation
//!
//! Pure functions deciding which days a disruption touches. A day is
//! affected when its activity windows overlap the event's time window, when
//! the event's location matches an activity's location reference, or when a
//! user-initiated event names it. Nothing else; cascades are never inferred.

use crate::domain::{DayPlan, DisruptionEvent, PlanContext};

/// Check whether one day falls inside the event's blast radius
///
/// Only days with user-visible content (PendingConfirmation or Confirmed)
/// can be affected; days still moving through the loop are rebuilt anyway.
pub fn day_affected(day: &DayPlan, event: &DisruptionEvent) -> bool {
    if !day.is_planned() {
        return false;
    }

    if event.is_user_initiated() && event.day_index == Some(day.index) {
        return true;
    }

    if day.date == event.window.date
        && day
            .activities
            .iter()
            .any(|a| a.overlaps(event.window.effective_start(), event.window.effective_end()))
    {
        return true;
    }

    if let Some(event_location) = &event.location {
        return day
            .activities
            .iter()
            .filter_map(|a| a.location.as_ref())
            .any(|l| l.same_place(event_location));
    }

    false
}

/// Affected day indices in ascending order
pub fn affected_days(context: &PlanContext, event: &DisruptionEvent) -> Vec<usize> {
    context
        .days
        .iter()
        .filter(|day| day_affected(day, event))
        .map(|day| day.index)
        .collect()
}
