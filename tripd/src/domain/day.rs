//! DayPlan domain type
//!
//! One day's activity sequence plus its lifecycle status. Status moves
//! forward only; the single backward-looking edge is Confirmed ->
//! Invalidated, reserved for the replanning engine.

use chrono::NaiveDate;
use planstore::now_ms;
use serde::{Deserialize, Serialize};

use super::activity::ActivityItem;
use super::critique::CritiqueResult;
use super::error::DomainError;

/// Day lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    /// Created lazily, nothing generated yet
    #[default]
    Empty,
    /// Generation produced a candidate
    Drafted,
    /// Candidate handed to the critique stage
    UnderCritique,
    /// Rejected or user-flagged, awaiting regeneration
    Revising,
    /// Committed candidate awaiting user confirmation
    PendingConfirmation,
    /// User confirmed; immutable until invalidated
    Confirmed,
    /// Replanning discarded the confirmed plan; a fresh draft follows
    Invalidated,
    /// Replanning exhausted its budget; requires human attention
    NeedsManualReview,
}

impl std::fmt::Display for DayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Drafted => write!(f, "drafted"),
            Self::UnderCritique => write!(f, "under_critique"),
            Self::Revising => write!(f, "revising"),
            Self::PendingConfirmation => write!(f, "pending_confirmation"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Invalidated => write!(f, "invalidated"),
            Self::NeedsManualReview => write!(f, "needs_manual_review"),
        }
    }
}

impl DayStatus {
    /// Check whether an edge is in the allowed transition set
    pub fn can_transition(self, to: DayStatus) -> bool {
        use DayStatus::*;
        matches!(
            (self, to),
            (Empty, Drafted)
                | (Drafted, UnderCritique)
                | (UnderCritique, PendingConfirmation)
                | (UnderCritique, Revising)
                | (Revising, UnderCritique)
                | (Revising, PendingConfirmation)
                | (PendingConfirmation, Confirmed)
                | (PendingConfirmation, Revising)
                | (Confirmed, Invalidated)
                | (Invalidated, Drafted)
                | (Drafted, NeedsManualReview)
                | (UnderCritique, NeedsManualReview)
                | (Revising, NeedsManualReview)
                | (Invalidated, NeedsManualReview)
        )
    }
}

/// One day's plan within a PlanContext
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    /// 0-based index, immutable once created
    pub index: usize,

    /// Calendar date
    pub date: NaiveDate,

    /// Lifecycle status
    pub status: DayStatus,

    /// Chronologically ordered activities
    pub activities: Vec<ActivityItem>,

    /// Generation re-invocations for the current candidate cycle
    pub revision: u32,

    /// Last critique result, if any
    #[serde(default)]
    pub critique: Option<CritiqueResult>,

    /// Set when committed after budget exhaustion instead of approval
    #[serde(default)]
    pub degraded: bool,

    /// expectedVersion supplied by the successful ConfirmDay call,
    /// used for idempotent re-confirmation
    #[serde(default)]
    pub confirmed_with_version: Option<u64>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl DayPlan {
    /// Create an empty day at the given index and date
    pub fn new(index: usize, date: NaiveDate) -> Self {
        let now = now_ms();
        Self {
            index,
            date,
            status: DayStatus::Empty,
            activities: Vec::new(),
            revision: 0,
            critique: None,
            degraded: false,
            confirmed_with_version: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition the status, rejecting edges outside the allowed set
    pub fn transition(&mut self, to: DayStatus) -> Result<(), DomainError> {
        if !self.status.can_transition(to) {
            return Err(DomainError::InvalidTransition {
                day: self.index,
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now_ms();
        Ok(())
    }

    /// Replace the activity sequence wholesale
    ///
    /// Only the generation stage produces activity sequences; critique and
    /// replanning never patch items individually.
    pub fn set_activities(&mut self, activities: Vec<ActivityItem>) {
        self.activities = activities;
        self.updated_at = now_ms();
    }

    /// Attach the latest critique result
    pub fn set_critique(&mut self, critique: CritiqueResult) {
        self.critique = Some(critique);
        self.updated_at = now_ms();
    }

    /// Increment the revision counter
    pub fn increment_revision(&mut self) {
        self.revision += 1;
        self.updated_at = now_ms();
    }

    /// Validate the schedule invariant: non-overlapping windows in
    /// monotonically increasing start order
    ///
    /// Holds for every Confirmed day; also used by the revise loop to
    /// auto-reject structurally invalid generation output.
    pub fn validate_schedule(&self) -> Result<(), DomainError> {
        for pair in self.activities.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.effective_start() < prev.effective_start() {
                return Err(DomainError::NonMonotonicSchedule {
                    day: self.index,
                    item: next.name.clone(),
                });
            }
            if next.effective_start() < prev.effective_end() {
                return Err(DomainError::OverlappingActivities {
                    day: self.index,
                    first: prev.name.clone(),
                    second: next.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Check whether this day holds user-visible plan content
    pub fn is_planned(&self) -> bool {
        matches!(
            self.status,
            DayStatus::PendingConfirmation | DayStatus::Confirmed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::ActivityCategory;
    use chrono::NaiveTime;

    fn day() -> DayPlan {
        DayPlan::new(0, NaiveDate::from_ymd_opt(2026, 6, 1).unwrap())
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn act(name: &str, start: (u32, u32), end: (u32, u32)) -> ActivityItem {
        ActivityItem::new(name, ActivityCategory::Sightseeing).with_window(t(start.0, start.1), t(end.0, end.1))
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut d = day();
        for status in [
            DayStatus::Drafted,
            DayStatus::UnderCritique,
            DayStatus::PendingConfirmation,
            DayStatus::Confirmed,
            DayStatus::Invalidated,
            DayStatus::Drafted,
        ] {
            d.transition(status).unwrap();
        }
        assert_eq!(d.status, DayStatus::Drafted);
    }

    #[test]
    fn test_rejects_confirm_from_empty() {
        let mut d = day();
        let err = d.transition(DayStatus::Confirmed).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { day: 0, .. }));
        assert_eq!(d.status, DayStatus::Empty);
    }

    #[test]
    fn test_confirmed_is_immutable_except_invalidation() {
        let mut d = day();
        d.status = DayStatus::Confirmed;

        assert!(d.transition(DayStatus::Revising).is_err());
        assert!(d.transition(DayStatus::PendingConfirmation).is_err());
        assert!(d.transition(DayStatus::Invalidated).is_ok());
    }

    #[test]
    fn test_request_changes_edge() {
        let mut d = day();
        d.status = DayStatus::PendingConfirmation;
        d.transition(DayStatus::Revising).unwrap();
        d.transition(DayStatus::UnderCritique).unwrap();
    }

    #[test]
    fn test_needs_manual_review_from_revising() {
        let mut d = day();
        d.status = DayStatus::Revising;
        d.transition(DayStatus::NeedsManualReview).unwrap();
        // Terminal until a human intervenes
        assert!(d.transition(DayStatus::Drafted).is_err());
    }

    #[test]
    fn test_validate_schedule_ok() {
        let mut d = day();
        d.set_activities(vec![
            act("Market", (9, 0), (10, 30)),
            act("Museum", (11, 0), (13, 0)),
            act("Dinner", (19, 0), (21, 0)),
        ]);
        d.validate_schedule().unwrap();
    }

    #[test]
    fn test_validate_schedule_overlap() {
        let mut d = day();
        d.set_activities(vec![act("Market", (9, 0), (11, 0)), act("Museum", (10, 0), (12, 0))]);
        assert!(matches!(
            d.validate_schedule(),
            Err(DomainError::OverlappingActivities { .. })
        ));
    }

    #[test]
    fn test_validate_schedule_out_of_order() {
        let mut d = day();
        d.set_activities(vec![act("Museum", (14, 0), (16, 0)), act("Market", (9, 0), (10, 0))]);
        assert!(matches!(
            d.validate_schedule(),
            Err(DomainError::NonMonotonicSchedule { .. })
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut d = day();
        d.set_activities(vec![act("Market", (9, 0), (10, 0))]);
        let json = serde_json::to_string(&d).unwrap();
        let back: DayPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
