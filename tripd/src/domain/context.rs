//! PlanContext domain type
//!
//! The versioned, session-scoped record of a trip's entire plan-in-progress.
//! Owned by exactly one session actor; every committed mutation bumps the
//! version counter, which the store uses for optimistic-concurrency writes
//! and callers use to detect stale views.

use chrono::NaiveDate;
use planstore::{Record, now_ms};
use serde::{Deserialize, Serialize};

use super::day::DayPlan;
use super::error::DomainError;
use super::id::trip_id;
use super::preferences::Preferences;

/// Session state machine position
///
/// Persisted with the context so an interrupted session resumes where it
/// left off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "phase", content = "day", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    /// Driving the revise loop for a day
    Planning(usize),
    /// Waiting at the confirmation gate for a day
    Confirming(usize),
    /// Replanning engine active after a disruption
    Replanning,
    /// All days confirmed, watching for disruptions
    Monitoring,
    /// Trip over, context archivable
    Completed,
    /// Session abandoned by the user
    Cancelled,
    /// Fatal persistence failure
    Failed,
}

impl SessionState {
    /// Check if this is a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Planning(day) => write!(f, "planning(day {})", day),
            Self::Confirming(day) => write!(f, "confirming(day {})", day),
            Self::Replanning => write!(f, "replanning"),
            Self::Monitoring => write!(f, "monitoring"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The versioned record of one trip's planning session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanContext {
    /// Unique trip identifier (e.g. "019430-trip-kyoto")
    pub trip_id: String,

    /// Primary destination
    pub destination: String,

    /// First trip day (inclusive)
    pub start_date: NaiveDate,

    /// Last trip day (inclusive)
    pub end_date: NaiveDate,

    /// Immutable preference snapshot, read-only to all stages
    pub preferences: Preferences,

    /// Day plans, created lazily as planning reaches each index
    pub days: Vec<DayPlan>,

    /// Session state machine position
    pub state: SessionState,

    /// Monotonically increasing version, bumped on every committed mutation
    pub version: u64,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl PlanContext {
    /// Create a new context at version 0
    ///
    /// Rejects empty/inverted date ranges and trips longer than `max_days`.
    pub fn new(
        destination: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        preferences: Preferences,
        max_days: usize,
    ) -> Result<Self, DomainError> {
        if end_date < start_date {
            return Err(DomainError::EmptyDateRange {
                start: start_date,
                end: end_date,
            });
        }

        let days = (end_date - start_date).num_days() as usize + 1;
        if days > max_days {
            return Err(DomainError::TripTooLong { days, max: max_days });
        }

        let destination = destination.into();
        let now = now_ms();
        Ok(Self {
            trip_id: trip_id(&destination),
            destination,
            start_date,
            end_date,
            preferences,
            days: Vec::new(),
            state: SessionState::Idle,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Trip duration in days (inclusive range)
    pub fn duration_days(&self) -> usize {
        (self.end_date - self.start_date).num_days() as usize + 1
    }

    /// Calendar date for a day index
    pub fn date_for(&self, index: usize) -> NaiveDate {
        self.start_date + chrono::Days::new(index as u64)
    }

    /// Borrow a day plan if it has been created
    pub fn day(&self, index: usize) -> Option<&DayPlan> {
        self.days.get(index)
    }

    /// Mutably borrow a day plan if it has been created
    pub fn day_mut(&mut self, index: usize) -> Option<&mut DayPlan> {
        self.days.get_mut(index)
    }

    /// Borrow a day plan, creating it (and any gap before it) lazily
    pub fn ensure_day(&mut self, index: usize) -> Result<&mut DayPlan, DomainError> {
        let len = self.duration_days();
        if index >= len {
            return Err(DomainError::DayOutOfRange { index, len });
        }
        while self.days.len() <= index {
            let next = self.days.len();
            let date = self.date_for(next);
            self.days.push(DayPlan::new(next, date));
        }
        self.updated_at = now_ms();
        Ok(&mut self.days[index])
    }

    /// Bump the version counter for a committed mutation
    pub fn bump_version(&mut self) {
        self.version += 1;
        self.updated_at = now_ms();
    }

    /// Set the session state
    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.updated_at = now_ms();
    }

    /// Check if every day is confirmed
    pub fn all_days_confirmed(&self) -> bool {
        self.days.len() == self.duration_days()
            && self.days.iter().all(|d| d.status == super::day::DayStatus::Confirmed)
    }
}

impl Record for PlanContext {
    fn id(&self) -> &str {
        &self.trip_id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn collection_name() -> &'static str {
        "trips"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::day::DayStatus;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    fn ctx() -> PlanContext {
        PlanContext::new("Kyoto", date(1), date(3), Preferences::default(), 30).unwrap()
    }

    #[test]
    fn test_new_context() {
        let c = ctx();
        assert!(c.trip_id.contains("-trip-kyoto"));
        assert_eq!(c.version, 0);
        assert_eq!(c.duration_days(), 3);
        assert_eq!(c.state, SessionState::Idle);
        assert!(c.days.is_empty());
    }

    #[test]
    fn test_rejects_inverted_range() {
        let err = PlanContext::new("Kyoto", date(5), date(1), Preferences::default(), 30).unwrap_err();
        assert!(matches!(err, DomainError::EmptyDateRange { .. }));
    }

    #[test]
    fn test_rejects_too_long() {
        let err = PlanContext::new(
            "Kyoto",
            date(1),
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            Preferences::default(),
            30,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::TripTooLong { .. }));
    }

    #[test]
    fn test_single_day_trip_is_valid() {
        let c = PlanContext::new("Kyoto", date(1), date(1), Preferences::default(), 30).unwrap();
        assert_eq!(c.duration_days(), 1);
    }

    #[test]
    fn test_ensure_day_lazy_creation() {
        let mut c = ctx();
        let d = c.ensure_day(1).unwrap();
        assert_eq!(d.index, 1);
        assert_eq!(d.date, date(2));
        // Gap day 0 was created too
        assert_eq!(c.days.len(), 2);
        assert_eq!(c.day(0).unwrap().status, DayStatus::Empty);
    }

    #[test]
    fn test_ensure_day_out_of_range() {
        let mut c = ctx();
        assert!(matches!(
            c.ensure_day(3),
            Err(DomainError::DayOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_version_bumps() {
        let mut c = ctx();
        c.bump_version();
        c.bump_version();
        assert_eq!(c.version, 2);
    }

    #[test]
    fn test_all_days_confirmed() {
        let mut c = ctx();
        assert!(!c.all_days_confirmed());

        for i in 0..3 {
            let d = c.ensure_day(i).unwrap();
            d.status = DayStatus::Confirmed;
        }
        assert!(c.all_days_confirmed());
    }

    #[test]
    fn test_record_impl_and_serde() {
        let c = ctx();
        assert_eq!(Record::id(&c), c.trip_id);
        assert_eq!(PlanContext::collection_name(), "trips");

        let json = serde_json::to_string(&c).unwrap();
        let back: PlanContext = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
