//! Domain error types

use thiserror::Error;

use super::day::DayStatus;

/// Errors from domain-level validation
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid status transition for day {day}: {from} -> {to}")]
    InvalidTransition { day: usize, from: DayStatus, to: DayStatus },

    #[error("Day {day}: activities '{first}' and '{second}' have overlapping windows")]
    OverlappingActivities { day: usize, first: String, second: String },

    #[error("Day {day}: activity '{item}' starts before its predecessor")]
    NonMonotonicSchedule { day: usize, item: String },

    #[error("Day index {index} out of range for a {len}-day trip")]
    DayOutOfRange { index: usize, len: usize },

    #[error("Empty or inverted date range: {start} to {end}")]
    EmptyDateRange { start: chrono::NaiveDate, end: chrono::NaiveDate },

    #[error("Trip duration {days} days exceeds the configured maximum of {max}")]
    TripTooLong { days: usize, max: usize },
}
