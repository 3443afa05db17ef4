//! DisruptionEvent domain type
//!
//! A real-world event that may invalidate part of a confirmed plan. Events
//! are always explicit: cascading effects must arrive as further events,
//! never be inferred by the replanning engine.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::activity::LocationRef;
use super::critique::Severity;

/// Kind of disruption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisruptionKind {
    FlightDelay,
    Closure,
    SevereWeather,
    /// Traveler-initiated change request
    UserChange,
}

impl std::fmt::Display for DisruptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FlightDelay => write!(f, "flight_delay"),
            Self::Closure => write!(f, "closure"),
            Self::SevereWeather => write!(f, "severe_weather"),
            Self::UserChange => write!(f, "user_change"),
        }
    }
}

/// Affected time window of a disruption
///
/// `start`/`end` of None mean the window covers the whole day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Calendar date the window falls on
    pub date: NaiveDate,

    /// Window start, None = start of day
    #[serde(default)]
    pub start: Option<NaiveTime>,

    /// Window end, None = end of day
    #[serde(default)]
    pub end: Option<NaiveTime>,
}

impl TimeWindow {
    /// A window covering an entire day
    pub fn whole_day(date: NaiveDate) -> Self {
        Self {
            date,
            start: None,
            end: None,
        }
    }

    /// A bounded window within a day
    pub fn between(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            date,
            start: Some(start),
            end: Some(end),
        }
    }

    /// Effective start, defaulting to the start of day
    pub fn effective_start(&self) -> NaiveTime {
        self.start.unwrap_or(NaiveTime::MIN)
    }

    /// Effective end, defaulting to the end of day
    pub fn effective_end(&self) -> NaiveTime {
        self.end
            .unwrap_or_else(|| NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
    }
}

/// A disruption reported against an active trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisruptionEvent {
    /// Kind of disruption
    pub kind: DisruptionKind,

    /// Reported severity
    pub severity: Severity,

    /// Affected time window
    pub window: TimeWindow,

    /// Affected location, if the event is tied to a place
    #[serde(default)]
    pub location: Option<LocationRef>,

    /// Day explicitly referenced by a user-initiated change
    #[serde(default)]
    pub day_index: Option<usize>,

    /// Raw description from the reporter
    pub description: String,
}

impl DisruptionEvent {
    /// Check if this event was initiated by the traveler
    pub fn is_user_initiated(&self) -> bool {
        self.kind == DisruptionKind::UserChange
    }

    /// Render the re-sequencing constraint injected into generation
    ///
    /// This is the only channel through which a disruption reshapes a
    /// regenerated day: an explicit textual constraint, not inference.
    pub fn constraint(&self) -> String {
        match (self.start_shift(), &self.location) {
            (Some(shift), _) => format!(
                "{}: earliest start time on {} shifted to {}",
                self.kind, self.window.date, shift
            ),
            (None, Some(location)) => {
                format!("{}: avoid {} on {} ({})", self.kind, location.name, self.window.date, self.description)
            }
            (None, None) => format!("{} on {}: {}", self.kind, self.window.date, self.description),
        }
    }

    /// Earliest viable start time implied by the window, if bounded
    fn start_shift(&self) -> Option<NaiveTime> {
        match self.kind {
            DisruptionKind::FlightDelay => self.window.end,
            _ => None,
        }
    }
}
