//! ActivityItem domain type
//!
//! One scheduled unit within a day (meal, attraction, transfer). Items are
//! always replaced wholesale by the generation stage; critique only
//! annotates them by id.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::id::activity_id;

/// Activity category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    Sightseeing,
    Dining,
    Transport,
    Entertainment,
    Shopping,
    Outdoor,
    Cultural,
    Relaxation,
}

impl std::fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sightseeing => write!(f, "sightseeing"),
            Self::Dining => write!(f, "dining"),
            Self::Transport => write!(f, "transport"),
            Self::Entertainment => write!(f, "entertainment"),
            Self::Shopping => write!(f, "shopping"),
            Self::Outdoor => write!(f, "outdoor"),
            Self::Cultural => write!(f, "cultural"),
            Self::Relaxation => write!(f, "relaxation"),
        }
    }
}

/// Opaque reference to a place owned by the lookup collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRef {
    /// Human-readable place name
    pub name: String,

    /// Provider place id when the lookup collaborator supplied one
    #[serde(default)]
    pub place_id: Option<String>,
}

impl LocationRef {
    /// Create a reference by name only
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            place_id: None,
        }
    }

    /// Check whether two references point at the same place
    ///
    /// Place ids win when both sides carry one; otherwise fall back to a
    /// case-insensitive name comparison.
    pub fn same_place(&self, other: &LocationRef) -> bool {
        match (&self.place_id, &other.place_id) {
            (Some(a), Some(b)) => a == b,
            _ => self.name.eq_ignore_ascii_case(&other.name),
        }
    }
}

/// One scheduled unit within a DayPlan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityItem {
    /// Stable identifier, referenced by critique issues
    pub id: String,

    /// Display name
    pub name: String,

    /// Category
    pub category: ActivityCategory,

    /// Start time, None until sequencing
    pub start: Option<NaiveTime>,

    /// End time, None until sequencing
    pub end: Option<NaiveTime>,

    /// Place reference, owned by the lookup collaborators
    #[serde(default)]
    pub location: Option<LocationRef>,

    /// Estimated cost in the session currency
    #[serde(default)]
    pub estimated_cost: Option<f64>,

    /// Free-text rationale from the generation stage
    #[serde(default)]
    pub rationale: String,
}

impl ActivityItem {
    /// Create a new activity with a generated ID
    pub fn new(name: impl Into<String>, category: ActivityCategory) -> Self {
        let name = name.into();
        Self {
            id: activity_id(&name),
            name,
            category,
            start: None,
            end: None,
            location: None,
            estimated_cost: None,
            rationale: String::new(),
        }
    }

    /// Builder method to set the time window
    pub fn with_window(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Builder method to set the location
    pub fn with_location(mut self, location: LocationRef) -> Self {
        self.location = Some(location);
        self
    }

    /// Effective start, defaulting to the start of day when unsequenced
    pub fn effective_start(&self) -> NaiveTime {
        self.start.unwrap_or(NaiveTime::MIN)
    }

    /// Effective end, defaulting to the end of day when unsequenced
    pub fn effective_end(&self) -> NaiveTime {
        self.end
            .unwrap_or_else(|| NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
    }

    /// Check whether this activity's window overlaps a time range
    pub fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.effective_start() < end && start < self.effective_end()
    }
}
