//! Domain types for trip planning sessions
//!
//! PlanContext is the single-owner, versioned session record; everything
//! else hangs off it.

pub mod activity;
pub mod context;
pub mod critique;
pub mod day;
pub mod disruption;
pub mod error;
pub mod id;
pub mod preferences;

pub use activity::{ActivityCategory, ActivityItem, LocationRef};
pub use context::{PlanContext, SessionState};
pub use critique::{CritiqueIssue, CritiqueResult, Dimension, Severity, Verdict};
pub use day::{DayPlan, DayStatus};
pub use disruption::{DisruptionEvent, DisruptionKind, TimeWindow};
pub use error::DomainError;
pub use id::{generate_id, trip_id};
pub use preferences::{BudgetLevel, Preferences, TravelPace};
