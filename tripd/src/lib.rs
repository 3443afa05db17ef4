//! TripDaemon - multi-day itinerary planning orchestrator
//!
//! TripDaemon plans multi-day trips through repeated calls to reasoning and
//! lookup collaborators, gates every day behind explicit user confirmation,
//! and reacts to in-trip disruptions by regenerating only the affected days.
//!
//! # Core Concepts
//!
//! - **Single-owner context**: one actor per trip owns the versioned
//!   PlanContext; every committed mutation bumps the version and persists
//! - **Bounded convergence**: the plan-critique-revise loop always
//!   terminates, falling back to a degraded commit or manual review
//! - **Explicit blast radius**: replanning touches exactly the affected
//!   days; cascades require further explicit events
//!
//! # Modules
//!
//! - [`domain`] - PlanContext, DayPlan, and the rest of the data model
//! - [`stage`] - collaborator contracts, HTTP client, invoker
//! - [`revision`] - the plan-critique-revise loop
//! - [`replan`] - disruption scoping and selective replanning
//! - [`orchestrator`] - per-trip session actors and their registry
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod orchestrator;
pub mod replan;
pub mod revision;
pub mod stage;

// Re-export commonly used types
pub use config::{Config, LimitsConfig, StageConfig, StorageConfig};
pub use domain::{
    ActivityCategory, ActivityItem, BudgetLevel, CritiqueIssue, CritiqueResult, DayPlan, DayStatus, Dimension,
    DisruptionEvent, DisruptionKind, DomainError, LocationRef, PlanContext, Preferences, SessionState, Severity,
    TimeWindow, TravelPace, Verdict,
};
pub use orchestrator::{DaySummary, PlanSummary, SessionError, SessionHandle, SessionManager, StartSessionRequest};
pub use replan::{DayReplanOutcome, ReplanEngine, ReplanReport};
pub use revision::{FailurePolicy, ReviseEngine, ReviseOutcome, RevisionConfig};
pub use stage::{
    CriticStage, GenerationRequest, HttpStageClient, IntentStage, InvokerConfig, PlannerStage, StageError,
    StageInvoker, StageSet,
};
