//! Message and summary types for trip sessions

use chrono::NaiveDate;
use planstore::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{DayStatus, DisruptionEvent, DomainError, PlanContext, SessionState};
use crate::replan::ReplanReport;

/// Errors returned to session callers
#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed or out-of-state request; fails fast, mutates nothing
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Caller's expected version does not match the committed version
    #[error("Version conflict: expected {expected}, actual {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("Trip not found: {0}")]
    NotFound(String),

    #[error("Persistence failure: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Stage failure outside the loop boundary (intent extraction only)
    #[error("Stage failure: {0}")]
    Stage(#[from] crate::stage::StageError),

    #[error("Session cancelled")]
    Cancelled,

    #[error("Session channel closed")]
    ChannelClosed,
}

/// Commands applied by the session actor in arrival order
#[derive(Debug)]
pub enum SessionCommand {
    /// Confirm a day pending confirmation, keyed on the committed version
    ConfirmDay {
        day_index: usize,
        expected_version: u64,
        reply_tx: oneshot::Sender<Result<PlanSummary, SessionError>>,
    },

    /// Reject a pending day with feedback, re-entering the revise loop
    RequestChanges {
        day_index: usize,
        feedback: String,
        reply_tx: oneshot::Sender<Result<PlanSummary, SessionError>>,
    },

    /// Hand a disruption to the replanning engine
    ReportDisruption {
        event: DisruptionEvent,
        reply_tx: oneshot::Sender<Result<ReplanReport, SessionError>>,
    },

    /// Read the current summary
    GetStatus {
        reply_tx: oneshot::Sender<PlanSummary>,
    },

    /// Archive the context and shut the session down
    Close {
        reply_tx: oneshot::Sender<Result<(), SessionError>>,
    },
}

/// Per-day slice of a status summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub index: usize,
    pub date: NaiveDate,
    pub status: DayStatus,
    pub degraded: bool,
    pub activity_count: usize,
    /// Last critique score, if the day was critiqued
    #[serde(default)]
    pub score: Option<f32>,
}

/// Caller-facing view of one session, never the raw context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub trip_id: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub state: SessionState,
    pub version: u64,
    pub days: Vec<DaySummary>,
}

impl PlanSummary {
    pub fn from_context(context: &PlanContext) -> Self {
        Self {
            trip_id: context.trip_id.clone(),
            destination: context.destination.clone(),
            start_date: context.start_date,
            end_date: context.end_date,
            state: context.state,
            version: context.version,
            days: context
                .days
                .iter()
                .map(|day| DaySummary {
                    index: day.index,
                    date: day.date,
                    status: day.status,
                    degraded: day.degraded,
                    activity_count: day.activities.len(),
                    score: day.critique.as_ref().map(|c| c.score),
                })
                .collect(),
        }
    }
}
