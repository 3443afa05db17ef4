//! Stage contracts for planning collaborators
//!
//! Every collaborator (generation, critique, intent extraction) is invoked
//! through a fixed trait contract; new collaborators are added as new
//! implementations, never as new branches of conditional logic. Calls go
//! through the [`StageInvoker`] for timeout, retry, and concurrency
//! bounding.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod error;
mod http;
mod invoker;
pub mod mock;

pub use error::StageError;
pub use http::HttpStageClient;
pub use invoker::{InvokerConfig, StageInvoker};

use crate::domain::{ActivityItem, CritiqueIssue, CritiqueResult, DayPlan, PlanContext, Preferences};

/// Input to one generation call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Day to generate or revise
    pub day_index: usize,

    /// Critique issues (and seeded user feedback) to address
    #[serde(default)]
    pub feedback: Vec<CritiqueIssue>,

    /// Explicit constraints injected by the replanning engine
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl GenerationRequest {
    /// A fresh request with no feedback
    pub fn fresh(day_index: usize) -> Self {
        Self {
            day_index,
            feedback: Vec::new(),
            constraints: Vec::new(),
        }
    }
}

/// Itinerary generation collaborator
///
/// Returns the candidate activity sequence for one day; the revise loop
/// owns wrapping it into a DayPlan and all lifecycle bookkeeping.
#[async_trait]
pub trait PlannerStage: Send + Sync {
    async fn generate_day(
        &self,
        context: &PlanContext,
        request: &GenerationRequest,
    ) -> Result<Vec<ActivityItem>, StageError>;
}

/// Critique collaborator
///
/// Scores a candidate day against the rubric dimensions. Never edits the
/// candidate.
#[async_trait]
pub trait CriticStage: Send + Sync {
    async fn critique_day(&self, context: &PlanContext, day: &DayPlan) -> Result<CritiqueResult, StageError>;
}

/// Intent extraction collaborator, used only at session start
#[async_trait]
pub trait IntentStage: Send + Sync {
    async fn extract_intent(&self, raw_text: &str) -> Result<Preferences, StageError>;
}

/// The planner/critic pair with their invokers
///
/// Invokers are per collaborator, so their concurrency bounds are shared
/// across every session using this set.
#[derive(Clone)]
pub struct StageSet {
    pub planner: Arc<dyn PlannerStage>,
    pub critic: Arc<dyn CriticStage>,
    pub planner_invoker: Arc<StageInvoker>,
    pub critic_invoker: Arc<StageInvoker>,
}

impl StageSet {
    /// Bundle a planner and critic behind invokers built from one config
    pub fn new(planner: Arc<dyn PlannerStage>, critic: Arc<dyn CriticStage>, config: InvokerConfig) -> Self {
        Self {
            planner,
            critic,
            planner_invoker: Arc::new(StageInvoker::new("planner", config.clone())),
            critic_invoker: Arc::new(StageInvoker::new("critic", config)),
        }
    }
}
