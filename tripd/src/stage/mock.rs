//! Scripted stage implementations for tests
//!
//! Each mock plays back a queue of scripted responses, falls back to a
//! default once the queue drains, and records every request it saw so tests
//! can assert on feedback and constraint propagation.

use std::sync::Mutex;
use std::collections::VecDeque;

use async_trait::async_trait;

use chrono::NaiveTime;

use super::{CriticStage, GenerationRequest, IntentStage, PlannerStage, StageError};
use crate::domain::{ActivityCategory, ActivityItem, CritiqueResult, DayPlan, PlanContext, Preferences};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

/// A reasonable two-activity day used as the scripted-queue fallback
pub fn default_day_activities() -> Vec<ActivityItem> {
    vec![
        ActivityItem::new("Old town walking tour", ActivityCategory::Sightseeing).with_window(t(9, 0), t(11, 0)),
        ActivityItem::new("Market lunch", ActivityCategory::Dining).with_window(t(12, 0), t(13, 30)),
    ]
}

/// Scripted planner stage
pub struct ScriptedPlanner {
    responses: Mutex<VecDeque<Result<Vec<ActivityItem>, StageError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedPlanner {
    /// Create a planner that plays back `responses` in order, then falls
    /// back to [`default_day_activities`]
    pub fn new(responses: Vec<Result<Vec<ActivityItem>, StageError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A planner that always returns the default day
    pub fn always_ok() -> Self {
        Self::new(Vec::new())
    }

    /// Number of generation calls made so far
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlannerStage for ScriptedPlanner {
    async fn generate_day(
        &self,
        _context: &PlanContext,
        request: &GenerationRequest,
    ) -> Result<Vec<ActivityItem>, StageError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(default_day_activities()),
        }
    }
}

/// Scripted critic stage
pub struct ScriptedCritic {
    responses: Mutex<VecDeque<Result<CritiqueResult, StageError>>>,
    calls: Mutex<usize>,
}

impl ScriptedCritic {
    /// Create a critic that plays back `responses` in order, then falls
    /// back to approval
    pub fn new(responses: Vec<Result<CritiqueResult, StageError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(0),
        }
    }

    /// A critic that approves everything
    pub fn always_approve() -> Self {
        Self::new(Vec::new())
    }

    /// Number of critique calls made so far
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl CriticStage for ScriptedCritic {
    async fn critique_day(&self, _context: &PlanContext, _day: &DayPlan) -> Result<CritiqueResult, StageError> {
        *self.calls.lock().unwrap() += 1;
        match self.responses.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(CritiqueResult::approved(90.0)),
        }
    }
}

/// Intent stage that returns a fixed preference set
pub struct FixedIntent {
    preferences: Preferences,
}

impl FixedIntent {
    pub fn new(preferences: Preferences) -> Self {
        Self { preferences }
    }
}

#[async_trait]
impl IntentStage for FixedIntent {
    async fn extract_intent(&self, _raw_text: &str) -> Result<Preferences, StageError> {
        Ok(self.preferences.clone())
    }
}
