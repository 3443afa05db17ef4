//! SessionManager - registry of running trip sessions
//!
//! Owns the store and the shared stage set. Sessions are spawned on demand
//! and resumed from persisted contexts; their invokers (and therefore the
//! per-collaborator concurrency bounds) are shared across all of them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use planstore::Store;
use tracing::{debug, info};

use super::handle::SessionHandle;
use super::messages::{PlanSummary, SessionError};
use super::session::TripSession;
use crate::domain::{PlanContext, Preferences, SessionState};
use crate::revision::RevisionConfig;
use crate::stage::{IntentStage, StageSet};

/// Inputs to session creation
#[derive(Debug, Clone)]
pub struct StartSessionRequest {
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub preferences: Preferences,
}

/// Registry of running sessions over one store
pub struct SessionManager {
    store: Store,
    stages: StageSet,
    intent: Arc<dyn IntentStage>,
    revision: RevisionConfig,
    max_trip_days: usize,
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(
        store: Store,
        stages: StageSet,
        intent: Arc<dyn IntentStage>,
        revision: RevisionConfig,
        max_trip_days: usize,
    ) -> Self {
        Self {
            store,
            stages,
            intent,
            revision,
            max_trip_days,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Create, persist, and start a new session
    ///
    /// The context lands at version 0 in `Planning(0)`; generation for day
    /// 0 begins immediately.
    pub fn start_session(&self, request: StartSessionRequest) -> Result<SessionHandle, SessionError> {
        debug!(destination = %request.destination, "start_session: called");
        let mut context = PlanContext::new(
            request.destination,
            request.start_date,
            request.end_date,
            request.preferences,
            self.max_trip_days,
        )
        .map_err(|e| SessionError::InvalidRequest(e.to_string()))?;
        context.set_state(SessionState::Planning(0));

        self.store.put(&context)?;
        info!(trip_id = %context.trip_id, "start_session: created");
        Ok(self.register(context))
    }

    /// Create a session from free-form preference text
    ///
    /// Runs intent extraction first; the resulting snapshot is immutable
    /// for the life of the trip.
    pub async fn start_session_from_text(
        &self,
        destination: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        raw_text: &str,
    ) -> Result<SessionHandle, SessionError> {
        let preferences = self.intent.extract_intent(raw_text).await?;
        self.start_session(StartSessionRequest {
            destination: destination.into(),
            start_date,
            end_date,
            preferences,
        })
    }

    /// Resume a persisted session
    pub fn resume(&self, trip_id: &str) -> Result<SessionHandle, SessionError> {
        if let Some(handle) = self.get(trip_id) {
            return Ok(handle);
        }
        let context: PlanContext = self
            .store
            .get(trip_id)?
            .ok_or_else(|| SessionError::NotFound(trip_id.to_string()))?;
        info!(trip_id = %context.trip_id, state = %context.state, "resume: restarting session");
        Ok(self.register(context))
    }

    /// Handle for a running session, if any
    pub fn get(&self, trip_id: &str) -> Option<SessionHandle> {
        self.sessions
            .lock()
            .ok()
            .and_then(|sessions| sessions.get(trip_id).cloned())
    }

    /// Summaries of every persisted trip, running or not
    pub fn list(&self) -> Result<Vec<PlanSummary>, SessionError> {
        let contexts: Vec<PlanContext> = self.store.list()?;
        Ok(contexts.iter().map(PlanSummary::from_context).collect())
    }

    /// Drop a session from the registry (the actor exits when its handles go)
    pub fn forget(&self, trip_id: &str) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(trip_id);
        }
    }

    fn register(&self, context: PlanContext) -> SessionHandle {
        let handle = TripSession::spawn(context, self.store.clone(), self.stages.clone(), self.revision.clone());
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(handle.trip_id().to_string(), handle.clone());
        }
        handle
    }
}
