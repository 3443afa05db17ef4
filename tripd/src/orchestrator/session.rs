//! TripSession - per-trip actor
//!
//! Owns the PlanContext exclusively and applies commands in arrival order,
//! which is the whole concurrency story for one trip: no locks, no shared
//! mutation. Planning runs proactively; the actor only sits on the command
//! channel while at the confirmation gate or monitoring.

use chrono::Utc;
use planstore::Store;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use super::handle::SessionHandle;
use super::messages::{PlanSummary, SessionCommand, SessionError};
use crate::domain::{CritiqueIssue, DayStatus, DisruptionEvent, PlanContext, SessionState};
use crate::replan::{ReplanEngine, ReplanReport};
use crate::revision::{FailurePolicy, ReviseEngine, ReviseError, RevisionConfig};
use crate::stage::StageSet;

/// Command channel depth per session
const COMMAND_BUFFER: usize = 32;

/// Per-trip orchestration actor
pub struct TripSession {
    context: PlanContext,
    store: Store,
    revise: ReviseEngine,
    replan: ReplanEngine,
    rx: mpsc::Receiver<SessionCommand>,
    cancel_rx: watch::Receiver<bool>,
    summary_tx: watch::Sender<PlanSummary>,
    /// User feedback queued for the next revise run
    pending_feedback: Vec<CritiqueIssue>,
}

impl TripSession {
    /// Spawn the actor for a context and return its handle
    ///
    /// The context must already be persisted; the session saves on every
    /// committed mutation from here on.
    pub fn spawn(context: PlanContext, store: Store, stages: StageSet, config: RevisionConfig) -> SessionHandle {
        let trip_id = context.trip_id.clone();
        info!(%trip_id, state = %context.state, "spawn: starting session");

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (summary_tx, summary_rx) = watch::channel(PlanSummary::from_context(&context));

        let session = Self {
            context,
            store,
            revise: ReviseEngine::new(stages.clone(), config.clone()),
            replan: ReplanEngine::new(ReviseEngine::new(stages, config)),
            rx,
            cancel_rx,
            summary_tx,
            pending_feedback: Vec::new(),
        };
        tokio::spawn(session.run());

        SessionHandle::new(trip_id, tx, cancel_tx, summary_rx)
    }

    async fn run(mut self) {
        loop {
            if let SessionState::Planning(day_index) = self.context.state {
                self.plan_day(day_index).await;
                continue;
            }

            self.maybe_complete();
            self.publish();

            let not_terminal = !self.context.state.is_terminal();
            let mut cancel = self.cancel_rx.clone();
            tokio::select! {
                biased;
                _ = async { let _ = cancel.wait_for(|&flag| flag).await; }, if not_terminal => {
                    self.finish_cancel();
                }
                command = self.rx.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        debug!(trip_id = %self.context.trip_id, "run: all handles dropped");
                        break;
                    }
                },
            }
        }
        info!(trip_id = %self.context.trip_id, state = %self.context.state, "run: session ended");
    }

    /// Returns true when the session should shut down
    async fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::ConfirmDay {
                day_index,
                expected_version,
                reply_tx,
            } => {
                let result = self.confirm_day(day_index, expected_version);
                let _ = reply_tx.send(result);
                false
            }
            SessionCommand::RequestChanges {
                day_index,
                feedback,
                reply_tx,
            } => {
                let result = self.request_changes(day_index, feedback);
                let _ = reply_tx.send(result);
                false
            }
            SessionCommand::ReportDisruption { event, reply_tx } => {
                let result = self.report_disruption(event).await;
                let _ = reply_tx.send(result);
                false
            }
            SessionCommand::GetStatus { reply_tx } => {
                self.maybe_complete();
                let _ = reply_tx.send(PlanSummary::from_context(&self.context));
                false
            }
            SessionCommand::Close { reply_tx } => {
                let result = self.close();
                let _ = reply_tx.send(result);
                true
            }
        }
    }

    /// Drive the revise loop for one day, then move to the gate
    async fn plan_day(&mut self, day_index: usize) {
        debug!(trip_id = %self.context.trip_id, day = %day_index, "plan_day: called");
        let seed = std::mem::take(&mut self.pending_feedback);

        let result = self
            .revise
            .revise_day(
                &mut self.context,
                day_index,
                seed,
                Vec::new(),
                FailurePolicy::DegradedCommit,
                &mut self.cancel_rx,
            )
            .await;

        match result {
            Ok(outcome) => {
                debug!(day = %day_index, status = %outcome.status, "plan_day: loop finished");
                // NeedsManualReview also parks at the gate: the session
                // stays responsive and the summary carries the flag
                self.context.set_state(SessionState::Confirming(day_index));
                let _ = self.save();
            }
            Err(ReviseError::Cancelled) => self.finish_cancel(),
            Err(ReviseError::Domain(e)) => {
                error!(day = %day_index, error = %e, "plan_day: domain error");
                self.context.set_state(SessionState::Confirming(day_index));
                let _ = self.save();
            }
        }
        self.publish();
    }

    fn confirm_day(&mut self, day_index: usize, expected_version: u64) -> Result<PlanSummary, SessionError> {
        debug!(trip_id = %self.context.trip_id, day = %day_index, expected_version, "confirm_day: called");
        if self.context.state.is_terminal() {
            return Err(SessionError::InvalidRequest(format!(
                "session is {}",
                self.context.state
            )));
        }

        let day = self
            .context
            .day(day_index)
            .ok_or_else(|| SessionError::InvalidRequest(format!("day {} has no plan yet", day_index)))?;

        // Idempotent repeat of an already-applied confirm
        if day.status == DayStatus::Confirmed && day.confirmed_with_version == Some(expected_version) {
            debug!(day = %day_index, "confirm_day: idempotent repeat");
            return Ok(PlanSummary::from_context(&self.context));
        }

        if day.status != DayStatus::PendingConfirmation {
            return Err(SessionError::InvalidRequest(format!(
                "day {} is {}, not pending confirmation",
                day_index, day.status
            )));
        }

        if expected_version != self.context.version {
            return Err(SessionError::VersionConflict {
                expected: expected_version,
                actual: self.context.version,
            });
        }

        let day = self
            .context
            .day_mut(day_index)
            .ok_or_else(|| SessionError::InvalidRequest(format!("day {} has no plan yet", day_index)))?;
        day.transition(DayStatus::Confirmed)?;
        day.confirmed_with_version = Some(expected_version);

        let next = self.next_state();
        info!(
            trip_id = %self.context.trip_id,
            day = %day_index,
            next = %next,
            "confirm_day: confirmed"
        );
        self.context.set_state(next);
        self.context.bump_version();
        self.save()?;
        self.publish();
        Ok(PlanSummary::from_context(&self.context))
    }

    fn request_changes(&mut self, day_index: usize, feedback: String) -> Result<PlanSummary, SessionError> {
        debug!(trip_id = %self.context.trip_id, day = %day_index, "request_changes: called");
        if self.context.state.is_terminal() {
            return Err(SessionError::InvalidRequest(format!(
                "session is {}",
                self.context.state
            )));
        }

        let day = self
            .context
            .day_mut(day_index)
            .ok_or_else(|| SessionError::InvalidRequest(format!("day {} has no plan yet", day_index)))?;

        if day.status != DayStatus::PendingConfirmation {
            return Err(SessionError::InvalidRequest(format!(
                "day {} is {}, not pending confirmation",
                day_index, day.status
            )));
        }

        day.transition(DayStatus::Revising)?;
        self.pending_feedback = vec![CritiqueIssue::user_requested(feedback)];
        self.context.set_state(SessionState::Planning(day_index));
        self.context.bump_version();
        self.save()?;
        self.publish();
        Ok(PlanSummary::from_context(&self.context))
    }

    async fn report_disruption(&mut self, event: DisruptionEvent) -> Result<ReplanReport, SessionError> {
        debug!(trip_id = %self.context.trip_id, kind = %event.kind, "report_disruption: called");
        if !matches!(
            self.context.state,
            SessionState::Monitoring | SessionState::Confirming(_)
        ) {
            return Err(SessionError::InvalidRequest(format!(
                "disruptions are only accepted while monitoring or confirming, session is {}",
                self.context.state
            )));
        }

        let resume_state = self.context.state;
        self.context.set_state(SessionState::Replanning);
        self.publish();

        let result = self.replan.replan(&mut self.context, &event, &mut self.cancel_rx).await;

        let report = match result {
            Ok(report) => report,
            Err(ReviseError::Cancelled) => {
                self.finish_cancel();
                return Err(SessionError::Cancelled);
            }
            Err(ReviseError::Domain(e)) => {
                self.context.set_state(resume_state);
                return Err(SessionError::Domain(e));
            }
        };

        if report.affected.is_empty() {
            // Nothing changed; no commit, no save
            self.context.set_state(resume_state);
            self.publish();
            return Ok(report);
        }

        let next = self.next_state();
        info!(
            trip_id = %self.context.trip_id,
            affected = ?report.affected,
            manual_review = %report.any_manual_review(),
            next = %next,
            "report_disruption: replanning complete"
        );
        self.context.set_state(next);
        self.save()?;
        self.publish();
        Ok(report)
    }

    fn close(&mut self) -> Result<(), SessionError> {
        info!(trip_id = %self.context.trip_id, "close: archiving session");
        self.store.archive::<PlanContext>(&self.context.trip_id)?;
        Ok(())
    }

    /// Where the session goes after a committed day change
    ///
    /// Pending days gate first, unbuilt days plan next; days stuck in
    /// NeedsManualReview never re-enter planning on their own.
    fn next_state(&self) -> SessionState {
        if self.context.all_days_confirmed() {
            return SessionState::Monitoring;
        }

        if let Some(day) = self
            .context
            .days
            .iter()
            .find(|d| d.status == DayStatus::PendingConfirmation)
        {
            return SessionState::Confirming(day.index);
        }

        for index in 0..self.context.duration_days() {
            match self.context.day(index).map(|d| d.status) {
                Some(DayStatus::Confirmed) | Some(DayStatus::NeedsManualReview) => continue,
                _ => return SessionState::Planning(index),
            }
        }

        SessionState::Monitoring
    }

    /// Lazily flip Monitoring to Completed once the trip is over
    fn maybe_complete(&mut self) {
        if self.context.state == SessionState::Monitoring && Utc::now().date_naive() > self.context.end_date {
            info!(trip_id = %self.context.trip_id, "maybe_complete: trip end date passed");
            self.context.set_state(SessionState::Completed);
            self.context.bump_version();
            let _ = self.save();
        }
    }

    fn finish_cancel(&mut self) {
        if self.context.state.is_terminal() {
            return;
        }
        info!(trip_id = %self.context.trip_id, "finish_cancel: cancelling session");
        self.context.set_state(SessionState::Cancelled);
        self.context.bump_version();
        let _ = self.save();
        self.publish();
    }

    /// Persist the context; a failure here is the one fatal condition
    fn save(&mut self) -> Result<(), SessionError> {
        if let Err(e) = self.store.put(&self.context) {
            error!(trip_id = %self.context.trip_id, error = %e, "save: persistence failure");
            self.context.set_state(SessionState::Failed);
            self.publish();
            return Err(SessionError::Store(e));
        }
        Ok(())
    }

    fn publish(&self) {
        self.summary_tx.send_replace(PlanSummary::from_context(&self.context));
    }
}

/// Send a command and await its oneshot reply
pub(super) async fn request<T>(
    tx: &mpsc::Sender<SessionCommand>,
    build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
) -> Result<T, SessionError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(build(reply_tx)).await.map_err(|_| SessionError::ChannelClosed)?;
    reply_rx.await.map_err(|_| {
        warn!("request: session dropped reply");
        SessionError::ChannelClosed
    })
}
