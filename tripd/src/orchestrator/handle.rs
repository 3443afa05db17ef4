//! SessionHandle - caller interface to one trip session
//!
//! Cloneable; every clone talks to the same actor. Reads come cheap from a
//! watch channel, mutations round-trip through the command queue.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::messages::{PlanSummary, SessionCommand, SessionError};
use super::session::request;
use crate::domain::DisruptionEvent;
use crate::replan::ReplanReport;

/// Handle to a running trip session
#[derive(Clone)]
pub struct SessionHandle {
    trip_id: String,
    tx: mpsc::Sender<SessionCommand>,
    cancel_tx: Arc<watch::Sender<bool>>,
    summary_rx: watch::Receiver<PlanSummary>,
}

impl SessionHandle {
    pub(crate) fn new(
        trip_id: String,
        tx: mpsc::Sender<SessionCommand>,
        cancel_tx: watch::Sender<bool>,
        summary_rx: watch::Receiver<PlanSummary>,
    ) -> Self {
        Self {
            trip_id,
            tx,
            cancel_tx: Arc::new(cancel_tx),
            summary_rx,
        }
    }

    /// This session's trip id
    pub fn trip_id(&self) -> &str {
        &self.trip_id
    }

    /// Confirm a pending day against the version the caller last saw
    pub async fn confirm_day(&self, day_index: usize, expected_version: u64) -> Result<PlanSummary, SessionError> {
        debug!(trip_id = %self.trip_id, day = %day_index, expected_version, "confirm_day: called");
        request(&self.tx, |reply_tx| SessionCommand::ConfirmDay {
            day_index,
            expected_version,
            reply_tx,
        })
        .await?
    }

    /// Reject a pending day with feedback; the day re-enters the loop
    pub async fn request_changes(
        &self,
        day_index: usize,
        feedback: impl Into<String>,
    ) -> Result<PlanSummary, SessionError> {
        debug!(trip_id = %self.trip_id, day = %day_index, "request_changes: called");
        request(&self.tx, |reply_tx| SessionCommand::RequestChanges {
            day_index,
            feedback: feedback.into(),
            reply_tx,
        })
        .await?
    }

    /// Report a disruption for selective replanning
    pub async fn report_disruption(&self, event: DisruptionEvent) -> Result<ReplanReport, SessionError> {
        debug!(trip_id = %self.trip_id, kind = %event.kind, "report_disruption: called");
        request(&self.tx, |reply_tx| SessionCommand::ReportDisruption { event, reply_tx }).await?
    }

    /// Fetch a summary through the command queue
    ///
    /// Queues behind in-flight mutations, so the answer reflects every
    /// command sent before it.
    pub async fn status(&self) -> Result<PlanSummary, SessionError> {
        request(&self.tx, |reply_tx| SessionCommand::GetStatus { reply_tx }).await
    }

    /// Last published summary, without touching the actor
    ///
    /// May lag the command queue; prefer [`status`](Self::status) after a
    /// mutation.
    pub fn summary(&self) -> PlanSummary {
        self.summary_rx.borrow().clone()
    }

    /// Cancel the session
    ///
    /// Aborts the in-flight stage call at the next boundary and discards
    /// uncommitted candidates. Confirmed days stay persisted.
    pub fn cancel(&self) {
        debug!(trip_id = %self.trip_id, "cancel: called");
        let _ = self.cancel_tx.send(true);
    }

    /// Archive the context and shut the session down
    pub async fn close(&self) -> Result<(), SessionError> {
        debug!(trip_id = %self.trip_id, "close: called");
        request(&self.tx, |reply_tx| SessionCommand::Close { reply_tx }).await?
    }
}
