//! Replanning engine
//!
//! Invalidates the affected subset and re-runs the revise loop per day.
//! Budget exhaustion here marks the day NeedsManualReview; a degraded
//! candidate is never silently committed over an invalidated original.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::scope;
use crate::domain::{DayStatus, DisruptionEvent, PlanContext};
use crate::revision::{FailurePolicy, ReviseEngine, ReviseError};

/// Outcome for one affected day
#[derive(Debug, Clone, PartialEq)]
pub struct DayReplanOutcome {
    pub day_index: usize,
    /// Status before invalidation
    pub previous_status: DayStatus,
    /// Status after the loop ran
    pub status: DayStatus,
    pub degraded: bool,
    /// Set when the loop aborted with a non-cancellation error
    pub failed: bool,
}

/// Consolidated result of one disruption
#[derive(Debug, Clone, PartialEq)]
pub struct ReplanReport {
    /// Constraint injected into every regeneration
    pub constraint: String,
    /// Affected day indices, ascending
    pub affected: Vec<usize>,
    pub outcomes: Vec<DayReplanOutcome>,
}

impl ReplanReport {
    /// Check whether any day needs human attention
    pub fn any_manual_review(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| o.status == DayStatus::NeedsManualReview || o.failed)
    }
}

/// Disruption-driven selective replanner
pub struct ReplanEngine {
    revise: ReviseEngine,
}

impl ReplanEngine {
    pub fn new(revise: ReviseEngine) -> Self {
        Self { revise }
    }

    /// Process one disruption against the current plan
    ///
    /// Affected days are handled independently in ascending index order;
    /// one day's failure never blocks the rest. Unaffected days are not
    /// touched at all.
    pub async fn replan(
        &self,
        context: &mut PlanContext,
        event: &DisruptionEvent,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<ReplanReport, ReviseError> {
        let affected = scope::affected_days(context, event);
        let constraint = event.constraint();
        info!(
            trip_id = %context.trip_id,
            kind = %event.kind,
            affected = ?affected,
            %constraint,
            "replan: called"
        );

        let mut outcomes = Vec::with_capacity(affected.len());

        for &day_index in &affected {
            let day = match context.day_mut(day_index) {
                Some(day) => day,
                None => continue,
            };
            let previous_status = day.status;

            match previous_status {
                DayStatus::Confirmed => {
                    // Never mutated in place: invalidate, then draft fresh
                    day.transition(DayStatus::Invalidated)?;
                    day.confirmed_with_version = None;
                    context.bump_version();
                }
                DayStatus::PendingConfirmation => {
                    // Unconfirmed candidate is simply discarded
                    day.transition(DayStatus::Revising)?;
                    day.set_activities(Vec::new());
                    context.bump_version();
                }
                other => {
                    debug!(day = %day_index, status = %other, "replan: skipping day outside plan content");
                    continue;
                }
            }

            let result = self
                .revise
                .revise_day(
                    context,
                    day_index,
                    Vec::new(),
                    vec![constraint.clone()],
                    FailurePolicy::ManualReview,
                    cancel,
                )
                .await;

            let outcome = match result {
                Ok(outcome) => DayReplanOutcome {
                    day_index,
                    previous_status,
                    status: outcome.status,
                    degraded: outcome.degraded,
                    failed: false,
                },
                Err(ReviseError::Cancelled) => return Err(ReviseError::Cancelled),
                Err(e) => {
                    warn!(day = %day_index, error = %e, "replan: day failed");
                    let status = context.day(day_index).map(|d| d.status).unwrap_or(previous_status);
                    DayReplanOutcome {
                        day_index,
                        previous_status,
                        status,
                        degraded: false,
                        failed: true,
                    }
                }
            };

            info!(
                trip_id = %context.trip_id,
                day = %day_index,
                from = %outcome.previous_status,
                to = %outcome.status,
                "replan: day processed"
            );
            outcomes.push(outcome);
        }

        Ok(ReplanReport {
            constraint,
            affected,
            outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ActivityCategory, ActivityItem, CritiqueIssue, CritiqueResult, Dimension, DisruptionKind, LocationRef,
        Preferences, Severity, TimeWindow,
    };
    use crate::revision::RevisionConfig;
    use crate::stage::mock::{ScriptedCritic, ScriptedPlanner};
    use crate::stage::{InvokerConfig, StageSet};
    use chrono::{NaiveDate, NaiveTime};
    use std::sync::Arc;
    use std::time::Duration;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn fast_invoker() -> InvokerConfig {
        InvokerConfig {
            call_timeout: Duration::from_millis(500),
            max_retries: 0,
            initial_backoff: Duration::from_millis(1),
            total_budget: Duration::from_secs(5),
            max_concurrent: 4,
        }
    }

    fn engine(planner: ScriptedPlanner, critic: ScriptedCritic) -> (ReplanEngine, Arc<ScriptedPlanner>) {
        let planner = Arc::new(planner);
        let stages = StageSet::new(planner.clone(), Arc::new(critic), fast_invoker());
        let revise = ReviseEngine::new(stages, RevisionConfig::default());
        (ReplanEngine::new(revise), planner)
    }

    fn cancel_rx() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        std::mem::forget(tx);
        rx
    }

    /// Three confirmed days; day 1 has a morning flight-sensitive start
    fn three_day_trip() -> PlanContext {
        let mut context = PlanContext::new("Rome", date(1), date(3), Preferences::default(), 30).unwrap();
        for i in 0..3 {
            let day = context.ensure_day(i).unwrap();
            day.set_activities(vec![
                ActivityItem::new("Morning visit", ActivityCategory::Sightseeing).with_window(t(9), t(11)),
                ActivityItem::new("Dinner", ActivityCategory::Dining).with_window(t(19), t(21)),
            ]);
            day.status = DayStatus::Confirmed;
        }
        context.version = 3;
        context
    }

    fn flight_delay_on_day(d: u32) -> DisruptionEvent {
        DisruptionEvent {
            kind: DisruptionKind::FlightDelay,
            severity: Severity::High,
            window: TimeWindow::between(date(d), t(8), t(13)),
            location: None,
            day_index: None,
            description: "inbound delayed".to_string(),
        }
    }

    #[tokio::test]
    async fn test_flight_delay_touches_only_the_overlapping_day() {
        let (engine, planner) = engine(ScriptedPlanner::always_ok(), ScriptedCritic::always_approve());
        let mut context = three_day_trip();
        let before_day0 = context.day(0).unwrap().clone();
        let before_day2 = context.day(2).unwrap().clone();
        let mut cancel = cancel_rx();

        let report = engine
            .replan(&mut context, &flight_delay_on_day(2), &mut cancel)
            .await
            .unwrap();

        assert_eq!(report.affected, vec![1]);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].previous_status, DayStatus::Confirmed);
        assert_eq!(report.outcomes[0].status, DayStatus::PendingConfirmation);
        assert!(!report.any_manual_review());

        // Unaffected days are byte-for-byte untouched
        assert_eq!(context.day(0).unwrap(), &before_day0);
        assert_eq!(context.day(2).unwrap(), &before_day2);

        // Every regeneration carried the explicit constraint
        for request in planner.requests() {
            assert_eq!(request.constraints.len(), 1);
            assert!(request.constraints[0].contains("shifted to 13:00"));
        }
    }

    #[tokio::test]
    async fn test_replan_failure_marks_manual_review_not_degraded() {
        let rejection = CritiqueResult::rejected(
            60.0,
            vec![CritiqueIssue::day_level(Dimension::Feasibility, Severity::High, "still clashes")],
        );
        let (engine, _planner) = engine(
            ScriptedPlanner::always_ok(),
            ScriptedCritic::new(vec![Ok(rejection.clone()), Ok(rejection.clone()), Ok(rejection)]),
        );
        let mut context = three_day_trip();
        let mut cancel = cancel_rx();

        let report = engine
            .replan(&mut context, &flight_delay_on_day(2), &mut cancel)
            .await
            .unwrap();

        assert!(report.any_manual_review());
        assert_eq!(context.day(1).unwrap().status, DayStatus::NeedsManualReview);
        assert!(!context.day(1).unwrap().degraded);
    }

    #[tokio::test]
    async fn test_one_day_failure_does_not_block_others() {
        // Day 0 exhausts its critique budget, day 2 approves first try
        let rejection = CritiqueResult::rejected(
            50.0,
            vec![CritiqueIssue::day_level(Dimension::Feasibility, Severity::High, "no")],
        );
        let (engine, _planner) = engine(
            ScriptedPlanner::always_ok(),
            ScriptedCritic::new(vec![
                Ok(rejection.clone()),
                Ok(rejection.clone()),
                Ok(rejection),
                Ok(CritiqueResult::approved(90.0)),
            ]),
        );

        let mut context = three_day_trip();
        // Tie both outer days to the same closed venue
        for i in [0usize, 2] {
            let day = context.day_mut(i).unwrap();
            let mut activities = day.activities.clone();
            activities[0] = activities[0]
                .clone()
                .with_location(LocationRef::named("City Aquarium"));
            day.activities = activities;
        }
        let mut cancel = cancel_rx();

        let event = DisruptionEvent {
            kind: DisruptionKind::Closure,
            severity: Severity::Medium,
            window: TimeWindow::whole_day(date(1)),
            location: Some(LocationRef::named("City Aquarium")),
            day_index: None,
            description: "maintenance".to_string(),
        };

        let report = engine.replan(&mut context, &event, &mut cancel).await.unwrap();

        assert_eq!(report.affected, vec![0, 2]);
        assert_eq!(context.day(0).unwrap().status, DayStatus::NeedsManualReview);
        assert_eq!(context.day(2).unwrap().status, DayStatus::PendingConfirmation);
    }

    #[tokio::test]
    async fn test_pending_confirmation_day_is_discarded_and_rebuilt() {
        let (engine, _planner) = engine(ScriptedPlanner::always_ok(), ScriptedCritic::always_approve());
        let mut context = three_day_trip();
        context.day_mut(1).unwrap().status = DayStatus::PendingConfirmation;
        let mut cancel = cancel_rx();

        let report = engine
            .replan(&mut context, &flight_delay_on_day(2), &mut cancel)
            .await
            .unwrap();

        assert_eq!(report.outcomes[0].previous_status, DayStatus::PendingConfirmation);
        assert_eq!(context.day(1).unwrap().status, DayStatus::PendingConfirmation);
        // Rebuilt from scratch, not patched: fresh activities replaced the plan
        assert_eq!(context.day(1).unwrap().activities.len(), 2);
    }

    #[tokio::test]
    async fn test_version_strictly_increases_per_committed_mutation() {
        let (engine, _planner) = engine(ScriptedPlanner::always_ok(), ScriptedCritic::always_approve());
        let mut context = three_day_trip();
        let before = context.version;
        let mut cancel = cancel_rx();

        engine
            .replan(&mut context, &flight_delay_on_day(2), &mut cancel)
            .await
            .unwrap();

        // Invalidation commit + loop commit
        assert_eq!(context.version, before + 2);
    }
}
