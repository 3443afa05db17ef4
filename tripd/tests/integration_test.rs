//! Integration tests for TripDaemon
//!
//! These tests drive whole sessions end to end through the SessionManager
//! with scripted stages and a temp-dir store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use planstore::Store;
use tempfile::TempDir;

use tripdaemon::domain::{
    ActivityCategory, ActivityItem, CritiqueIssue, CritiqueResult, DayStatus, Dimension, DisruptionEvent,
    DisruptionKind, LocationRef, PlanContext, Preferences, SessionState, Severity, TimeWindow,
};
use tripdaemon::orchestrator::{PlanSummary, SessionError, SessionHandle, SessionManager, StartSessionRequest};
use tripdaemon::stage::mock::{FixedIntent, ScriptedCritic, ScriptedPlanner};
use tripdaemon::stage::{GenerationRequest, InvokerConfig, PlannerStage, StageError, StageSet};
use tripdaemon::revision::RevisionConfig;

// Far enough out that Monitoring never lazily flips to Completed mid-test
fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 6, d).unwrap()
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

fn manager(temp: &TempDir, planner: Arc<ScriptedPlanner>, critic: Arc<ScriptedCritic>) -> SessionManager {
    let store = Store::open(temp.path()).expect("Failed to open store");
    let stages = StageSet::new(planner, critic, fast_invoker());
    SessionManager::new(
        store,
        stages,
        Arc::new(FixedIntent::new(Preferences::default())),
        RevisionConfig::default(),
        30,
    )
}

fn three_day_request() -> StartSessionRequest {
    StartSessionRequest {
        destination: "Kyoto".to_string(),
        start_date: date(1),
        end_date: date(3),
        preferences: Preferences::default(),
    }
}

/// Poll status until the predicate holds
async fn wait_for(handle: &SessionHandle, pred: impl Fn(&PlanSummary) -> bool) -> PlanSummary {
    for _ in 0..500 {
        let summary = handle.status().await.expect("status request failed");
        if pred(&summary) {
            return summary;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never reached");
}

/// Confirm days 0..n in order, driving the session to Monitoring
async fn confirm_all(handle: &SessionHandle, n: usize) -> PlanSummary {
    let mut summary = wait_for(handle, |s| matches!(s.state, SessionState::Confirming(0))).await;
    for day in 0..n {
        summary = handle.confirm_day(day, summary.version).await.expect("confirm failed");
        if day + 1 < n {
            summary = wait_for(handle, |s| matches!(s.state, SessionState::Confirming(d) if d == day + 1)).await;
        }
    }
    summary
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_full_session_to_monitoring() {
    let temp = TempDir::new().unwrap();
    let planner = Arc::new(ScriptedPlanner::always_ok());
    let manager = manager(&temp, planner.clone(), Arc::new(ScriptedCritic::always_approve()));

    let handle = manager.start_session(three_day_request()).unwrap();
    let summary = confirm_all(&handle, 3).await;

    assert_eq!(summary.state, SessionState::Monitoring);
    assert_eq!(summary.days.len(), 3);
    assert!(summary.days.iter().all(|d| d.status == DayStatus::Confirmed));
    assert!(summary.days.iter().all(|d| !d.degraded));

    // Day N generation never started before day N-1 was confirmed: one
    // generation per day, sequential
    assert_eq!(planner.call_count(), 3);
    let indices: Vec<usize> = planner.requests().iter().map(|r| r.day_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_past_trip_completes_lazily() {
    let temp = TempDir::new().unwrap();
    let manager = manager(
        &temp,
        Arc::new(ScriptedPlanner::always_ok()),
        Arc::new(ScriptedCritic::always_approve()),
    );

    let past = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let handle = manager
        .start_session(StartSessionRequest {
            destination: "Porto".to_string(),
            start_date: past,
            end_date: past,
            preferences: Preferences::default(),
        })
        .unwrap();

    let summary = wait_for(&handle, |s| matches!(s.state, SessionState::Confirming(0))).await;
    let summary = handle.confirm_day(0, summary.version).await.unwrap();
    assert_eq!(summary.state, SessionState::Monitoring);

    // The end date has passed; the next observation completes the trip
    let summary = wait_for(&handle, |s| s.state == SessionState::Completed).await;
    assert!(summary.days.iter().all(|d| d.status == DayStatus::Confirmed));
}

#[tokio::test]
async fn test_invalid_date_range_fails_fast() {
    let temp = TempDir::new().unwrap();
    let manager = manager(
        &temp,
        Arc::new(ScriptedPlanner::always_ok()),
        Arc::new(ScriptedCritic::always_approve()),
    );

    let result = manager.start_session(StartSessionRequest {
        destination: "Kyoto".to_string(),
        start_date: date(3),
        end_date: date(1),
        preferences: Preferences::default(),
    });
    assert!(matches!(result, Err(SessionError::InvalidRequest(_))));

    // Nothing was persisted
    let store = Store::open(temp.path()).unwrap();
    assert!(store.list_ids::<PlanContext>().unwrap().is_empty());
}

#[tokio::test]
async fn test_session_persists_across_resume() {
    let temp = TempDir::new().unwrap();
    let manager = manager(
        &temp,
        Arc::new(ScriptedPlanner::always_ok()),
        Arc::new(ScriptedCritic::always_approve()),
    );

    let handle = manager.start_session(three_day_request()).unwrap();
    let summary = wait_for(&handle, |s| matches!(s.state, SessionState::Confirming(0))).await;
    handle.confirm_day(0, summary.version).await.unwrap();
    wait_for(&handle, |s| matches!(s.state, SessionState::Confirming(1))).await;

    let trip_id = handle.trip_id().to_string();
    manager.forget(&trip_id);
    drop(handle);

    // Reload from disk
    let resumed = manager.resume(&trip_id).unwrap();
    let summary = wait_for(&resumed, |s| matches!(s.state, SessionState::Confirming(1))).await;
    assert_eq!(summary.days[0].status, DayStatus::Confirmed);
}

// =============================================================================
// Confirmation gate
// =============================================================================

#[tokio::test]
async fn test_stale_version_confirm_fails_without_mutation() {
    let temp = TempDir::new().unwrap();
    let manager = manager(
        &temp,
        Arc::new(ScriptedPlanner::always_ok()),
        Arc::new(ScriptedCritic::always_approve()),
    );

    let handle = manager.start_session(three_day_request()).unwrap();
    let summary = wait_for(&handle, |s| matches!(s.state, SessionState::Confirming(0))).await;

    // Caller saw version 5 but the context moved on (or vice versa)
    let stale = summary.version + 1;
    let result = handle.confirm_day(0, stale).await;
    match result {
        Err(SessionError::VersionConflict { expected, actual }) => {
            assert_eq!(expected, stale);
            assert_eq!(actual, summary.version);
        }
        other => panic!("expected version conflict, got {:?}", other.map(|s| s.state)),
    }

    // No mutation happened
    let after = handle.status().await.unwrap();
    assert_eq!(after.version, summary.version);
    assert_eq!(after.days[0].status, DayStatus::PendingConfirmation);

    // The correct version still works
    handle.confirm_day(0, summary.version).await.unwrap();
}

#[tokio::test]
async fn test_double_confirm_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let manager = manager(
        &temp,
        Arc::new(ScriptedPlanner::always_ok()),
        Arc::new(ScriptedCritic::always_approve()),
    );

    let handle = manager.start_session(three_day_request()).unwrap();
    let summary = wait_for(&handle, |s| matches!(s.state, SessionState::Confirming(0))).await;

    let first = handle.confirm_day(0, summary.version).await.unwrap();
    assert_eq!(first.days[0].status, DayStatus::Confirmed);

    // Retrying with the same expectedVersion reports the prior success
    let repeat = handle.confirm_day(0, summary.version).await.unwrap();
    assert_eq!(repeat.days[0].status, DayStatus::Confirmed);

    // A different expectedVersion on a confirmed day is not a retry
    let result = handle.confirm_day(0, summary.version + 7).await;
    assert!(matches!(result, Err(SessionError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_request_changes_outside_pending_is_invalid() {
    let temp = TempDir::new().unwrap();
    let manager = manager(
        &temp,
        Arc::new(ScriptedPlanner::always_ok()),
        Arc::new(ScriptedCritic::always_approve()),
    );

    let handle = manager.start_session(three_day_request()).unwrap();
    let summary = wait_for(&handle, |s| matches!(s.state, SessionState::Confirming(0))).await;
    handle.confirm_day(0, summary.version).await.unwrap();

    // Day 0 is now Confirmed; changes must go through a disruption instead
    let result = handle.request_changes(0, "more food").await;
    assert!(matches!(result, Err(SessionError::InvalidRequest(_))));

    // Day 2 has no plan yet
    let result = handle.request_changes(2, "more food").await;
    assert!(matches!(result, Err(SessionError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_request_changes_seeds_user_feedback() {
    let temp = TempDir::new().unwrap();
    let planner = Arc::new(ScriptedPlanner::always_ok());
    let manager = manager(&temp, planner.clone(), Arc::new(ScriptedCritic::always_approve()));

    let handle = manager.start_session(three_day_request()).unwrap();
    wait_for(&handle, |s| matches!(s.state, SessionState::Confirming(0))).await;

    handle.request_changes(0, "swap the museum for a food market").await.unwrap();
    wait_for(&handle, |s| matches!(s.state, SessionState::Confirming(0)) && s.days[0].status == DayStatus::PendingConfirmation).await;

    let requests = planner.requests();
    assert_eq!(requests.len(), 2);
    let reseed = &requests[1];
    assert_eq!(reseed.day_index, 0);
    assert!(
        reseed
            .feedback
            .iter()
            .any(|i| i.dimension == Dimension::UserRequested && i.detail.contains("food market"))
    );
}

// =============================================================================
// Degraded commits
// =============================================================================

#[tokio::test]
async fn test_budget_exhaustion_surfaces_degraded_flag() {
    let temp = TempDir::new().unwrap();
    let rejection = CritiqueResult::rejected(
        45.0,
        vec![CritiqueIssue::day_level(Dimension::Feasibility, Severity::Medium, "rushed")],
    );
    let planner = Arc::new(ScriptedPlanner::always_ok());
    let critic = Arc::new(ScriptedCritic::new(vec![
        Ok(rejection.clone()),
        Ok(rejection.clone()),
        Ok(rejection),
    ]));
    let manager = manager(&temp, planner.clone(), critic);

    let handle = manager.start_session(three_day_request()).unwrap();
    let summary = wait_for(&handle, |s| matches!(s.state, SessionState::Confirming(0))).await;

    // Loop terminated within maxRevisions + 1 generation calls
    assert!(planner.call_count() <= 4);
    assert_eq!(summary.days[0].status, DayStatus::PendingConfirmation);
    assert!(summary.days[0].degraded);

    // A degraded day still gates normally
    let after = handle.confirm_day(0, summary.version).await.unwrap();
    assert_eq!(after.days[0].status, DayStatus::Confirmed);
}

// =============================================================================
// Disruptions
// =============================================================================

#[tokio::test]
async fn test_flight_delay_blast_radius() {
    let temp = TempDir::new().unwrap();
    let planner = Arc::new(ScriptedPlanner::always_ok());
    let manager = manager(&temp, planner.clone(), Arc::new(ScriptedCritic::always_approve()));

    let handle = manager.start_session(three_day_request()).unwrap();
    let summary = confirm_all(&handle, 3).await;
    assert_eq!(summary.state, SessionState::Monitoring);
    let day0_before = summary.days[0].clone();
    let day2_before = summary.days[2].clone();

    // Delay lands in day 1's morning (June 2nd)
    let report = handle
        .report_disruption(DisruptionEvent {
            kind: DisruptionKind::FlightDelay,
            severity: Severity::High,
            window: TimeWindow::between(date(2), t(7), t(12)),
            location: None,
            day_index: None,
            description: "connection missed, arriving midday".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(report.affected, vec![1]);
    assert!(!report.any_manual_review());

    // Replanned day gates again; the others were never touched
    let summary = wait_for(&handle, |s| matches!(s.state, SessionState::Confirming(1))).await;
    assert_eq!(summary.days[1].status, DayStatus::PendingConfirmation);
    assert_eq!(summary.days[0], day0_before);
    assert_eq!(summary.days[2], day2_before);

    // The regeneration carried the delay as an explicit constraint
    let last = planner.requests().pop().unwrap();
    assert!(last.constraints[0].contains("shifted to 12:00"));

    // Confirming the replanned day returns to monitoring
    let after = handle.confirm_day(1, summary.version).await.unwrap();
    assert_eq!(after.state, SessionState::Monitoring);
}

#[tokio::test]
async fn test_disruption_rejected_while_planning() {
    let temp = TempDir::new().unwrap();

    /// Planner that parks forever, keeping the session in Planning
    struct StalledPlanner;

    #[async_trait::async_trait]
    impl PlannerStage for StalledPlanner {
        async fn generate_day(
            &self,
            _context: &PlanContext,
            _request: &GenerationRequest,
        ) -> Result<Vec<ActivityItem>, StageError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(StageError::InvalidResponse("unreachable".to_string()))
        }
    }

    let store = Store::open(temp.path()).unwrap();
    let stages = StageSet::new(
        Arc::new(StalledPlanner),
        Arc::new(ScriptedCritic::always_approve()),
        InvokerConfig {
            call_timeout: Duration::from_secs(3600),
            ..fast_invoker()
        },
    );
    let manager = SessionManager::new(
        store,
        stages,
        Arc::new(FixedIntent::new(Preferences::default())),
        RevisionConfig::default(),
        30,
    );

    let handle = manager.start_session(three_day_request()).unwrap();

    // The actor is busy planning and never reaches the command queue, so
    // cancel first, then verify the disruption bounces off the terminal state
    handle.cancel();
    let summary = wait_for(&handle, |s| s.state == SessionState::Cancelled).await;
    assert_eq!(summary.state, SessionState::Cancelled);

    let result = handle
        .report_disruption(DisruptionEvent {
            kind: DisruptionKind::Closure,
            severity: Severity::Low,
            window: TimeWindow::whole_day(date(1)),
            location: None,
            day_index: None,
            description: "closed".to_string(),
        })
        .await;
    assert!(matches!(result, Err(SessionError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_cancel_preserves_confirmed_days() {
    let temp = TempDir::new().unwrap();
    let manager = manager(
        &temp,
        Arc::new(ScriptedPlanner::always_ok()),
        Arc::new(ScriptedCritic::always_approve()),
    );

    let handle = manager.start_session(three_day_request()).unwrap();
    let summary = wait_for(&handle, |s| matches!(s.state, SessionState::Confirming(0))).await;
    handle.confirm_day(0, summary.version).await.unwrap();
    wait_for(&handle, |s| matches!(s.state, SessionState::Confirming(1))).await;

    handle.cancel();
    wait_for(&handle, |s| s.state == SessionState::Cancelled).await;

    // Confirmed work survives on disk
    let store = Store::open(temp.path()).unwrap();
    let persisted: PlanContext = store.get(handle.trip_id()).unwrap().unwrap();
    assert_eq!(persisted.state, SessionState::Cancelled);
    assert_eq!(persisted.days[0].status, DayStatus::Confirmed);
}

#[tokio::test]
async fn test_close_archives_the_context() {
    let temp = TempDir::new().unwrap();
    let manager = manager(
        &temp,
        Arc::new(ScriptedPlanner::always_ok()),
        Arc::new(ScriptedCritic::always_approve()),
    );

    let handle = manager.start_session(three_day_request()).unwrap();
    wait_for(&handle, |s| matches!(s.state, SessionState::Confirming(0))).await;

    handle.close().await.unwrap();

    let store = Store::open(temp.path()).unwrap();
    assert!(store.get::<PlanContext>(handle.trip_id()).unwrap().is_none());
    assert!(
        temp.path()
            .join("archive")
            .join("trips")
            .join(format!("{}.json", handle.trip_id()))
            .exists()
    );
}

// =============================================================================
// Replanning scope property
// =============================================================================

mod scope_property {
    use super::*;
    use proptest::prelude::*;
    use tripdaemon::replan::scope;

    fn arb_activity() -> impl Strategy<Value = ActivityItem> {
        (6u32..18, 1u32..4, proptest::option::of("[a-z]{4,8}")).prop_map(|(start, len, place)| {
            let mut item = ActivityItem::new("stop", ActivityCategory::Sightseeing)
                .with_window(t(start), t((start + len).min(23)));
            if let Some(place) = place {
                item = item.with_location(LocationRef::named(place));
            }
            item
        })
    }

    fn arb_trip() -> impl Strategy<Value = PlanContext> {
        (1usize..6)
            .prop_flat_map(|len| {
                proptest::collection::vec(proptest::collection::vec(arb_activity(), 1..4), len..=len)
            })
            .prop_map(|per_day| {
                let len = per_day.len();
                let mut context = PlanContext::new(
                    "Lisbon",
                    date(1),
                    date(1) + chrono::Days::new(len as u64 - 1),
                    Preferences::default(),
                    30,
                )
                .unwrap();
                for (i, activities) in per_day.into_iter().enumerate() {
                    let day = context.ensure_day(i).unwrap();
                    day.set_activities(activities);
                    day.status = DayStatus::Confirmed;
                }
                context
            })
    }

    fn arb_event() -> impl Strategy<Value = DisruptionEvent> {
        (1u32..7, 0u32..20, 1u32..6, proptest::option::of("[a-z]{4,8}")).prop_map(|(d, start, len, place)| {
            DisruptionEvent {
                kind: DisruptionKind::SevereWeather,
                severity: Severity::Medium,
                window: TimeWindow::between(date(d), t(start.min(22)), t((start + len).min(23))),
                location: place.map(LocationRef::named),
                day_index: None,
                description: "storm".to_string(),
            }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Days outside the affected set keep identical content and status
        #[test]
        fn unaffected_days_are_untouched(mut context in arb_trip(), event in arb_event()) {
            let affected = scope::affected_days(&context, &event);
            let before = context.days.clone();

            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            rt.block_on(async {
                let stages = StageSet::new(
                    Arc::new(ScriptedPlanner::always_ok()),
                    Arc::new(ScriptedCritic::always_approve()),
                    fast_invoker(),
                );
                let revise = tripdaemon::revision::ReviseEngine::new(stages, RevisionConfig::default());
                let engine = tripdaemon::replan::ReplanEngine::new(revise);
                let (cancel_tx, mut cancel) = tokio::sync::watch::channel(false);
                engine.replan(&mut context, &event, &mut cancel).await.unwrap();
                drop(cancel_tx);
            });

            for day in &before {
                if !affected.contains(&day.index) {
                    prop_assert_eq!(&context.days[day.index], day);
                }
            }
        }
    }
}
