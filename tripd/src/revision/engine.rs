//! Revise loop engine
//!
//! One `revise_day` call drives a single day from its current status to
//! PendingConfirmation (or NeedsManualReview under the replanning failure
//! policy). Stage failures never escape this module as errors; they are
//! absorbed into attempt accounting and day status.

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::{
    ActivityItem, CritiqueIssue, CritiqueResult, DayStatus, Dimension, DomainError, PlanContext, Severity,
};
use crate::stage::{GenerationRequest, StageSet};

/// Revise loop parameters
#[derive(Debug, Clone)]
pub struct RevisionConfig {
    /// Rejections tolerated before committing the fallback
    pub max_revisions: u32,
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self { max_revisions: 3 }
    }
}

/// What to do when the revision budget runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Commit the best-scoring rejected candidate with the degraded flag
    DegradedCommit,
    /// Mark the day NeedsManualReview, used by the replanning engine
    ManualReview,
}

/// Result of one revise loop run
#[derive(Debug, Clone, PartialEq)]
pub struct ReviseOutcome {
    pub day_index: usize,
    pub status: DayStatus,
    pub degraded: bool,
    /// Generation calls consumed
    pub generations: u32,
}

/// Errors that abort a revise run outright
///
/// Stage-level failures are not in this set; they consume attempts instead.
#[derive(Debug, Error)]
pub enum ReviseError {
    #[error("Session cancelled")]
    Cancelled,

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// A rejected candidate retained for the degraded-commit fallback
struct Candidate {
    activities: Vec<ActivityItem>,
    critique: CritiqueResult,
    attempt: u32,
}

impl Candidate {
    /// Ordering for best-candidate selection: highest score, then fewest
    /// high-severity issues, then earliest attempt
    fn beats(&self, other: &Candidate) -> bool {
        if self.critique.score != other.critique.score {
            return self.critique.score > other.critique.score;
        }
        if self.critique.high_severity_count() != other.critique.high_severity_count() {
            return self.critique.high_severity_count() < other.critique.high_severity_count();
        }
        self.attempt < other.attempt
    }
}

/// Bounded plan-critique-revise controller
pub struct ReviseEngine {
    stages: StageSet,
    config: RevisionConfig,
}

impl ReviseEngine {
    pub fn new(stages: StageSet, config: RevisionConfig) -> Self {
        Self { stages, config }
    }

    /// Drive one day through the loop until approval or budget exhaustion
    ///
    /// `seed` issues (user feedback) and `constraints` (replanning) are
    /// passed to every generation call. Commits bump the context version;
    /// persisting the context is the caller's job.
    pub async fn revise_day(
        &self,
        context: &mut PlanContext,
        day_index: usize,
        seed: Vec<CritiqueIssue>,
        constraints: Vec<String>,
        policy: FailurePolicy,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<ReviseOutcome, ReviseError> {
        debug!(trip_id = %context.trip_id, day = %day_index, ?policy, "revise_day: called");

        context.ensure_day(day_index)?;

        let mut attempt: u32 = 0;
        let mut generations: u32 = 0;
        let mut feedback = seed.clone();
        let mut best: Option<Candidate> = None;

        loop {
            // Generate a candidate from a read-only snapshot
            let snapshot = context.clone();
            let mut request = GenerationRequest::fresh(day_index);
            request.feedback = feedback.clone();
            request.constraints = constraints.clone();

            generations += 1;
            let generated = self
                .guarded(cancel, async {
                    self.stages
                        .planner_invoker
                        .invoke("generate_day", || self.stages.planner.generate_day(&snapshot, &request))
                        .await
                })
                .await?;

            let candidate = match generated {
                Ok(activities) => activities,
                Err(e) => {
                    warn!(day = %day_index, attempt, error = %e, "revise_day: generation failed");
                    attempt += 1;
                    if attempt >= self.config.max_revisions {
                        return self.exhaust(context, day_index, best, policy, generations);
                    }
                    continue;
                }
            };

            let day = context.ensure_day(day_index)?;
            if matches!(day.status, DayStatus::Empty | DayStatus::Invalidated) {
                day.transition(DayStatus::Drafted)?;
            }
            day.set_activities(candidate.clone());
            day.increment_revision();

            // Structurally invalid output is an automatic rejection that
            // does not consume a critique call
            if let Err(e) = day.validate_schedule() {
                debug!(day = %day_index, attempt, error = %e, "revise_day: structural rejection");
                if day.status == DayStatus::Drafted {
                    day.transition(DayStatus::UnderCritique)?;
                }
                if day.status == DayStatus::UnderCritique {
                    day.transition(DayStatus::Revising)?;
                }
                feedback = vec![CritiqueIssue::day_level(
                    Dimension::LogicalConsistency,
                    Severity::High,
                    e.to_string(),
                )];
                attempt += 1;
                if attempt >= self.config.max_revisions {
                    return self.exhaust(context, day_index, best, policy, generations);
                }
                continue;
            }

            if day.status != DayStatus::UnderCritique {
                day.transition(DayStatus::UnderCritique)?;
            }

            let snapshot = context.clone();
            let day_snapshot = snapshot
                .day(day_index)
                .cloned()
                .ok_or(DomainError::DayOutOfRange {
                    index: day_index,
                    len: snapshot.duration_days(),
                })?;

            let critiqued = self
                .guarded(cancel, async {
                    self.stages
                        .critic_invoker
                        .invoke("critique_day", || self.stages.critic.critique_day(&snapshot, &day_snapshot))
                        .await
                })
                .await?;

            let critique = match critiqued {
                Ok(result) => result,
                Err(e) => {
                    warn!(day = %day_index, attempt, error = %e, "revise_day: critique failed");
                    let day = context.ensure_day(day_index)?;
                    day.transition(DayStatus::Revising)?;
                    attempt += 1;
                    if attempt >= self.config.max_revisions {
                        return self.exhaust(context, day_index, best, policy, generations);
                    }
                    continue;
                }
            };

            let day = context.ensure_day(day_index)?;
            day.set_critique(critique.clone());

            if critique.is_approved() {
                info!(
                    trip_id = %context.trip_id,
                    day = %day_index,
                    score = %critique.score,
                    generations,
                    "revise_day: approved"
                );
                let day = context.ensure_day(day_index)?;
                day.degraded = false;
                day.transition(DayStatus::PendingConfirmation)?;
                context.bump_version();
                return Ok(ReviseOutcome {
                    day_index,
                    status: DayStatus::PendingConfirmation,
                    degraded: false,
                    generations,
                });
            }

            debug!(day = %day_index, attempt, score = %critique.score, "revise_day: rejected");
            day.transition(DayStatus::Revising)?;

            let contender = Candidate {
                activities: candidate,
                critique: critique.clone(),
                attempt,
            };
            if best.as_ref().is_none_or(|b| contender.beats(b)) {
                best = Some(contender);
            }

            attempt += 1;
            if attempt >= self.config.max_revisions {
                return self.exhaust(context, day_index, best, policy, generations);
            }

            // Feed the critique back; the original seed issues stay live
            // so user feedback is never dropped mid-loop
            feedback = seed.clone();
            feedback.extend(critique.issues);
        }
    }

    /// Budget exhausted: degraded commit or manual review per policy
    fn exhaust(
        &self,
        context: &mut PlanContext,
        day_index: usize,
        best: Option<Candidate>,
        policy: FailurePolicy,
        generations: u32,
    ) -> Result<ReviseOutcome, ReviseError> {
        let trip_id = context.trip_id.clone();
        let day = context.ensure_day(day_index)?;

        match (policy, best) {
            (FailurePolicy::DegradedCommit, Some(candidate)) => {
                warn!(
                    trip_id = %trip_id,
                    day = %day_index,
                    score = %candidate.critique.score,
                    "revise_day: budget exhausted, committing degraded candidate"
                );
                day.set_activities(candidate.activities);
                day.set_critique(candidate.critique);
                day.degraded = true;
                day.transition(DayStatus::PendingConfirmation)?;
                context.bump_version();
                Ok(ReviseOutcome {
                    day_index,
                    status: DayStatus::PendingConfirmation,
                    degraded: true,
                    generations,
                })
            }
            (policy, best) => {
                // ManualReview always lands here; so does DegradedCommit
                // when no structurally valid candidate ever materialized
                warn!(
                    trip_id = %trip_id,
                    day = %day_index,
                    ?policy,
                    had_candidate = %best.is_some(),
                    "revise_day: budget exhausted, needs manual review"
                );
                if day.status == DayStatus::Drafted || day.status == DayStatus::Empty {
                    // Generation never produced anything reviewable
                    if day.status == DayStatus::Empty {
                        day.transition(DayStatus::Drafted)?;
                    }
                    day.transition(DayStatus::NeedsManualReview)?;
                } else {
                    day.transition(DayStatus::NeedsManualReview)?;
                }
                context.bump_version();
                Ok(ReviseOutcome {
                    day_index,
                    status: DayStatus::NeedsManualReview,
                    degraded: false,
                    generations,
                })
            }
        }
    }

    /// Run a stage future, aborting when the cancel flag flips
    async fn guarded<T>(
        &self,
        cancel: &mut watch::Receiver<bool>,
        fut: impl Future<Output = T>,
    ) -> Result<T, ReviseError> {
        tokio::select! {
            biased;
            _ = cancel.wait_for(|&flag| flag) => Err(ReviseError::Cancelled),
            result = fut => Ok(result),
        }
    }
}
