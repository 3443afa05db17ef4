//! StageInvoker - timeout, retry, and concurrency bounding for stage calls
//!
//! One invoker guards one external collaborator. Its semaphore is shared
//! across every session so a rate-limited backend sees a bounded number of
//! in-flight calls no matter how many trips are being planned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::error::StageError;

/// Retry/timeout parameters for one collaborator
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Per-call timeout
    pub call_timeout: Duration,

    /// Maximum retry attempts after the first call
    pub max_retries: u32,

    /// Initial backoff delay, doubled per retry
    pub initial_backoff: Duration,

    /// Total wall-clock budget across all attempts of one invocation
    pub total_budget: Duration,

    /// Maximum concurrent in-flight calls to this collaborator
    pub max_concurrent: usize,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            total_budget: Duration::from_secs(120),
            max_concurrent: 8,
        }
    }
}

/// Uniform invocation wrapper for one external collaborator
pub struct StageInvoker {
    /// Collaborator name for logs and errors
    name: String,
    config: InvokerConfig,
    semaphore: Arc<Semaphore>,
}

impl StageInvoker {
    /// Create an invoker for a named collaborator
    pub fn new(name: impl Into<String>, config: InvokerConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            name: name.into(),
            config,
            semaphore,
        }
    }

    /// Collaborator name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke a stage call with timeout, bounded retries, and backoff
    ///
    /// `call` is re-invoked to build a fresh future per attempt. The permit
    /// is held only for the duration of each attempt, never across backoff
    /// sleeps.
    pub async fn invoke<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, StageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        let mut backoff = self.config.initial_backoff;

        loop {
            attempt += 1;
            debug!(stage = %self.name, %op, attempt, "invoke: attempt");

            let result = {
                let _permit = self
                    .semaphore
                    .acquire()
                    .await
                    .map_err(|_| StageError::InvalidResponse("invoker semaphore closed".to_string()))?;

                match tokio::time::timeout(self.config.call_timeout, call()).await {
                    Ok(result) => result,
                    Err(_) => Err(StageError::Timeout(self.config.call_timeout)),
                }
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                debug!(stage = %self.name, %op, error = %err, "invoke: non-retryable error");
                return Err(err);
            }

            let out_of_attempts = attempt > self.config.max_retries;
            let out_of_budget = started.elapsed() >= self.config.total_budget;
            if out_of_attempts || out_of_budget {
                warn!(
                    stage = %self.name,
                    %op,
                    attempt,
                    out_of_budget,
                    error = %err,
                    "invoke: retry budget exhausted"
                );
                return Err(StageError::BudgetExhausted {
                    stage: self.name.clone(),
                    last: err.to_string(),
                });
            }

            // Honor server-provided retry-after when it exceeds our backoff
            let mut delay = err.retry_after().unwrap_or(backoff).max(backoff);

            // Cap the sleep so we never overrun the wall-clock budget
            let remaining = self.config.total_budget.saturating_sub(started.elapsed());
            delay = delay.min(remaining);

            let jitter = rand::rng().random_range(0..=delay.as_millis().min(250) as u64);
            warn!(stage = %self.name, %op, attempt, ?delay, "invoke: retrying after backoff");
            tokio::time::sleep(delay + Duration::from_millis(jitter)).await;

            backoff = backoff.saturating_mul(2);
        }
    }
}
