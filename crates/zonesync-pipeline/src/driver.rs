//! Commit driver: runs commit steps to completion with retry and abort.
//!
//! The driver owns no state beyond an abort flag; all progress lives in the
//! staging tables. Each iteration commits one city through the retry policy,
//! so a crash or pause at any point resumes by simply constructing a new
//! driver for the same batch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};
use zonesync_core::BatchId;

use crate::commit::{CommitEngine, CommitStepResult};
use crate::error::{PipelineError, PipelineResult};
use crate::retry::RetryPolicy;

/// One idempotent unit of commit work.
#[async_trait]
pub trait CommitStep: Send + Sync {
    /// Promote the next approved city of the batch.
    async fn commit_next_city(&self, batch_id: BatchId) -> PipelineResult<CommitStepResult>;
}

#[async_trait]
impl CommitStep for CommitEngine {
    async fn commit_next_city(&self, batch_id: BatchId) -> PipelineResult<CommitStepResult> {
        CommitEngine::commit_next_city(self, batch_id).await
    }
}

/// Terminal state of a drive run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveStatus {
    /// Every approved city of the batch was committed.
    Completed,
    /// A step failed after retries; the batch resumes from where it stopped.
    Paused,
    /// The abort flag was raised between steps.
    Cancelled,
}

/// Outcome of driving a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveOutcome {
    pub status: DriveStatus,
    /// Cities committed by this run, in order.
    pub committed: Vec<String>,
    /// Approved cities still waiting, when known.
    pub remaining: Option<u32>,
    /// Retry attempts consumed across all steps of this run.
    pub retries: u32,
    /// Message of the error that paused the run, if any.
    pub last_error: Option<String>,
}

impl DriveOutcome {
    /// Turn a paused run into the resumable partial-batch error, so callers
    /// that treat a pause as a failure get the progress counts with it.
    /// Completed and cancelled runs pass through unchanged.
    pub fn into_result(self) -> PipelineResult<Self> {
        if self.status != DriveStatus::Paused {
            return Ok(self);
        }
        let message = self
            .last_error
            .unwrap_or_else(|| "commit run paused".to_string());
        Err(PipelineError::partial_batch(
            self.committed.len() as u32,
            self.remaining.unwrap_or(0),
            message,
        ))
    }
}

/// Cancellation handle shared with whoever may abort the run.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect between steps; the in-flight city
    /// always finishes or fails as a whole.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Locally cached metadata for an in-flight batch.
///
/// Lets a caller offer "resume" after a pause or crash without a database
/// round trip. Cleared only on terminal success; a paused or cancelled run
/// keeps it so the same batch can be re-driven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchHandle {
    pub batch_id: BatchId,
    /// Cities committed across all runs of this batch so far.
    pub committed: Vec<String>,
}

/// Drives a batch's commit steps to a terminal state.
pub struct CommitDriver<S> {
    step: S,
    policy: RetryPolicy,
    abort: AbortHandle,
    handle: Mutex<Option<BatchHandle>>,
}

impl<S: CommitStep> CommitDriver<S> {
    pub fn new(step: S, policy: RetryPolicy) -> Self {
        Self {
            step,
            policy,
            abort: AbortHandle::new(),
            handle: Mutex::new(None),
        }
    }

    /// Handle for cancelling the run from another task.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Metadata of the batch still in flight, if the last run did not
    /// complete.
    #[must_use]
    pub fn pending_batch(&self) -> Option<BatchHandle> {
        self.handle.lock().ok().and_then(|guard| guard.clone())
    }

    fn record_progress(&self, batch_id: BatchId, committed: &[String], clear: bool) {
        if let Ok(mut guard) = self.handle.lock() {
            if clear {
                *guard = None;
            } else {
                let entry = guard.get_or_insert_with(|| BatchHandle {
                    batch_id,
                    committed: Vec::new(),
                });
                entry.batch_id = batch_id;
                entry.committed.extend_from_slice(committed);
            }
        }
    }

    /// Run commit steps until the batch completes, a step exhausts its
    /// retries, or the abort flag is raised.
    ///
    /// Never returns an error: a failed step pauses the run and reports the
    /// error in the outcome, because the batch itself stays resumable.
    #[instrument(skip(self))]
    pub async fn drive(&self, batch_id: BatchId) -> DriveOutcome {
        let mut committed = Vec::new();
        let mut retries = 0u32;
        let mut remaining = None;

        loop {
            if self.abort.is_aborted() {
                info!(batch_id = %batch_id, committed = committed.len(), "Commit run cancelled");
                self.record_progress(batch_id, &committed, false);
                return DriveOutcome {
                    status: DriveStatus::Cancelled,
                    committed,
                    remaining,
                    retries,
                    last_error: None,
                };
            }

            let result = self
                .policy
                .run(
                    || self.step.commit_next_city(batch_id),
                    |_, _| retries += 1,
                )
                .await;

            match result {
                Ok(step) => {
                    if let Some(city) = step.committed_city {
                        committed.push(city);
                    }
                    remaining = Some(step.remaining);
                    if step.completed {
                        info!(
                            batch_id = %batch_id,
                            committed = committed.len(),
                            retries,
                            "Commit run completed"
                        );
                        self.record_progress(batch_id, &committed, true);
                        return DriveOutcome {
                            status: DriveStatus::Completed,
                            committed,
                            remaining: Some(0),
                            retries,
                            last_error: None,
                        };
                    }
                }
                Err(err) => {
                    warn!(
                        batch_id = %batch_id,
                        committed = committed.len(),
                        error = %err,
                        "Commit run paused"
                    );
                    self.record_progress(batch_id, &committed, false);
                    return DriveOutcome {
                        status: DriveStatus::Paused,
                        committed,
                        remaining,
                        retries,
                        last_error: Some(err.to_string()),
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted step: pops one result per call from a queue of closures.
    struct ScriptedStep {
        script: Mutex<Vec<Box<dyn FnOnce() -> PipelineResult<CommitStepResult> + Send>>>,
    }

    impl ScriptedStep {
        fn new(
            script: Vec<Box<dyn FnOnce() -> PipelineResult<CommitStepResult> + Send>>,
        ) -> Self {
            Self {
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl CommitStep for ScriptedStep {
        async fn commit_next_city(&self, _batch_id: BatchId) -> PipelineResult<CommitStepResult> {
            let next = self
                .script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| panic!("step called after the script ended"));
            next()
        }
    }

    fn committed(city: &str, remaining: u32) -> PipelineResult<CommitStepResult> {
        Ok(CommitStepResult {
            completed: remaining == 0,
            remaining,
            committed_city: Some(city.to_string()),
        })
    }

    fn script(
        steps: Vec<Box<dyn FnOnce() -> PipelineResult<CommitStepResult> + Send>>,
    ) -> ScriptedStep {
        // Stored as a stack; reverse so the first entry runs first.
        let mut steps = steps;
        steps.reverse();
        ScriptedStep::new(steps)
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            jitter: false,
        }
    }

    #[tokio::test]
    async fn drives_every_city_to_completion() {
        let step = script(vec![
            Box::new(|| committed("Oslo", 2)),
            Box::new(|| committed("Bergen", 1)),
            Box::new(|| committed("Trondheim", 0)),
        ]);

        let outcome = CommitDriver::new(step, fast_policy())
            .drive(BatchId::new())
            .await;

        assert_eq!(outcome.status, DriveStatus::Completed);
        assert_eq!(outcome.committed, vec!["Oslo", "Bergen", "Trondheim"]);
        assert_eq!(outcome.remaining, Some(0));
        assert_eq!(outcome.retries, 0);
        assert!(outcome.last_error.is_none());
    }

    #[tokio::test]
    async fn transient_failure_mid_batch_retries_without_duplicating() {
        // Three cities; the second step fails once with a transient error and
        // succeeds on retry. Exactly one retry, every city exactly once.
        let step = script(vec![
            Box::new(|| committed("Oslo", 2)),
            Box::new(|| {
                Err(PipelineError::NetworkTransient {
                    message: "connection reset".into(),
                })
            }),
            Box::new(|| committed("Bergen", 1)),
            Box::new(|| committed("Trondheim", 0)),
        ]);

        let outcome = CommitDriver::new(step, fast_policy())
            .drive(BatchId::new())
            .await;

        assert_eq!(outcome.status, DriveStatus::Completed);
        assert_eq!(outcome.committed, vec!["Oslo", "Bergen", "Trondheim"]);
        assert_eq!(outcome.retries, 1);
    }

    #[tokio::test]
    async fn non_retryable_failure_pauses_with_progress_kept() {
        let step = script(vec![
            Box::new(|| committed("Oslo", 2)),
            Box::new(|| Err(PipelineError::data_integrity("unresolved area"))),
        ]);

        let outcome = CommitDriver::new(step, fast_policy())
            .drive(BatchId::new())
            .await;

        assert_eq!(outcome.status, DriveStatus::Paused);
        assert_eq!(outcome.committed, vec!["Oslo"]);
        assert_eq!(outcome.remaining, Some(2));
        assert_eq!(outcome.retries, 0);
        assert!(outcome
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("unresolved area")));
    }

    #[tokio::test]
    async fn paused_run_converts_into_a_partial_batch_error() {
        let step = script(vec![
            Box::new(|| committed("Oslo", 2)),
            Box::new(|| Err(PipelineError::data_integrity("unresolved area"))),
        ]);

        let outcome = CommitDriver::new(step, fast_policy())
            .drive(BatchId::new())
            .await;

        match outcome.into_result().unwrap_err() {
            PipelineError::PartialBatch {
                completed,
                remaining,
                message,
            } => {
                assert_eq!(completed, 1);
                assert_eq!(remaining, 2);
                assert!(message.contains("unresolved area"));
            }
            other => panic!("expected partial batch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn completed_run_passes_through_into_result() {
        let step = script(vec![Box::new(|| committed("Oslo", 0))]);

        let outcome = CommitDriver::new(step, fast_policy())
            .drive(BatchId::new())
            .await
            .into_result()
            .expect("completed run is not an error");

        assert_eq!(outcome.status, DriveStatus::Completed);
    }

    #[tokio::test]
    async fn exhausted_retries_pause_the_run() {
        let step = script(vec![
            Box::new(|| {
                Err(PipelineError::NetworkTransient {
                    message: "down".into(),
                })
            }),
            Box::new(|| {
                Err(PipelineError::NetworkTransient {
                    message: "down".into(),
                })
            }),
            Box::new(|| {
                Err(PipelineError::NetworkTransient {
                    message: "down".into(),
                })
            }),
        ]);

        let outcome = CommitDriver::new(step, fast_policy())
            .drive(BatchId::new())
            .await;

        assert_eq!(outcome.status, DriveStatus::Paused);
        assert!(outcome.committed.is_empty());
        assert_eq!(outcome.retries, 2);
    }

    #[tokio::test]
    async fn abort_takes_effect_between_steps() {
        let step = script(vec![Box::new(|| committed("Oslo", 2))]);
        let driver = CommitDriver::new(step, fast_policy());
        let handle = driver.abort_handle();

        // Raised before the run: the driver stops before touching a city.
        handle.abort();
        let outcome = driver.drive(BatchId::new()).await;

        assert_eq!(outcome.status, DriveStatus::Cancelled);
        assert!(outcome.committed.is_empty());
    }

    #[tokio::test]
    async fn batch_handle_is_cleared_only_on_completion() {
        let batch = BatchId::new();

        let step = script(vec![
            Box::new(|| committed("Oslo", 1)),
            Box::new(|| Err(PipelineError::data_integrity("unresolved area"))),
        ]);
        let driver = CommitDriver::new(step, fast_policy());
        driver.drive(batch).await;

        let handle = driver.pending_batch().expect("paused run keeps its handle");
        assert_eq!(handle.batch_id, batch);
        assert_eq!(handle.committed, vec!["Oslo"]);

        let step = script(vec![Box::new(|| committed("Bergen", 0))]);
        let driver = CommitDriver::new(step, fast_policy());
        driver.drive(batch).await;
        assert!(driver.pending_batch().is_none());
    }

    #[tokio::test]
    async fn resuming_after_a_pause_picks_up_the_remaining_cities() {
        let batch = BatchId::new();

        let first = script(vec![
            Box::new(|| committed("Oslo", 2)),
            Box::new(|| Err(PipelineError::data_integrity("unresolved area"))),
        ]);
        let paused = CommitDriver::new(first, fast_policy()).drive(batch).await;
        assert_eq!(paused.status, DriveStatus::Paused);
        assert_eq!(paused.committed, vec!["Oslo"]);

        // A fresh driver sees only what staging still holds.
        let second = script(vec![
            Box::new(|| committed("Bergen", 1)),
            Box::new(|| committed("Trondheim", 0)),
        ]);
        let resumed = CommitDriver::new(second, fast_policy()).drive(batch).await;

        assert_eq!(resumed.status, DriveStatus::Completed);
        assert_eq!(resumed.committed, vec!["Bergen", "Trondheim"]);
    }
}
