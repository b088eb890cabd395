//! Job control entry points: start, cancel, playlist selection

use std::sync::atomic::Ordering;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::JobOrchestrator;
use crate::credentials;
use crate::error::{Error, Result};
use crate::plan::{self, PlanRequest};
use crate::types::{JobResult, JobState};

impl JobOrchestrator {
    /// Start a download job for `raw_url`.
    ///
    /// Resolves the URL and options into a plan, claims the single job slot
    /// and spawns the job worker. The returned handle yields the terminal
    /// [`JobResult`]; callers that only follow events may drop it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] / [`Error::AmbiguousScope`] when the plan
    ///   cannot be built; no job is created
    /// - [`Error::JobAlreadyRunning`] while a job is active; the running
    ///   job is unaffected
    pub async fn start(
        &self,
        raw_url: &str,
        request: PlanRequest,
    ) -> Result<JoinHandle<JobResult>> {
        let credentials = credentials::resolve_from_config(&self.config.credentials);
        let plan = plan::resolve(raw_url, request, credentials, &self.config)?;

        // Claim the slot only after the plan is known good; a rejected URL
        // must never block a later start.
        if self
            .slot
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::JobAlreadyRunning);
        }

        let cancel = CancellationToken::new();
        match self.slot.cancel.lock() {
            Ok(mut guard) => *guard = cancel.clone(),
            Err(poisoned) => *poisoned.into_inner() = cancel.clone(),
        }

        let selection_rx = if plan.interactive_selection {
            let (tx, rx) = tokio::sync::oneshot::channel();
            match self.slot.selection.lock() {
                Ok(mut guard) => *guard = Some(tx),
                Err(poisoned) => *poisoned.into_inner() = Some(tx),
            }
            Some(rx)
        } else {
            None
        };

        self.set_state(JobState::ResolvingInfo);

        tracing::info!(url = %plan.url, mode = ?plan.mode, scope = ?plan.scope, "job starting");

        let orchestrator = self.clone();
        Ok(tokio::spawn(async move {
            super::job::run_job(orchestrator, plan, cancel, selection_rx).await
        }))
    }

    /// Request cancellation of the active job.
    ///
    /// Cooperative: the flag is observed at the next progress or
    /// post-processor callback, so cancellation latency is bounded by the
    /// engine's callback interval. Partially written files are left on
    /// disk. A no-op when no job is running.
    pub fn cancel(&self) {
        let token = match self.slot.cancel.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        tracing::info!("cancellation requested");
        token.cancel();
    }

    /// Supply playlist indices to a job paused in `AwaitingSelection`.
    ///
    /// 1-based indices; an empty list cancels the job instead of
    /// downloading nothing.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidJobState`] when no job is awaiting a selection.
    pub fn select_items(&self, indices: Vec<u32>) -> Result<()> {
        if self.state() != JobState::AwaitingSelection {
            return Err(Error::InvalidJobState {
                operation: "select items".to_string(),
                state: format!("current state is {:?}", self.state()),
            });
        }

        let sender = {
            let mut guard = match self.slot.selection.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.take()
        };

        match sender {
            Some(sender) => {
                // A dropped receiver means the job reached a terminal state
                // between our check and the send; equivalent to no job.
                sender.send(indices).map_err(|_| Error::InvalidJobState {
                    operation: "select items".to_string(),
                    state: "the job is no longer awaiting a selection".to_string(),
                })
            }
            None => Err(Error::InvalidJobState {
                operation: "select items".to_string(),
                state: format!("current state is {:?}", self.state()),
            }),
        }
    }
}
