//! The job worker: one invocation of the full lifecycle state machine
//!
//! Idle → ResolvingInfo → (AwaitingSelection) → Downloading →
//! (PostProcessing) → Completed | Cancelled | Failed. The worker owns all
//! state transitions; control entry points only flip flags and feed
//! channels.

use rand::Rng;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::JobOrchestrator;
use crate::config::ToolsConfig;
use crate::engine::{
    DownloadHooks, DownloadOutcome, EngineRequest, HookDecision, PostProcessUpdate,
    ProgressUpdate,
};
use crate::error::Error;
use crate::plan::DownloadPlan;
use crate::progress::ProgressAggregator;
use crate::types::{Event, JobResult, JobState, PlaylistScope};

/// Run one job to its terminal state. Always releases the slot.
pub(super) async fn run_job(
    orchestrator: JobOrchestrator,
    plan: DownloadPlan,
    cancel: CancellationToken,
    selection_rx: Option<oneshot::Receiver<Vec<u32>>>,
) -> JobResult {
    let result = drive(&orchestrator, &plan, &cancel, selection_rx).await;

    match &result {
        JobResult::Completed { title, .. } => {
            orchestrator.set_state(JobState::Completed);
            tracing::info!(title = %title, "job completed");
        }
        JobResult::Cancelled => {
            orchestrator.set_state(JobState::Cancelled);
            orchestrator.emit_event(Event::Cancelled);
            tracing::info!("job cancelled");
        }
        JobResult::Failed { kind, message } => {
            orchestrator.set_state(JobState::Failed { kind: *kind });
            orchestrator.emit_event(Event::Failed {
                kind: *kind,
                message: message.clone(),
            });
            tracing::warn!(kind = %kind, message = %message, "job failed");
        }
    }

    // Release the slot last so a racing start() never observes a stale
    // non-terminal state.
    match orchestrator.slot.selection.lock() {
        Ok(mut guard) => *guard = None,
        Err(poisoned) => *poisoned.into_inner() = None,
    }
    orchestrator.slot.running.store(false, Ordering::SeqCst);
    result
}

/// The happy-path spine; every early return is a terminal result.
async fn drive(
    orchestrator: &JobOrchestrator,
    plan: &DownloadPlan,
    cancel: &CancellationToken,
    selection_rx: Option<oneshot::Receiver<Vec<u32>>>,
) -> JobResult {
    orchestrator.emit_event(Event::Started {
        url: plan.url.clone(),
    });

    // ResolvingInfo: metadata only, no media bytes
    let info = tokio::select! {
        _ = cancel.cancelled() => return JobResult::Cancelled,
        info = orchestrator.engine.fetch_metadata(&plan.url, &plan.credentials) => {
            match info {
                Ok(info) => info,
                Err(e) => return failure(e),
            }
        }
    };
    orchestrator.emit_event(Event::InfoResolved {
        title: info.title.clone(),
        uploader: info.uploader.clone(),
        entry_count: info.entry_count(),
    });

    // AwaitingSelection: only for interactive playlist plans that actually
    // resolved to multiple entries
    let mut scope = plan.scope.clone();
    if let (Some(rx), Some(entry_count)) = (selection_rx, info.entry_count()) {
        if plan.interactive_selection {
            orchestrator.set_state(JobState::AwaitingSelection);
            orchestrator.emit_event(Event::AwaitingSelection { entry_count });

            let indices = tokio::select! {
                _ = cancel.cancelled() => return JobResult::Cancelled,
                selection = rx => match selection {
                    Ok(indices) => indices,
                    // Sender gone without a selection: orchestrator dropped
                    Err(_) => return JobResult::Cancelled,
                },
            };
            if indices.is_empty() {
                return JobResult::Cancelled;
            }
            scope = PlaylistScope::ItemSubset(indices);
        }
    }

    // Resolve the transcoder before any media bytes move
    let ffmpeg_path = locate_ffmpeg(&orchestrator.config.tools);
    if plan.requires_transcode() && ffmpeg_path.is_none() {
        return failure(Error::PostProcessing(
            "ffmpeg not found: install it or set an explicit ffmpeg path in the configuration"
                .to_string(),
        ));
    }

    // Randomized pacing delay before hitting the upstream
    let delay = pacing_delay(plan);
    if !delay.is_zero() {
        tracing::debug!(delay_ms = delay.as_millis() as u64, "pacing before download");
        tokio::select! {
            _ = cancel.cancelled() => return JobResult::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    orchestrator.set_state(JobState::Downloading);

    let mut request = EngineRequest::from_plan(plan, &orchestrator.config.tools);
    request.playlist = scope;
    request.ffmpeg_path = ffmpeg_path;

    let hooks = JobHooks::new(orchestrator.clone(), cancel.clone());
    let outcome = tokio::select! {
        // Covers cancellation between callbacks (engine stalled or silent)
        _ = cancel.cancelled() => return JobResult::Cancelled,
        outcome = orchestrator.engine.download(&request, &hooks) => outcome,
    };

    match outcome {
        Ok(DownloadOutcome::Finished { output_path }) => {
            complete(orchestrator, &info.title, output_path).await
        }
        Ok(DownloadOutcome::Aborted) => JobResult::Cancelled,
        Err(e) => failure(e),
    }
}

async fn complete(
    orchestrator: &JobOrchestrator,
    title: &str,
    path: Option<PathBuf>,
) -> JobResult {
    if let Err(e) = orchestrator.store.lock().await.record_download(title) {
        // The download itself succeeded; a history write failure is logged,
        // not escalated
        tracing::warn!(error = %e, "failed to record download history");
    }
    orchestrator.emit_event(Event::Completed {
        path: path.clone(),
        title: title.to_string(),
    });
    JobResult::Completed {
        path,
        title: title.to_string(),
    }
}

/// Map an error to a failed result, keeping the lowest-level message.
fn failure(error: Error) -> JobResult {
    let kind = error.kind();
    let message = match &error {
        Error::Extraction(m) | Error::PostProcessing(m) | Error::Credential(m) => m.clone(),
        other => other.to_string(),
    };
    JobResult::Failed { kind, message }
}

/// Uniform draw from the configured sleep-interval bounds.
fn pacing_delay(plan: &DownloadPlan) -> std::time::Duration {
    let min = plan.resilience.sleep_interval;
    let max = plan.resilience.max_sleep_interval.max(min);
    if max.is_zero() {
        return std::time::Duration::ZERO;
    }
    let millis = rand::thread_rng().gen_range(min.as_millis() as u64..=max.as_millis() as u64);
    std::time::Duration::from_millis(millis)
}

/// Locate the transcoder: explicit path wins, then a PATH search when
/// allowed.
fn locate_ffmpeg(tools: &ToolsConfig) -> Option<PathBuf> {
    if let Some(path) = &tools.ffmpeg_path {
        return Some(path.clone());
    }
    if tools.search_path {
        return which::which("ffmpeg").ok();
    }
    None
}

/// Engine callbacks for one job: forward snapshots, watch the cancel flag,
/// nothing that can block.
struct JobHooks {
    orchestrator: JobOrchestrator,
    cancel: CancellationToken,
    aggregator: std::sync::Mutex<ProgressAggregator>,
    postprocess_announced: std::sync::atomic::AtomicBool,
}

impl JobHooks {
    fn new(orchestrator: JobOrchestrator, cancel: CancellationToken) -> Self {
        Self {
            orchestrator,
            cancel,
            aggregator: std::sync::Mutex::new(ProgressAggregator::new()),
            postprocess_announced: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn with_aggregator<R>(&self, f: impl FnOnce(&mut ProgressAggregator) -> R) -> R {
        match self.aggregator.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl DownloadHooks for JobHooks {
    fn on_progress(&self, update: &ProgressUpdate) -> HookDecision {
        if self.cancel.is_cancelled() {
            return HookDecision::Abort;
        }
        let snapshot = self.with_aggregator(|agg| agg.observe(update));
        self.orchestrator.emit_event(Event::Progress(snapshot));
        HookDecision::Continue
    }

    fn on_postprocess(&self, update: &PostProcessUpdate) -> HookDecision {
        if self.cancel.is_cancelled() {
            return HookDecision::Abort;
        }
        if !self.postprocess_announced.swap(true, Ordering::SeqCst) {
            self.orchestrator.set_state(JobState::PostProcessing);
            self.orchestrator.emit_event(Event::PostProcessing);
        }
        let snapshot = self.with_aggregator(|agg| agg.observe_postprocess(update));
        self.orchestrator.emit_event(Event::Progress(snapshot));
        HookDecision::Continue
    }
}
