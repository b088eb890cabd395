//! Single-job download orchestration
//!
//! The orchestrator owns the job lifecycle around the extraction engine:
//! exactly one job runs at a time, subscribers observe it through a
//! broadcast event stream, and terminal states release the slot for the
//! next job. Split into focused submodules:
//! - [`control`] - start/cancel/selection entry points
//! - [`job`] - the job worker state machine

mod control;
mod job;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::credentials::CredentialSource;
use crate::engine::{ExtractionEngine, YtDlpEngine};
use crate::error::{Error, Result};
use crate::store::SettingsStore;
use crate::types::{Event, HistoryEntry, JobState};

/// Event buffer per subscriber; a subscriber lagging past this many events
/// receives `RecvError::Lagged` instead of blocking the job worker
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Shared mutable state of the single job slot
pub(crate) struct JobSlot {
    /// Whether a job currently occupies the slot
    pub(crate) running: AtomicBool,
    /// Lifecycle state of the current (or last) job
    pub(crate) state: std::sync::Mutex<JobState>,
    /// Cancellation token for the current job, replaced on each start
    pub(crate) cancel: std::sync::Mutex<CancellationToken>,
    /// Pending selection channel, present only while a job awaits one
    pub(crate) selection: std::sync::Mutex<Option<tokio::sync::oneshot::Sender<Vec<u32>>>>,
}

impl JobSlot {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            state: std::sync::Mutex::new(JobState::Idle),
            cancel: std::sync::Mutex::new(CancellationToken::new()),
            selection: std::sync::Mutex::new(None),
        }
    }
}

/// Download-job orchestrator (cloneable; all fields are Arc-wrapped)
///
/// Create one per logical downloader. Presentation layers subscribe to the
/// event stream and drive [`start`](JobOrchestrator::start),
/// [`cancel`](JobOrchestrator::cancel) and
/// [`select_items`](JobOrchestrator::select_items).
#[derive(Clone)]
pub struct JobOrchestrator {
    /// Configuration (shared across tasks)
    pub(crate) config: Arc<Config>,
    /// Extraction engine the jobs delegate to
    pub(crate) engine: Arc<dyn ExtractionEngine>,
    /// Durable settings/history store
    pub(crate) store: Arc<tokio::sync::Mutex<SettingsStore>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// The single job slot
    pub(crate) slot: Arc<JobSlot>,
}

impl JobOrchestrator {
    /// Create an orchestrator with an auto-discovered yt-dlp engine.
    ///
    /// Creates the download directory and opens the settings store.
    ///
    /// # Errors
    ///
    /// Fails when no yt-dlp binary can be located, the download directory
    /// cannot be created, or the settings document is unreadable.
    pub async fn new(config: Config) -> Result<Self> {
        let engine = Arc::new(YtDlpEngine::discover(&config.tools)?);
        Self::with_engine(config, engine).await
    }

    /// Create an orchestrator around a caller-supplied engine.
    pub async fn with_engine(config: Config, engine: Arc<dyn ExtractionEngine>) -> Result<Self> {
        tokio::fs::create_dir_all(&config.download.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to create download directory '{}': {}",
                        config.download.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let store = SettingsStore::open(
            &config.persistence.settings_path,
            config.persistence.history_limit,
        )?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tracing::info!(
            engine = engine.name(),
            download_dir = %config.download.download_dir.display(),
            "orchestrator initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            engine,
            store: Arc::new(tokio::sync::Mutex::new(store)),
            event_tx,
            slot: Arc::new(JobSlot::new()),
        })
    }

    /// Subscribe to job events
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. Reactions that may block must be handed off to the
    /// subscriber's own task, events are delivered from the job worker.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration (cheap Arc clone).
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Lifecycle state of the current (or most recent) job.
    pub fn state(&self) -> JobState {
        match self.slot.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Download history, most recent first.
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.store.lock().await.settings().download_history.clone()
    }

    /// Persist a new credential choice for future sessions.
    pub async fn remember_cookie_source(&self, source: CredentialSource) -> Result<()> {
        self.store.lock().await.set_cookie_source(source)
    }

    /// Persist a new download folder for future sessions.
    pub async fn remember_download_folder(
        &self,
        folder: impl Into<std::path::PathBuf>,
    ) -> Result<()> {
        self.store.lock().await.set_download_folder(folder)
    }

    /// Emit an event to all subscribers. With no subscribers the event is
    /// silently dropped; the job never depends on anyone listening.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn set_state(&self, state: JobState) {
        match self.slot.state.lock() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }
}
