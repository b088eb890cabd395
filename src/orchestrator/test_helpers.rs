//! Shared test helpers: scripted mock engine and orchestrator factory.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

use crate::config::Config;
use crate::credentials::CredentialSource;
use crate::engine::{
    DownloadHooks, DownloadOutcome, EngineRequest, ExtractionEngine, HookDecision, MediaEntry,
    MediaInfo, PostProcessUpdate, ProgressStatus, ProgressUpdate,
};
use crate::error::{Error, Result};
use crate::orchestrator::JobOrchestrator;

/// Scripted engine: plays back a fixed sequence of progress callbacks and
/// returns a configured outcome. Records the requests it receives so tests
/// can assert on the rendered plan.
pub(crate) struct MockEngine {
    pub(crate) info: MediaInfo,
    pub(crate) updates: Vec<ProgressUpdate>,
    pub(crate) emit_postprocess: bool,
    pub(crate) fail_with: Option<fn() -> Error>,
    /// Pause between scripted callbacks, giving tests a window to cancel
    pub(crate) step_delay: Duration,
    pub(crate) last_request: Mutex<Option<EngineRequest>>,
    pub(crate) download_calls: AtomicUsize,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self {
            info: single_video_info("a test video"),
            updates: progress_script(4, 4096),
            emit_postprocess: false,
            fail_with: None,
            step_delay: Duration::from_millis(5),
            last_request: Mutex::new(None),
            download_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ExtractionEngine for MockEngine {
    async fn fetch_metadata(
        &self,
        _url: &str,
        _credentials: &CredentialSource,
    ) -> Result<MediaInfo> {
        Ok(self.info.clone())
    }

    async fn download(
        &self,
        request: &EngineRequest,
        hooks: &dyn DownloadHooks,
    ) -> Result<DownloadOutcome> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        for update in &self.updates {
            if hooks.on_progress(update) == HookDecision::Abort {
                return Ok(DownloadOutcome::Aborted);
            }
            tokio::time::sleep(self.step_delay).await;
        }

        if let Some(make_error) = self.fail_with {
            return Err(make_error());
        }

        if self.emit_postprocess {
            for update in [PostProcessUpdate::Started, PostProcessUpdate::Finished] {
                if hooks.on_postprocess(&update) == HookDecision::Abort {
                    return Ok(DownloadOutcome::Aborted);
                }
            }
        }

        Ok(DownloadOutcome::Finished {
            output_path: Some(std::path::PathBuf::from("downloads/a test video.mp4")),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub(crate) fn single_video_info(title: &str) -> MediaInfo {
    MediaInfo {
        title: title.to_string(),
        uploader: Some("test channel".to_string()),
        duration_seconds: Some(212),
        entries: Vec::new(),
    }
}

pub(crate) fn playlist_info(title: &str, entry_count: usize) -> MediaInfo {
    MediaInfo {
        title: title.to_string(),
        uploader: None,
        duration_seconds: None,
        entries: (0..entry_count)
            .map(|i| MediaEntry {
                title: Some(format!("entry {i}")),
                id: Some(format!("{i:0>11}")),
            })
            .collect(),
    }
}

/// Evenly spaced downloading updates followed by a finished marker.
pub(crate) fn progress_script(steps: u64, total: u64) -> Vec<ProgressUpdate> {
    let mut updates: Vec<ProgressUpdate> = (1..=steps)
        .map(|i| ProgressUpdate {
            status: ProgressStatus::Downloading,
            downloaded_bytes: total * i / steps,
            total_bytes: Some(total),
            ..ProgressUpdate::default()
        })
        .collect();
    updates.push(ProgressUpdate {
        status: ProgressStatus::Finished,
        downloaded_bytes: total,
        total_bytes: Some(total),
        ..ProgressUpdate::default()
    });
    updates
}

/// Config rooted in a temp dir with pacing disabled so tests run fast.
pub(crate) fn test_config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.download.download_dir = dir.path().join("downloads");
    config.persistence.settings_path = dir.path().join("settings.json");
    config.resilience.sleep_interval = Duration::ZERO;
    config.resilience.max_sleep_interval = Duration::ZERO;
    // Keep tests hermetic: no PATH probing for ffmpeg
    config.tools.search_path = false;
    config
}

/// Orchestrator around a mock engine. Returns the tempdir too; it must be
/// kept alive for the duration of the test.
pub(crate) async fn create_test_orchestrator(
    engine: MockEngine,
) -> (JobOrchestrator, Arc<MockEngine>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(&temp_dir);
    let engine = Arc::new(engine);
    let orchestrator = JobOrchestrator::with_engine(config, engine.clone())
        .await
        .unwrap();
    (orchestrator, engine, temp_dir)
}
