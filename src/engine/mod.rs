//! Extraction engine abstraction
//!
//! The orchestrator never talks to yt-dlp directly; it goes through the
//! [`ExtractionEngine`] trait so tests can substitute a scripted engine.
//! [`YtDlpEngine`] is the production implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{ResilienceConfig, ToolsConfig};
use crate::credentials::CredentialSource;
use crate::error::Result;
use crate::plan::DownloadPlan;
use crate::types::{AudioBitrate, PlaylistScope};

mod ytdlp;

pub use ytdlp::YtDlpEngine;

/// Raw per-callback progress report from the engine
///
/// Optional fields mean "the engine did not report this"; downstream
/// normalization lives in [`crate::progress::ProgressAggregator`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Whether the current file is still transferring or just finished
    pub status: ProgressStatus,
    /// Bytes transferred so far for the current file
    pub downloaded_bytes: u64,
    /// Exact total size, when the upstream reports one
    pub total_bytes: Option<u64>,
    /// Engine-estimated total size
    pub total_bytes_estimate: Option<u64>,
    /// Transfer speed in bytes per second
    pub speed_bps: Option<u64>,
    /// Estimated seconds to completion
    pub eta_seconds: Option<u32>,
    /// 1-based index within a playlist download
    pub playlist_index: Option<u32>,
    /// Total playlist entry count
    pub playlist_count: Option<u32>,
}

/// Transfer state of the file a [`ProgressUpdate`] describes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Bytes are still moving
    #[default]
    Downloading,
    /// The raw transfer for this file is complete
    Finished,
}

/// Post-processing (transcode/merge) notification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostProcessUpdate {
    /// A post-processing step began
    Started,
    /// A post-processing step completed
    Finished,
}

/// What the hook wants the engine to do next
///
/// Returned from every callback; [`HookDecision::Abort`] makes the engine
/// stop the transfer cooperatively. This bounds cancellation latency to
/// one callback interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookDecision {
    /// Keep going
    Continue,
    /// Stop the transfer as soon as possible
    Abort,
}

/// How a download invocation ended, absent an error
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The engine ran to completion
    Finished {
        /// Path of the produced file, when the engine reported one
        output_path: Option<PathBuf>,
    },
    /// A hook returned [`HookDecision::Abort`] and the engine stopped
    Aborted,
}

/// Per-callback observer for a running download
pub trait DownloadHooks: Send + Sync {
    /// Called for every raw progress report.
    fn on_progress(&self, update: &ProgressUpdate) -> HookDecision;

    /// Called when a post-processing step starts or finishes.
    fn on_postprocess(&self, update: &PostProcessUpdate) -> HookDecision;
}

/// Metadata resolved before any media bytes move
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Media or playlist title
    pub title: String,
    /// Channel/uploader, when reported
    pub uploader: Option<String>,
    /// Duration in seconds, when reported (single videos)
    pub duration_seconds: Option<u64>,
    /// Flat playlist entries; empty for single videos
    pub entries: Vec<MediaEntry>,
}

impl MediaInfo {
    /// Number of playlist entries, `None` for a single video.
    pub fn entry_count(&self) -> Option<u32> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.len() as u32)
        }
    }
}

/// One entry of a flattened playlist
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaEntry {
    /// Entry title, when the flat listing carries one
    pub title: Option<String>,
    /// Entry video id
    pub id: Option<String>,
}

/// Engine-facing rendering of a [`DownloadPlan`]
///
/// Everything the engine needs for one invocation, with orchestration
/// concerns (events, cancellation, history) already stripped away.
#[derive(Clone, Debug)]
pub struct EngineRequest {
    /// Target URL
    pub url: String,
    /// Format-selector expression
    pub format_selector: String,
    /// Output path template, already joined with the download directory
    pub output_template: PathBuf,
    /// Extract audio and convert to mp3 at this bitrate
    pub audio_extract: Option<AudioBitrate>,
    /// Container for merged video downloads
    pub merge_output_format: Option<String>,
    /// Playlist handling for this invocation
    pub playlist: PlaylistScope,
    /// Authentication material
    pub credentials: CredentialSource,
    /// Retry/pacing/geo-bypass settings
    pub resilience: ResilienceConfig,
    /// Explicit transcoder location, when configured
    pub ffmpeg_path: Option<PathBuf>,
}

impl EngineRequest {
    /// Render a plan into an engine request. Pure; no I/O.
    pub fn from_plan(plan: &DownloadPlan, tools: &ToolsConfig) -> Self {
        Self {
            url: plan.url.clone(),
            format_selector: plan.format_selector.clone(),
            output_template: plan.output_dir.join(&plan.output_template),
            audio_extract: plan.audio_bitrate,
            merge_output_format: if plan.audio_bitrate.is_none() {
                Some("mp4".to_string())
            } else {
                None
            },
            playlist: plan.scope.clone(),
            credentials: plan.credentials.clone(),
            resilience: plan.resilience.clone(),
            ffmpeg_path: tools.ffmpeg_path.clone(),
        }
    }
}

/// External media extraction engine
///
/// Implementations run the actual transfer; the orchestrator drives them and
/// owns the lifecycle. Both methods must be cancellation-safe: dropping the
/// returned future must not leave a child process running.
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Resolve metadata for a target without downloading media.
    async fn fetch_metadata(&self, url: &str, credentials: &CredentialSource)
        -> Result<MediaInfo>;

    /// Run one download to completion, abort, or failure, reporting raw
    /// progress through `hooks`.
    async fn download(
        &self,
        request: &EngineRequest,
        hooks: &dyn DownloadHooks,
    ) -> Result<DownloadOutcome>;

    /// Short engine name for logging.
    fn name(&self) -> &str;
}

/// Sink for the engine's own diagnostic output
///
/// Mirrors the logger object the underlying tool expects: the engine's
/// chatter is forwarded at matching severities instead of leaking to the
/// process's stdio.
pub trait EngineLogger: Send + Sync {
    /// Low-level engine chatter
    fn debug(&self, message: &str);
    /// Informational output
    fn info(&self, message: &str);
    /// Recoverable conditions
    fn warning(&self, message: &str);
    /// Failures reported by the engine
    fn error(&self, message: &str);
}

/// [`EngineLogger`] backed by the `tracing` subscriber
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEngineLogger;

impl EngineLogger for TracingEngineLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "tube_dl::engine", "{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "tube_dl::engine", "{message}");
    }

    fn warning(&self, message: &str) {
        tracing::warn!(target: "tube_dl::engine", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "tube_dl::engine", "{message}");
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::plan::{self, PlanRequest};
    use crate::types::{Mode, Quality};

    fn plan_for(url: &str, request: PlanRequest) -> DownloadPlan {
        plan::resolve(url, request, CredentialSource::None, &Config::default()).unwrap()
    }

    #[test]
    fn video_plan_requests_mp4_merge_without_audio_extract() {
        let plan = plan_for("https://youtu.be/dQw4w9WgXcQ", PlanRequest::default());
        let request = EngineRequest::from_plan(&plan, &ToolsConfig::default());

        assert_eq!(request.audio_extract, None);
        assert_eq!(request.merge_output_format.as_deref(), Some("mp4"));
        assert_eq!(
            request.output_template,
            PathBuf::from("./downloads/%(title)s.%(ext)s")
        );
    }

    #[test]
    fn audio_plan_requests_extraction_without_merge() {
        let plan = plan_for(
            "https://youtu.be/dQw4w9WgXcQ",
            PlanRequest {
                mode: Mode::Audio,
                quality: Quality::Bitrate(AudioBitrate::Kbps192),
                ..PlanRequest::default()
            },
        );
        let request = EngineRequest::from_plan(&plan, &ToolsConfig::default());

        assert_eq!(request.audio_extract, Some(AudioBitrate::Kbps192));
        assert_eq!(request.merge_output_format, None);
    }

    #[test]
    fn entry_count_is_none_for_single_videos() {
        let single = MediaInfo {
            title: "a video".to_string(),
            uploader: None,
            duration_seconds: Some(212),
            entries: Vec::new(),
        };
        assert_eq!(single.entry_count(), None);

        let playlist = MediaInfo {
            title: "a playlist".to_string(),
            uploader: None,
            duration_seconds: None,
            entries: vec![
                MediaEntry {
                    title: Some("one".to_string()),
                    id: Some("aaaaaaaaaaa".to_string()),
                },
                MediaEntry {
                    title: None,
                    id: Some("bbbbbbbbbbb".to_string()),
                },
            ],
        };
        assert_eq!(playlist.entry_count(), Some(2));
    }
}
