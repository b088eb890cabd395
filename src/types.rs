//! Core types for tube-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ErrorKind;

/// Download mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Download video (merged into an mp4 container)
    #[default]
    Video,
    /// Download best audio and convert to mp3
    Audio,
}

/// Quality selector for a download
///
/// Video mode uses [`Quality::Best`] or a bounded [`Quality::Height`]; audio
/// mode uses [`Quality::Bitrate`]. The Option Resolver maps a mismatched
/// combination (e.g. a height cap in audio mode) to the mode's default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// Best available quality, unconstrained
    #[default]
    Best,
    /// Best available at or below this height in pixels (e.g. 1080)
    Height(u32),
    /// Target mp3 bitrate tier for audio extraction
    Bitrate(AudioBitrate),
}

/// Target mp3 bitrate for audio extraction
///
/// The numeric tier handed to the transcoding step follows the engine's
/// 0 (best) .. 9 (worst) VBR scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioBitrate {
    /// 320 kbps
    #[default]
    Kbps320,
    /// 256 kbps
    Kbps256,
    /// 192 kbps
    Kbps192,
    /// 128 kbps
    Kbps128,
    /// 96 kbps
    Kbps96,
    /// 64 kbps
    Kbps64,
}

impl AudioBitrate {
    /// Map a requested kbps figure to the nearest supported tier.
    /// Unknown figures fall back to the best tier.
    pub fn from_kbps(kbps: u32) -> Self {
        match kbps {
            320 => AudioBitrate::Kbps320,
            256 => AudioBitrate::Kbps256,
            192 => AudioBitrate::Kbps192,
            128 => AudioBitrate::Kbps128,
            96 => AudioBitrate::Kbps96,
            64 => AudioBitrate::Kbps64,
            _ => AudioBitrate::Kbps320,
        }
    }

    /// Nominal bitrate in kbps
    pub fn kbps(&self) -> u32 {
        match self {
            AudioBitrate::Kbps320 => 320,
            AudioBitrate::Kbps256 => 256,
            AudioBitrate::Kbps192 => 192,
            AudioBitrate::Kbps128 => 128,
            AudioBitrate::Kbps96 => 96,
            AudioBitrate::Kbps64 => 64,
        }
    }

    /// Engine-side quality tier (0 = best VBR, higher = worse)
    pub fn tier(&self) -> &'static str {
        match self {
            AudioBitrate::Kbps320 => "0",
            AudioBitrate::Kbps256 => "1",
            AudioBitrate::Kbps192 => "2",
            AudioBitrate::Kbps128 => "5",
            AudioBitrate::Kbps96 => "6",
            AudioBitrate::Kbps64 => "8",
        }
    }
}

/// How much of a playlist a job covers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistScope {
    /// Only the single video named by the URL
    #[default]
    SingleVideo,
    /// Every entry in the playlist
    EntirePlaylist,
    /// A caller-chosen subset of 1-based playlist indices
    ItemSubset(Vec<u32>),
}

impl PlaylistScope {
    /// Whether this scope targets a playlist rather than one video
    pub fn is_playlist(&self) -> bool {
        !matches!(self, PlaylistScope::SingleVideo)
    }

    /// Render the index subset in the engine's `1,3,7` form.
    /// Returns `None` for non-subset scopes.
    pub fn item_spec(&self) -> Option<String> {
        match self {
            PlaylistScope::ItemSubset(indices) => Some(
                indices
                    .iter()
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        }
    }
}

/// Lifecycle state of the single active job
///
/// `Completed`, `Cancelled` and `Failed` are terminal; the orchestrator
/// releases its single-job slot when one of them is reached and a new job
/// requires a fresh plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    /// No job has started yet
    #[default]
    Idle,
    /// Fetching metadata only; no media bytes move
    ResolvingInfo,
    /// Paused for the caller to choose playlist entries
    AwaitingSelection,
    /// Media transfer in progress
    Downloading,
    /// Transcoding/merging via the external tool
    PostProcessing,
    /// Job finished successfully
    Completed,
    /// Job cancelled by the caller
    Cancelled,
    /// Job failed
    Failed {
        /// Classification of the failure
        kind: ErrorKind,
    },
}

impl JobState {
    /// Whether the state machine can make no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Cancelled | JobState::Failed { .. }
        )
    }
}

/// Terminal outcome of one download job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobResult {
    /// The job produced a local file
    Completed {
        /// Path to the downloaded (and possibly transcoded) file, when the
        /// engine reported one
        path: Option<PathBuf>,
        /// Resolved media title
        title: String,
    },
    /// The job was cancelled by the caller
    Cancelled,
    /// The job failed
    Failed {
        /// Classification of the failure
        kind: ErrorKind,
        /// Lowest-level message, preserved verbatim from the engine where
        /// one was involved
        message: String,
    },
}

/// Phase a progress snapshot belongs to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    /// Raw media transfer
    #[default]
    Downloading,
    /// Transcoding/merging
    PostProcessing,
}

/// Uniform progress model emitted during a job
///
/// All optional fields distinguish "not reported" from a measured zero.
/// `fraction` is monotone non-decreasing within one job's `Downloading`
/// phase; when it is `None` the UI should show an indeterminate indicator
/// rather than a stale percentage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Completed fraction in `0.0..=1.0`, or `None` when no total is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fraction: Option<f64>,

    /// Total size in bytes (exact or engine-estimated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_total: Option<u64>,

    /// Transfer speed in bytes per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_bps: Option<u64>,

    /// Estimated seconds to completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u32>,

    /// `(index, count)` for "item i of N" playlist reporting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_position: Option<(u32, u32)>,

    /// Which phase this snapshot belongs to
    pub phase: ProgressPhase,
}

/// Event emitted during the job lifecycle
///
/// Consumers subscribe via
/// [`JobOrchestrator::subscribe`](crate::orchestrator::JobOrchestrator::subscribe).
/// Reactions that may block must be handed off to the subscriber's own task;
/// events are delivered from the job worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job started and is resolving metadata
    Started {
        /// Canonical target URL
        url: String,
    },

    /// Metadata resolved; no media bytes have moved yet
    InfoResolved {
        /// Media or playlist title
        title: String,
        /// Channel/uploader, when reported
        #[serde(skip_serializing_if = "Option::is_none")]
        uploader: Option<String>,
        /// Number of playlist entries, when the target is a playlist
        #[serde(skip_serializing_if = "Option::is_none")]
        entry_count: Option<u32>,
    },

    /// The job is paused until the caller supplies playlist indices
    AwaitingSelection {
        /// Number of entries available for selection
        entry_count: u32,
    },

    /// Normalized progress update
    Progress(ProgressSnapshot),

    /// Transcoding/merging started
    PostProcessing,

    /// Job finished successfully
    Completed {
        /// Path to the produced file, when the engine reported one
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
        /// Resolved media title
        title: String,
    },

    /// Job cancelled by the caller
    Cancelled,

    /// Job failed
    Failed {
        /// Classification of the failure
        kind: ErrorKind,
        /// Verbatim lowest-level message
        message: String,
    },
}

/// Historical download record persisted by the settings store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Title of the completed download
    pub title: String,

    /// Completion timestamp (ISO-8601 in the durable document)
    pub date: DateTime<Utc>,
}
