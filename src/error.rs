//! Error types for tube-dl
//!
//! This module provides error handling for the library, including:
//! - The main [`Error`] enum used by all fallible operations
//! - The [`ErrorKind`] classification carried by terminal job results
//! - A crate-wide [`Result`] alias
//!
//! Every failure that originates in the external extraction engine keeps the
//! engine's own message text verbatim so callers can diagnose upstream
//! problems (rate limiting, geo blocks, locked cookie stores) without this
//! crate guessing at causes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for tube-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tube-dl
#[derive(Debug, Error)]
pub enum Error {
    /// The input string is not a recognizable media URL.
    /// Reported immediately; no job is created.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The URL names both a video and a playlist and the caller did not
    /// choose a scope. The resolver never guesses; no job is created.
    #[error("URL contains both a video and a playlist: an explicit scope is required")]
    AmbiguousScope,

    /// The selected credential source could not be used (browser cookie
    /// store locked, decryption failed, cookie file unreadable).
    /// There is no automatic fallback to a different source.
    #[error("credential source unavailable: {0}")]
    Credential(String),

    /// The extraction engine failed (network, geo restriction, rate limit,
    /// upstream change). The engine's message is preserved verbatim.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Transcoding failed or the transcoding tool could not be located.
    #[error("post-processing failed: {0}")]
    PostProcessing(String),

    /// A job is already active on this orchestrator. Exactly one job may
    /// run at a time; the active job is unaffected by the rejected start.
    #[error("a download job is already running")]
    JobAlreadyRunning,

    /// The job is not in a state that accepts the attempted operation
    /// (e.g. supplying a selection when nothing is awaiting one).
    #[error("cannot {operation}: {state}")]
    InvalidJobState {
        /// The operation that was attempted (e.g. "select items")
        operation: String,
        /// Why the current state rejected it
        state: String,
    },

    /// I/O error (output directory not writable, store unreadable, ...)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (settings store, engine metadata)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Classify this error for terminal job results and event payloads.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Error::AmbiguousScope => ErrorKind::AmbiguousScope,
            Error::Credential(_) => ErrorKind::CredentialUnavailable,
            Error::Extraction(_) => ErrorKind::ExtractionFailed,
            Error::PostProcessing(_) => ErrorKind::PostProcessingFailed,
            Error::JobAlreadyRunning | Error::InvalidJobState { .. } => {
                ErrorKind::JobAlreadyRunning
            }
            Error::Io(_) | Error::Serialization(_) => ErrorKind::FileSystemError,
        }
    }
}

/// Machine-readable failure classification
///
/// Carried by failed [`JobResult`](crate::types::JobResult)s and the
/// corresponding event so presentation layers can decide how to render a
/// failure without parsing message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input rejected by the URL classifier
    InvalidUrl,
    /// Video+playlist URL without an explicit scope choice
    AmbiguousScope,
    /// Selected cookie source locked or undecryptable
    CredentialUnavailable,
    /// Engine-level failure (network, geo, rate limit, upstream)
    ExtractionFailed,
    /// Transcoding tool missing or exited with an error
    PostProcessingFailed,
    /// Output path not writable or store I/O failed
    FileSystemError,
    /// Second start attempted while a job was active
    JobAlreadyRunning,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidUrl => "invalid_url",
            ErrorKind::AmbiguousScope => "ambiguous_scope",
            ErrorKind::CredentialUnavailable => "credential_unavailable",
            ErrorKind::ExtractionFailed => "extraction_failed",
            ErrorKind::PostProcessingFailed => "post_processing_failed",
            ErrorKind::FileSystemError => "file_system_error",
            ErrorKind::JobAlreadyRunning => "job_already_running",
        };
        write!(f, "{}", name)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classification_covers_engine_failures() {
        assert_eq!(
            Error::Extraction("HTTP Error 429".into()).kind(),
            ErrorKind::ExtractionFailed
        );
        assert_eq!(
            Error::PostProcessing("ffmpeg not found".into()).kind(),
            ErrorKind::PostProcessingFailed
        );
        assert_eq!(
            Error::Credential("cookie database is locked".into()).kind(),
            ErrorKind::CredentialUnavailable
        );
    }

    #[test]
    fn engine_message_is_preserved_verbatim() {
        let upstream = "ERROR: [youtube] dQw4w9WgXcQ: Sign in to confirm you're not a bot";
        let err = Error::Extraction(upstream.to_string());
        assert!(
            err.to_string().contains(upstream),
            "engine message must survive into Display output unchanged"
        );
    }

    #[test]
    fn io_errors_classify_as_file_system() {
        let err = Error::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(err.kind(), ErrorKind::FileSystemError);
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::PostProcessingFailed).unwrap();
        assert_eq!(json, "\"post_processing_failed\"");
    }
}
