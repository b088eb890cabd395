//! # tube-dl
//!
//! Backend library orchestrating yt-dlp based media downloads.
//!
//! ## Design Philosophy
//!
//! tube-dl is designed to be:
//! - **Engine-delegating** - format selection, network transfer and
//!   transcoding belong to yt-dlp/ffmpeg; this crate owns the lifecycle
//! - **Single-job** - exactly one download runs at a time, by design
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use tube_dl::{Config, JobOrchestrator, PlanRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = JobOrchestrator::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let handle = orchestrator
//!         .start("https://youtu.be/dQw4w9WgXcQ", PlanRequest::default())
//!         .await?;
//!     let result = handle.await?;
//!     println!("Result: {:?}", result);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Credential resolution
pub mod credentials;
/// Extraction engine abstraction and the yt-dlp implementation
pub mod engine;
/// Error types
pub mod error;
/// Single-job download orchestration
pub mod orchestrator;
/// Option resolution into immutable download plans
pub mod plan;
/// Progress normalization
pub mod progress;
/// Durable settings and download history
pub mod store;
/// Core types and events
pub mod types;
/// URL classification
pub mod url;

// Re-export commonly used types
pub use config::{
    Config, CredentialConfig, DownloadConfig, PersistenceConfig, ResilienceConfig, ToolsConfig,
};
pub use credentials::CredentialSource;
pub use engine::{ExtractionEngine, MediaInfo, YtDlpEngine};
pub use error::{Error, ErrorKind, Result};
pub use orchestrator::JobOrchestrator;
pub use plan::{DownloadPlan, PlanRequest};
pub use progress::ProgressAggregator;
pub use store::SettingsStore;
pub use types::{
    AudioBitrate, Event, HistoryEntry, JobResult, JobState, Mode, PlaylistScope, ProgressPhase,
    ProgressSnapshot, Quality,
};
pub use crate::url::{classify, UrlDescriptor, UrlKind};

/// Helper to run until a termination signal, then cancel the active job.
///
/// The cancel is cooperative; the function returns once the signal arrives,
/// and the job reaches `Cancelled` at its next engine callback.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use tube_dl::{Config, JobOrchestrator, cancel_on_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = JobOrchestrator::new(Config::default()).await?;
///     cancel_on_signal(orchestrator).await;
///     Ok(())
/// }
/// ```
pub async fn cancel_on_signal(orchestrator: JobOrchestrator) {
    wait_for_signal().await;
    orchestrator.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    // Signal registration may fail in restricted environments (containers,
    // tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
        }
        (Err(_), Err(_)) => {
            tracing::error!("could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl+C signal");
        }
    }
}
