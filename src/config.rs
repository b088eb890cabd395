//! Configuration types for tube-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Download output configuration (directory, naming templates)
///
/// Groups settings related to where downloads land and how files are named.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Output naming template for single videos (default: "%(title)s.%(ext)s")
    ///
    /// Placeholder tokens are interpreted by the extraction engine.
    #[serde(default = "default_output_template")]
    pub output_template: String,

    /// Output naming template for playlist downloads
    /// (default: "%(playlist_title)s/%(title)s.%(ext)s")
    #[serde(default = "default_playlist_template")]
    pub playlist_output_template: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            output_template: default_output_template(),
            playlist_output_template: default_playlist_template(),
        }
    }
}

/// Resilience settings handed to the extraction engine
///
/// These exist to reduce the chance of upstream throttling and geo blocks.
/// They are applied uniformly regardless of mode; the engine performs the
/// retries itself, the orchestrator never re-invokes it after a terminal
/// failure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Whole-download retry count (default: 10)
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Per-fragment retry count (default: 10)
    #[serde(default = "default_retries")]
    pub fragment_retries: u32,

    /// File-access retry count (default: 5)
    #[serde(default = "default_file_access_retries")]
    pub file_access_retries: u32,

    /// Socket timeout (default: 30 seconds)
    #[serde(default = "default_socket_timeout", with = "duration_serde")]
    pub socket_timeout: Duration,

    /// Minimum sleep between upstream requests (default: 1 second)
    #[serde(default = "default_sleep_interval", with = "duration_serde")]
    pub sleep_interval: Duration,

    /// Maximum sleep between upstream requests (default: 5 seconds)
    ///
    /// The actual pause is drawn uniformly from
    /// `sleep_interval..=max_sleep_interval`.
    #[serde(default = "default_max_sleep_interval", with = "duration_serde")]
    pub max_sleep_interval: Duration,

    /// Ask the engine to bypass geo restrictions (default: true)
    #[serde(default = "default_true")]
    pub geo_bypass: bool,

    /// Country code used for geo bypass (default: "US")
    #[serde(default = "default_geo_bypass_country")]
    pub geo_bypass_country: String,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            fragment_retries: default_retries(),
            file_access_retries: default_file_access_retries(),
            socket_timeout: default_socket_timeout(),
            sleep_interval: default_sleep_interval(),
            max_sleep_interval: default_max_sleep_interval(),
            geo_bypass: true,
            geo_bypass_country: default_geo_bypass_country(),
        }
    }
}

/// External tool locations (yt-dlp, ffmpeg)
///
/// Groups settings for the external binaries the orchestrator delegates to.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Path to the ffmpeg executable (auto-detected if None)
    ///
    /// Required whenever a plan transcodes: audio extraction, or merging
    /// separate video/audio streams into one container.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths are
    /// not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

/// Durable settings/history storage
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path of the JSON settings document (default: "./tube-dl.json")
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,

    /// Maximum number of history entries retained (default: 50)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
            history_limit: default_history_limit(),
        }
    }
}

/// Credential configuration
///
/// Inputs to the credential resolver; the fixed precedence order lives in
/// [`crate::credentials::resolve`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Explicitly selected cookie file (highest precedence when it exists)
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,

    /// Browser to extract cookies from (chrome, firefox, edge, opera, brave)
    #[serde(default)]
    pub cookie_browser: Option<String>,

    /// Bundled default cookie file used only when present on disk and no
    /// explicit source was chosen
    #[serde(default)]
    pub default_cookie_file: Option<PathBuf>,
}

/// Main configuration for the orchestrator
///
/// Constructed once at process start and threaded into each component's
/// constructor; no component reads ambient global state. Sub-config fields
/// are flattened so the JSON/TOML document stays un-nested.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output directory and naming templates
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Retry/pacing/geo-bypass settings handed to the engine
    #[serde(flatten)]
    pub resilience: ResilienceConfig,

    /// External binary locations
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Settings/history persistence
    #[serde(flatten)]
    pub persistence: PersistenceConfig,

    /// Credential inputs
    #[serde(flatten)]
    pub credentials: CredentialConfig,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_output_template() -> String {
    "%(title)s.%(ext)s".to_string()
}

fn default_playlist_template() -> String {
    "%(playlist_title)s/%(title)s.%(ext)s".to_string()
}

fn default_retries() -> u32 {
    10
}

fn default_file_access_retries() -> u32 {
    5
}

fn default_socket_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_sleep_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_sleep_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_geo_bypass_country() -> String {
    "US".to_string()
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("./tube-dl.json")
}

fn default_history_limit() -> usize {
    50
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
