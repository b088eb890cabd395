//! CLI-based extraction engine using the external yt-dlp binary
//!
//! All communication is line-oriented over the child's stdout: progress is
//! requested as machine-readable JSON via `--progress-template` with a
//! marker prefix, so progress lines separate cleanly from the tool's human
//! output. stderr is captured verbatim for failure classification.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use super::{
    DownloadHooks, DownloadOutcome, EngineLogger, EngineRequest, ExtractionEngine, HookDecision,
    MediaEntry, MediaInfo, PostProcessUpdate, ProgressStatus, ProgressUpdate, TracingEngineLogger,
};
use crate::config::ToolsConfig;
use crate::credentials::CredentialSource;
use crate::error::{Error, Result};
use crate::types::PlaylistScope;

const BINARY_NAME: &str = "yt-dlp";

/// Marker prefixes distinguishing machine progress lines from tool chatter
const DOWNLOAD_MARKER: &str = "__tubedl_dl__";
const POSTPROCESS_MARKER: &str = "__tubedl_pp__";

/// Extraction engine backed by an external `yt-dlp` process
pub struct YtDlpEngine {
    binary_path: PathBuf,
    logger: Arc<dyn EngineLogger>,
}

impl std::fmt::Debug for YtDlpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YtDlpEngine")
            .field("binary_path", &self.binary_path)
            .finish_non_exhaustive()
    }
}

impl YtDlpEngine {
    /// Create an engine with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            logger: Arc::new(TracingEngineLogger),
        }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which(BINARY_NAME).ok().map(Self::new)
    }

    /// Resolve the engine from configuration: the explicit path when set,
    /// otherwise a PATH search when allowed.
    ///
    /// # Errors
    ///
    /// [`Error::Extraction`] when no usable binary can be located.
    pub fn discover(tools: &ToolsConfig) -> Result<Self> {
        if let Some(path) = &tools.ytdlp_path {
            return Ok(Self::new(path.clone()));
        }
        if tools.search_path {
            if let Some(engine) = Self::from_path() {
                return Ok(engine);
            }
        }
        Err(Error::Extraction(format!(
            "{BINARY_NAME} executable not found (set an explicit path or install it on PATH)"
        )))
    }

    /// Replace the diagnostic sink (defaults to the tracing-backed logger).
    pub fn with_logger(mut self, logger: Arc<dyn EngineLogger>) -> Self {
        self.logger = logger;
        self
    }
}

#[async_trait]
impl ExtractionEngine for YtDlpEngine {
    async fn fetch_metadata(
        &self,
        url: &str,
        credentials: &CredentialSource,
    ) -> Result<MediaInfo> {
        let mut command = Command::new(&self.binary_path);
        command
            .arg("-J")
            .arg("--flat-playlist")
            .arg("--no-warnings")
            .args(credential_args(credentials))
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = command
            .output()
            .await
            .map_err(|e| Error::Extraction(format!("failed to execute {BINARY_NAME}: {e}")))?;

        if !output.status.success() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
        }

        parse_metadata_json(&String::from_utf8_lossy(&output.stdout))
    }

    async fn download(
        &self,
        request: &EngineRequest,
        hooks: &dyn DownloadHooks,
    ) -> Result<DownloadOutcome> {
        let args = build_download_args(request);
        tracing::debug!(binary = %self.binary_path.display(), ?args, "spawning download");

        let mut child = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Extraction(format!("failed to execute {BINARY_NAME}: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Extraction("child stdout was not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Extraction("child stderr was not captured".to_string()))?;

        // Drain stderr concurrently so the child never blocks on a full pipe
        let stderr_task = tokio::spawn(async move {
            let mut buffer = String::new();
            let _ = stderr.read_to_string(&mut buffer).await;
            buffer
        });

        let mut parser = OutputParser::default();
        let mut lines = BufReader::new(stdout).lines();
        let mut output_path = None;
        let mut aborted = false;

        while let Ok(Some(line)) = lines.next_line().await {
            let decision = match parser.parse_line(&line) {
                Some(ParsedLine::Progress(update)) => hooks.on_progress(&update),
                Some(ParsedLine::PostProcess(update)) => hooks.on_postprocess(&update),
                Some(ParsedLine::Destination(path)) => {
                    output_path = Some(path);
                    HookDecision::Continue
                }
                None => {
                    self.logger.debug(&line);
                    HookDecision::Continue
                }
            };
            if decision == HookDecision::Abort {
                aborted = true;
                child.kill().await.map_err(Error::Io)?;
                break;
            }
        }

        let status = child.wait().await.map_err(Error::Io)?;
        let stderr_text = stderr_task.await.unwrap_or_default();
        for line in stderr_text.lines().filter(|l| !l.trim().is_empty()) {
            self.logger.warning(line);
        }

        if aborted {
            return Ok(DownloadOutcome::Aborted);
        }
        if !status.success() {
            return Err(classify_failure(&stderr_text));
        }
        Ok(DownloadOutcome::Finished { output_path })
    }

    fn name(&self) -> &str {
        BINARY_NAME
    }
}

/// Render the full argument list for one download invocation. Pure; the
/// ordering is stable for tests.
fn build_download_args(request: &EngineRequest) -> Vec<String> {
    let mut args = vec![
        "-f".to_string(),
        request.format_selector.clone(),
        "-o".to_string(),
        request.output_template.display().to_string(),
        "--newline".to_string(),
        "--progress-template".to_string(),
        format!("download:{DOWNLOAD_MARKER}%(progress)j"),
        "--progress-template".to_string(),
        format!("postprocess:{POSTPROCESS_MARKER}%(progress)j"),
        "--retries".to_string(),
        request.resilience.retries.to_string(),
        "--fragment-retries".to_string(),
        request.resilience.fragment_retries.to_string(),
        "--file-access-retries".to_string(),
        request.resilience.file_access_retries.to_string(),
        "--socket-timeout".to_string(),
        request.resilience.socket_timeout.as_secs().to_string(),
        "--sleep-interval".to_string(),
        request.resilience.sleep_interval.as_secs().to_string(),
        "--max-sleep-interval".to_string(),
        request.resilience.max_sleep_interval.as_secs().to_string(),
    ];

    if request.resilience.geo_bypass {
        args.push("--geo-bypass-country".to_string());
        args.push(request.resilience.geo_bypass_country.clone());
    }

    args.extend(credential_args(&request.credentials));

    match &request.playlist {
        PlaylistScope::SingleVideo => args.push("--no-playlist".to_string()),
        PlaylistScope::EntirePlaylist => args.push("--yes-playlist".to_string()),
        PlaylistScope::ItemSubset(_) => {
            args.push("--yes-playlist".to_string());
            if let Some(spec) = request.playlist.item_spec() {
                args.push("--playlist-items".to_string());
                args.push(spec);
            }
        }
    }

    if let Some(bitrate) = request.audio_extract {
        args.push("-x".to_string());
        args.push("--audio-format".to_string());
        args.push("mp3".to_string());
        args.push("--audio-quality".to_string());
        args.push(bitrate.tier().to_string());
    } else if let Some(container) = &request.merge_output_format {
        args.push("--merge-output-format".to_string());
        args.push(container.clone());
    }

    if let Some(ffmpeg) = &request.ffmpeg_path {
        args.push("--ffmpeg-location".to_string());
        args.push(ffmpeg.display().to_string());
    }

    args.push(request.url.clone());
    args
}

fn credential_args(credentials: &CredentialSource) -> Vec<String> {
    match credentials {
        CredentialSource::None => Vec::new(),
        CredentialSource::CookieFile { path } => {
            vec!["--cookies".to_string(), path.display().to_string()]
        }
        CredentialSource::Browser { name } => {
            vec!["--cookies-from-browser".to_string(), name.clone()]
        }
    }
}

/// One recognized stdout line
#[derive(Debug, PartialEq)]
enum ParsedLine {
    Progress(ProgressUpdate),
    PostProcess(PostProcessUpdate),
    Destination(PathBuf),
}

/// Line-by-line stdout interpreter; stateless today but kept as a struct so
/// future multi-line constructs have somewhere to live.
#[derive(Debug, Default)]
struct OutputParser;

impl OutputParser {
    fn parse_line(&mut self, line: &str) -> Option<ParsedLine> {
        let line = line.trim();

        if let Some(json) = line.strip_prefix(DOWNLOAD_MARKER) {
            return parse_progress_json(json).map(ParsedLine::Progress);
        }
        if let Some(json) = line.strip_prefix(POSTPROCESS_MARKER) {
            return parse_postprocess_json(json).map(ParsedLine::PostProcess);
        }

        // Human-readable destination lines carry the output path
        if let Some(path) = line
            .strip_prefix("[download] Destination: ")
            .or_else(|| line.strip_prefix("[ExtractAudio] Destination: "))
        {
            return Some(ParsedLine::Destination(PathBuf::from(path)));
        }
        if let Some(rest) = line.strip_prefix("[Merger] Merging formats into \"") {
            let path = rest.trim_end_matches('"');
            return Some(ParsedLine::Destination(PathBuf::from(path)));
        }

        None
    }
}

/// Shape of the `%(progress)j` JSON object we consume. Numeric fields
/// arrive as floats; unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct RawProgress {
    status: Option<String>,
    downloaded_bytes: Option<f64>,
    total_bytes: Option<f64>,
    total_bytes_estimate: Option<f64>,
    speed: Option<f64>,
    eta: Option<f64>,
    info_dict: Option<RawProgressInfo>,
}

#[derive(Debug, Deserialize)]
struct RawProgressInfo {
    playlist_index: Option<u32>,
    n_entries: Option<u32>,
}

fn parse_progress_json(json: &str) -> Option<ProgressUpdate> {
    let raw: RawProgress = serde_json::from_str(json).ok()?;
    let status = match raw.status.as_deref() {
        Some("finished") => ProgressStatus::Finished,
        _ => ProgressStatus::Downloading,
    };
    let info = raw.info_dict;
    Some(ProgressUpdate {
        status,
        downloaded_bytes: raw.downloaded_bytes.unwrap_or(0.0).max(0.0) as u64,
        total_bytes: raw.total_bytes.filter(|t| *t > 0.0).map(|t| t as u64),
        total_bytes_estimate: raw.total_bytes_estimate.filter(|t| *t > 0.0).map(|t| t as u64),
        speed_bps: raw.speed.filter(|s| *s >= 0.0).map(|s| s as u64),
        eta_seconds: raw.eta.filter(|e| *e >= 0.0).map(|e| e as u32),
        playlist_index: info.as_ref().and_then(|i| i.playlist_index),
        playlist_count: info.as_ref().and_then(|i| i.n_entries),
    })
}

fn parse_postprocess_json(json: &str) -> Option<PostProcessUpdate> {
    let raw: RawProgress = serde_json::from_str(json).ok()?;
    match raw.status.as_deref() {
        Some("finished") => Some(PostProcessUpdate::Finished),
        Some(_) => Some(PostProcessUpdate::Started),
        None => None,
    }
}

/// Map the tool's stderr onto the error taxonomy, keeping the lowest-level
/// message verbatim. Classification sniffs well-known phrases only; anything
/// unrecognized stays a plain extraction failure.
fn classify_failure(stderr: &str) -> Error {
    let message = stderr
        .lines()
        .rev()
        .find(|line| line.trim_start().starts_with("ERROR"))
        .unwrap_or_else(|| stderr.trim())
        .trim()
        .to_string();
    let message = if message.is_empty() {
        format!("{BINARY_NAME} exited with a failure status and no diagnostics")
    } else {
        message
    };

    let lowered = stderr.to_ascii_lowercase();
    if lowered.contains("cookie database")
        || lowered.contains("dpapi")
        || lowered.contains("decrypt")
    {
        return Error::Credential(message);
    }
    if lowered.contains("postprocess") || lowered.contains("ffmpeg") {
        return Error::PostProcessing(message);
    }
    Error::Extraction(message)
}

/// Parse the `-J` metadata document into [`MediaInfo`].
fn parse_metadata_json(json: &str) -> Result<MediaInfo> {
    let value: serde_json::Value = serde_json::from_str(json)?;

    let title = value
        .get("title")
        .and_then(|t| t.as_str())
        .unwrap_or("(untitled)")
        .to_string();
    let uploader = value
        .get("uploader")
        .or_else(|| value.get("channel"))
        .and_then(|u| u.as_str())
        .map(str::to_string);

    let entries = match value.get("entries").and_then(|e| e.as_array()) {
        Some(raw_entries) => raw_entries
            .iter()
            .map(|entry| MediaEntry {
                title: entry
                    .get("title")
                    .and_then(|t| t.as_str())
                    .map(str::to_string),
                id: entry.get("id").and_then(|i| i.as_str()).map(str::to_string),
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(MediaInfo {
        title,
        uploader,
        duration_seconds: value
            .get("duration")
            .and_then(|d| d.as_f64())
            .map(|d| d as u64),
        entries,
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResilienceConfig;
    use crate::error::ErrorKind;
    use crate::types::AudioBitrate;

    fn request() -> EngineRequest {
        EngineRequest {
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            format_selector: "bestvideo+bestaudio/best".to_string(),
            output_template: PathBuf::from("./downloads/%(title)s.%(ext)s"),
            audio_extract: None,
            merge_output_format: Some("mp4".to_string()),
            playlist: PlaylistScope::SingleVideo,
            credentials: CredentialSource::None,
            resilience: ResilienceConfig::default(),
            ffmpeg_path: None,
        }
    }

    fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn download_args_carry_resilience_settings() {
        let args = build_download_args(&request());
        assert_eq!(arg_value(&args, "--retries"), Some("10"));
        assert_eq!(arg_value(&args, "--fragment-retries"), Some("10"));
        assert_eq!(arg_value(&args, "--file-access-retries"), Some("5"));
        assert_eq!(arg_value(&args, "--socket-timeout"), Some("30"));
        assert_eq!(arg_value(&args, "--sleep-interval"), Some("1"));
        assert_eq!(arg_value(&args, "--max-sleep-interval"), Some("5"));
        assert_eq!(arg_value(&args, "--geo-bypass-country"), Some("US"));
        assert_eq!(args.last().map(String::as_str), Some(request().url.as_str()));
    }

    #[test]
    fn single_video_scope_disables_playlist_expansion() {
        let args = build_download_args(&request());
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(!args.contains(&"--yes-playlist".to_string()));
    }

    #[test]
    fn item_subset_renders_playlist_items_spec() {
        let mut req = request();
        req.playlist = PlaylistScope::ItemSubset(vec![1, 3, 7]);
        let args = build_download_args(&req);
        assert!(args.contains(&"--yes-playlist".to_string()));
        assert_eq!(arg_value(&args, "--playlist-items"), Some("1,3,7"));
    }

    #[test]
    fn audio_extraction_replaces_merge_format() {
        let mut req = request();
        req.audio_extract = Some(AudioBitrate::Kbps192);
        req.merge_output_format = None;
        let args = build_download_args(&req);
        assert!(args.contains(&"-x".to_string()));
        assert_eq!(arg_value(&args, "--audio-format"), Some("mp3"));
        assert_eq!(arg_value(&args, "--audio-quality"), Some("2"));
        assert!(!args.contains(&"--merge-output-format".to_string()));
    }

    #[test]
    fn credential_args_render_per_source() {
        assert!(credential_args(&CredentialSource::None).is_empty());
        assert_eq!(
            credential_args(&CredentialSource::CookieFile {
                path: PathBuf::from("/tmp/cookies.txt")
            }),
            vec!["--cookies".to_string(), "/tmp/cookies.txt".to_string()]
        );
        assert_eq!(
            credential_args(&CredentialSource::Browser {
                name: "firefox".to_string()
            }),
            vec![
                "--cookies-from-browser".to_string(),
                "firefox".to_string()
            ]
        );
    }

    #[test]
    fn progress_line_parses_into_update() {
        let mut parser = OutputParser::default();
        let line = format!(
            "{DOWNLOAD_MARKER}{}",
            r#"{"status":"downloading","downloaded_bytes":1024.0,"total_bytes":4096.0,"speed":512.5,"eta":6,"info_dict":{"playlist_index":2,"n_entries":9}}"#
        );
        let parsed = parser.parse_line(&line).unwrap();
        assert_eq!(
            parsed,
            ParsedLine::Progress(ProgressUpdate {
                status: ProgressStatus::Downloading,
                downloaded_bytes: 1024,
                total_bytes: Some(4096),
                total_bytes_estimate: None,
                speed_bps: Some(512),
                eta_seconds: Some(6),
                playlist_index: Some(2),
                playlist_count: Some(9),
            })
        );
    }

    #[test]
    fn missing_totals_stay_unknown() {
        let mut parser = OutputParser::default();
        let line = format!(
            "{DOWNLOAD_MARKER}{}",
            r#"{"status":"downloading","downloaded_bytes":2048.0}"#
        );
        match parser.parse_line(&line).unwrap() {
            ParsedLine::Progress(update) => {
                assert_eq!(update.total_bytes, None);
                assert_eq!(update.total_bytes_estimate, None);
                assert_eq!(update.speed_bps, None, "absent speed must not become 0");
            }
            other => panic!("expected progress line, got {other:?}"),
        }
    }

    #[test]
    fn postprocess_lines_parse_into_phase_updates() {
        let mut parser = OutputParser::default();
        let started = format!("{POSTPROCESS_MARKER}{}", r#"{"status":"started"}"#);
        let finished = format!("{POSTPROCESS_MARKER}{}", r#"{"status":"finished"}"#);
        assert_eq!(
            parser.parse_line(&started),
            Some(ParsedLine::PostProcess(PostProcessUpdate::Started))
        );
        assert_eq!(
            parser.parse_line(&finished),
            Some(ParsedLine::PostProcess(PostProcessUpdate::Finished))
        );
    }

    #[test]
    fn destination_lines_capture_output_path() {
        let mut parser = OutputParser::default();
        assert_eq!(
            parser.parse_line("[download] Destination: downloads/song.webm"),
            Some(ParsedLine::Destination(PathBuf::from(
                "downloads/song.webm"
            )))
        );
        assert_eq!(
            parser.parse_line("[Merger] Merging formats into \"downloads/video.mp4\""),
            Some(ParsedLine::Destination(PathBuf::from(
                "downloads/video.mp4"
            )))
        );
        assert_eq!(
            parser.parse_line("[ExtractAudio] Destination: downloads/song.mp3"),
            Some(ParsedLine::Destination(PathBuf::from("downloads/song.mp3")))
        );
    }

    #[test]
    fn chatter_lines_are_ignored() {
        let mut parser = OutputParser::default();
        assert_eq!(parser.parse_line("[youtube] dQw4w9WgXcQ: Downloading webpage"), None);
        assert_eq!(parser.parse_line(""), None);
    }

    #[test]
    fn cookie_failures_classify_as_credential_errors() {
        let stderr = "ERROR: Could not copy Chrome cookie database to temporary directory";
        let err = classify_failure(stderr);
        assert_eq!(err.kind(), ErrorKind::CredentialUnavailable);
        assert!(
            err.to_string().contains("cookie database"),
            "lowest-level message must survive verbatim: {err}"
        );

        let err = classify_failure("ERROR: Failed to decrypt with DPAPI");
        assert_eq!(err.kind(), ErrorKind::CredentialUnavailable);
    }

    #[test]
    fn ffmpeg_failures_classify_as_postprocessing_errors() {
        let err = classify_failure("ERROR: ffmpeg exited with code 1");
        assert_eq!(err.kind(), ErrorKind::PostProcessingFailed);
        let err = classify_failure("ERROR: Postprocessing: audio conversion failed");
        assert_eq!(err.kind(), ErrorKind::PostProcessingFailed);
    }

    #[test]
    fn unknown_failures_classify_as_extraction_errors() {
        let err = classify_failure("ERROR: Video unavailable");
        assert_eq!(err.kind(), ErrorKind::ExtractionFailed);
        assert_eq!(err.to_string(), "extraction failed: ERROR: Video unavailable");
    }

    #[test]
    fn metadata_json_parses_single_video() {
        let json = r#"{"title":"Never Gonna Give You Up","uploader":"Rick Astley","duration":212.0}"#;
        let info = parse_metadata_json(json).unwrap();
        assert_eq!(info.title, "Never Gonna Give You Up");
        assert_eq!(info.uploader.as_deref(), Some("Rick Astley"));
        assert_eq!(info.duration_seconds, Some(212));
        assert_eq!(info.entry_count(), None);
    }

    #[test]
    fn metadata_json_parses_flat_playlist() {
        let json = r#"{
            "title": "Mix tape",
            "uploader": "someone",
            "_type": "playlist",
            "entries": [
                {"id": "aaaaaaaaaaa", "title": "first"},
                {"id": "bbbbbbbbbbb", "title": "second"},
                {"id": "ccccccccccc"}
            ]
        }"#;
        let info = parse_metadata_json(json).unwrap();
        assert_eq!(info.entry_count(), Some(3));
        assert_eq!(info.entries[0].title.as_deref(), Some("first"));
        assert_eq!(info.entries[2].title, None);
    }

    #[test]
    fn discover_prefers_explicit_path_over_search() {
        let tools = ToolsConfig {
            ytdlp_path: Some(PathBuf::from("/opt/tools/yt-dlp")),
            ffmpeg_path: None,
            search_path: true,
        };
        let engine = YtDlpEngine::discover(&tools).unwrap();
        assert_eq!(engine.binary_path, PathBuf::from("/opt/tools/yt-dlp"));
    }

    #[test]
    fn discover_fails_when_search_disabled_and_no_path_set() {
        let tools = ToolsConfig {
            ytdlp_path: None,
            ffmpeg_path: None,
            search_path: false,
        };
        let err = YtDlpEngine::discover(&tools).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExtractionFailed);
    }
}
