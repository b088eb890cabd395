//! Option resolution
//!
//! Combines a classified URL, the caller's mode/quality/scope choices, the
//! resolved credential source and the configuration into an immutable
//! [`DownloadPlan`]. A plan is constructed once per job and never mutated; a
//! retry means building a new plan and starting a new job.

use std::path::PathBuf;

use crate::config::{Config, ResilienceConfig};
use crate::credentials::CredentialSource;
use crate::error::{Error, Result};
use crate::types::{AudioBitrate, Mode, PlaylistScope, Quality};
use crate::url::{self, UrlDescriptor, UrlKind};

/// Caller-chosen options for one job
#[derive(Clone, Debug, Default)]
pub struct PlanRequest {
    /// Video or audio download
    pub mode: Mode,

    /// Requested quality (a mismatched selector for the mode falls back to
    /// the mode's default)
    pub quality: Quality,

    /// Explicit playlist scope. Required when the URL names both a video
    /// and a playlist; defaulted otherwise.
    pub scope: Option<PlaylistScope>,

    /// Pause the job after metadata resolution so the caller can pick
    /// playlist entries interactively. Ignored for single-video targets and
    /// for plans that already carry an explicit item subset.
    pub interactive: bool,
}

/// Immutable description of everything one job needs
///
/// Holds the concrete extraction+download intent: the canonical target URL,
/// the rendered format selector, resilience settings, credentials and output
/// naming. Engine-agnostic; the translation into the engine's configuration
/// bundle happens at the engine boundary.
#[derive(Clone, Debug)]
pub struct DownloadPlan {
    /// Canonical target URL handed to the engine
    pub url: String,

    /// Video or audio download
    pub mode: Mode,

    /// Format-selector expression with fallback alternation
    pub format_selector: String,

    /// Target mp3 bitrate for the conversion step (audio mode only)
    pub audio_bitrate: Option<AudioBitrate>,

    /// How much of a playlist this job covers
    pub scope: PlaylistScope,

    /// Retry/pacing/geo-bypass settings embedded for the engine
    pub resilience: ResilienceConfig,

    /// Authentication material for the engine
    pub credentials: CredentialSource,

    /// Directory downloads land in
    pub output_dir: PathBuf,

    /// Output naming template (already playlist-aware)
    pub output_template: String,

    /// Set when a radio/mix playlist was narrowed to its single video;
    /// presentation layers should tell the user why the playlist was not
    /// downloaded
    pub radio_mix_advisory: bool,

    /// Whether the job pauses in `AwaitingSelection` after metadata
    pub interactive_selection: bool,
}

impl DownloadPlan {
    /// Whether this plan hard-requires the transcoding tool before any
    /// media bytes move. Video merges may also invoke the tool, but only
    /// the audio conversion step is known to need it up front.
    pub fn requires_transcode(&self) -> bool {
        self.mode == Mode::Audio
    }
}

/// Resolve a raw URL and caller options into a [`DownloadPlan`].
///
/// # Errors
///
/// - [`Error::InvalidUrl`] when the classifier rejects the input (no job is
///   created)
/// - [`Error::AmbiguousScope`] when the URL names both a video and a
///   playlist and `request.scope` is `None`; the resolver never guesses
pub fn resolve(
    raw_url: &str,
    request: PlanRequest,
    credentials: CredentialSource,
    config: &Config,
) -> Result<DownloadPlan> {
    let descriptor = url::classify(raw_url);
    let (target_url, scope, radio_mix_advisory) = resolve_target(raw_url, &descriptor, &request)?;

    let (format_selector, audio_bitrate) = match request.mode {
        Mode::Video => (render_video_selector(request.quality), None),
        Mode::Audio => {
            let bitrate = match request.quality {
                Quality::Bitrate(bitrate) => bitrate,
                // Height caps make no sense for audio; Best and mismatches
                // both take the default tier.
                _ => AudioBitrate::default(),
            };
            ("bestaudio/best".to_string(), Some(bitrate))
        }
    };

    let output_template = if scope.is_playlist() {
        config.download.playlist_output_template.clone()
    } else {
        config.download.output_template.clone()
    };

    let interactive_selection =
        request.interactive && scope.is_playlist() && scope.item_spec().is_none();

    if radio_mix_advisory {
        tracing::info!(
            url = %target_url,
            "radio/mix playlist cannot be downloaded as a playlist, narrowing to single video"
        );
    }

    Ok(DownloadPlan {
        url: target_url,
        mode: request.mode,
        format_selector,
        audio_bitrate,
        scope,
        resilience: config.resilience.clone(),
        credentials,
        output_dir: config.download.download_dir.clone(),
        output_template,
        radio_mix_advisory,
        interactive_selection,
    })
}

/// Decide the canonical target URL and effective scope for a descriptor.
fn resolve_target(
    raw_url: &str,
    descriptor: &UrlDescriptor,
    request: &PlanRequest,
) -> Result<(String, PlaylistScope, bool)> {
    match descriptor.kind {
        UrlKind::Invalid => Err(Error::InvalidUrl(raw_url.trim().to_string())),

        UrlKind::RadioMix => {
            // Auto-generated per-viewer playlist: only the named video is
            // stable. Scope is forced regardless of the caller's choice.
            let video_id = descriptor.video_id.as_deref().ok_or_else(|| {
                Error::InvalidUrl(format!(
                    "radio/mix playlist without a video id is not downloadable: {}",
                    raw_url.trim()
                ))
            })?;
            Ok((url::watch_url(video_id), PlaylistScope::SingleVideo, true))
        }

        UrlKind::VideoAndPlaylist => {
            let scope = request.scope.clone().ok_or(Error::AmbiguousScope)?;
            let target = match &scope {
                PlaylistScope::SingleVideo => match descriptor.video_id.as_deref() {
                    Some(id) => url::watch_url(id),
                    None => raw_url.trim().to_string(),
                },
                _ => match descriptor.playlist_id.as_deref() {
                    Some(id) => url::playlist_url(id),
                    None => raw_url.trim().to_string(),
                },
            };
            Ok((target, scope, false))
        }

        UrlKind::Playlist => {
            // A pure playlist URL has nothing to narrow to; a requested
            // SingleVideo scope is meaningless here and defaults away.
            let scope = request
                .scope
                .clone()
                .filter(PlaylistScope::is_playlist)
                .unwrap_or(PlaylistScope::EntirePlaylist);
            let target = match descriptor.playlist_id.as_deref() {
                Some(id) => url::playlist_url(id),
                None => raw_url.trim().to_string(),
            };
            Ok((target, scope, false))
        }

        UrlKind::Video => {
            let target = match descriptor.video_id.as_deref() {
                Some(id) => url::watch_url(id),
                None => raw_url.trim().to_string(),
            };
            Ok((target, PlaylistScope::SingleVideo, false))
        }
    }
}

/// Render the video format selector with its fallback ordering:
/// bounded-height combined stream, then best available at or below the
/// bound, then best available unconditionally.
fn render_video_selector(quality: Quality) -> String {
    match quality {
        Quality::Height(h) => {
            format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]/best")
        }
        // Bitrate tiers belong to audio mode; treat as Best here.
        Quality::Best | Quality::Bitrate(_) => "bestvideo+bestaudio/best".to_string(),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn video_request(quality: Quality) -> PlanRequest {
        PlanRequest {
            mode: Mode::Video,
            quality,
            scope: None,
            interactive: false,
        }
    }

    #[test]
    fn single_video_url_resolves_to_canonical_watch_url() {
        let plan = resolve(
            "https://youtu.be/dQw4w9WgXcQ",
            video_request(Quality::Best),
            CredentialSource::None,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(plan.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(plan.scope, PlaylistScope::SingleVideo);
        assert_eq!(plan.format_selector, "bestvideo+bestaudio/best");
        assert!(!plan.radio_mix_advisory);
    }

    #[test]
    fn height_cap_never_renders_a_larger_bound() {
        for cap in [2160u32, 1440, 1080, 720, 480, 360] {
            let plan = resolve(
                "https://youtu.be/dQw4w9WgXcQ",
                video_request(Quality::Height(cap)),
                CredentialSource::None,
                &Config::default(),
            )
            .unwrap();

            let bound_re = regex::Regex::new(r"height<=(\d+)").unwrap();
            for caps in bound_re.captures_iter(&plan.format_selector) {
                let bound: u32 = caps[1].parse().unwrap();
                assert!(
                    bound <= cap,
                    "selector {} contains bound {} above cap {}",
                    plan.format_selector,
                    bound,
                    cap
                );
            }
            // The deliberate final fallback widens to unconstrained best.
            assert!(plan.format_selector.ends_with("/best"));
        }
    }

    #[test]
    fn audio_mode_requests_best_audio_with_bitrate_tier() {
        let plan = resolve(
            "https://youtu.be/dQw4w9WgXcQ",
            PlanRequest {
                mode: Mode::Audio,
                quality: Quality::Bitrate(AudioBitrate::from_kbps(192)),
                scope: None,
                interactive: false,
            },
            CredentialSource::None,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(plan.format_selector, "bestaudio/best");
        assert_eq!(plan.audio_bitrate.unwrap().tier(), "2");
        assert!(plan.requires_transcode());
    }

    #[test]
    fn audio_mode_with_height_quality_falls_back_to_best_tier() {
        let plan = resolve(
            "https://youtu.be/dQw4w9WgXcQ",
            PlanRequest {
                mode: Mode::Audio,
                quality: Quality::Height(720),
                scope: None,
                interactive: false,
            },
            CredentialSource::None,
            &Config::default(),
        )
        .unwrap();
        assert_eq!(plan.audio_bitrate, Some(AudioBitrate::Kbps320));
    }

    #[test]
    fn radio_mix_forces_single_video_scope_with_advisory() {
        let plan = resolve(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=RDdQw4w9WgXcQ",
            PlanRequest {
                mode: Mode::Video,
                quality: Quality::Best,
                scope: Some(PlaylistScope::EntirePlaylist),
                interactive: false,
            },
            CredentialSource::None,
            &Config::default(),
        )
        .unwrap();

        assert_eq!(plan.scope, PlaylistScope::SingleVideo);
        assert!(plan.radio_mix_advisory);
        assert_eq!(plan.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn radio_mix_without_video_id_is_invalid() {
        let err = resolve(
            "https://www.youtube.com/playlist?list=RDxyz",
            video_request(Quality::Best),
            CredentialSource::None,
            &Config::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    }

    #[test]
    fn video_and_playlist_without_scope_is_ambiguous() {
        let err = resolve(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLabc123xyz",
            video_request(Quality::Best),
            CredentialSource::None,
            &Config::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousScope);
    }

    #[test]
    fn video_and_playlist_with_explicit_scope_rewrites_target() {
        let raw = "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLabc123xyz";

        let single = resolve(
            raw,
            PlanRequest {
                scope: Some(PlaylistScope::SingleVideo),
                ..video_request(Quality::Best)
            },
            CredentialSource::None,
            &Config::default(),
        )
        .unwrap();
        assert_eq!(single.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");

        let playlist = resolve(
            raw,
            PlanRequest {
                scope: Some(PlaylistScope::EntirePlaylist),
                ..video_request(Quality::Best)
            },
            CredentialSource::None,
            &Config::default(),
        )
        .unwrap();
        assert_eq!(
            playlist.url,
            "https://www.youtube.com/playlist?list=PLabc123xyz"
        );
        assert_eq!(
            playlist.output_template,
            "%(playlist_title)s/%(title)s.%(ext)s",
            "playlist scope switches to the playlist-aware template"
        );
    }

    #[test]
    fn invalid_url_creates_no_plan() {
        let err = resolve(
            "https://vimeo.com/12345",
            video_request(Quality::Best),
            CredentialSource::None,
            &Config::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    }

    #[test]
    fn interactive_selection_only_applies_to_open_playlist_scopes() {
        let raw = "https://www.youtube.com/playlist?list=PLabc123xyz";

        let open = resolve(
            raw,
            PlanRequest {
                interactive: true,
                ..video_request(Quality::Best)
            },
            CredentialSource::None,
            &Config::default(),
        )
        .unwrap();
        assert!(open.interactive_selection);

        // An explicit subset skips the interactive pause
        let subset = resolve(
            raw,
            PlanRequest {
                scope: Some(PlaylistScope::ItemSubset(vec![1, 2])),
                interactive: true,
                ..video_request(Quality::Best)
            },
            CredentialSource::None,
            &Config::default(),
        )
        .unwrap();
        assert!(!subset.interactive_selection);

        // Single videos never pause
        let single = resolve(
            "https://youtu.be/dQw4w9WgXcQ",
            PlanRequest {
                interactive: true,
                ..video_request(Quality::Best)
            },
            CredentialSource::None,
            &Config::default(),
        )
        .unwrap();
        assert!(!single.interactive_selection);
    }
}
