//! URL classification
//!
//! Pure string analysis: no network access occurs here. A raw input string
//! is parsed into a typed [`UrlDescriptor`] naming the video and/or playlist
//! it refers to, or rejected as [`UrlKind::Invalid`].

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Reserved playlist-id prefix marking an auto-generated radio/mix playlist.
/// Radio playlists are generated per viewer and cannot be downloaded as a
/// stable ordered collection.
pub const RADIO_PLAYLIST_PREFIX: &str = "RD";

/// Length of a video id token
const VIDEO_ID_LEN: usize = 11;

/// Hosts accepted by the classifier
const KNOWN_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
];

/// What a classified URL refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrlKind {
    /// A single video
    Video,
    /// A playlist with no specific video
    Playlist,
    /// Both a video and a playlist; the caller must choose a scope
    VideoAndPlaylist,
    /// An auto-generated radio/mix playlist; only the named video is
    /// downloadable
    RadioMix,
    /// Not a recognizable media URL
    Invalid,
}

/// Typed result of classifying a raw URL string
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlDescriptor {
    /// What the URL refers to
    pub kind: UrlKind,
    /// Video id, when one could be extracted
    pub video_id: Option<String>,
    /// Playlist id, when one could be extracted (including radio ids)
    pub playlist_id: Option<String>,
}

impl UrlDescriptor {
    fn invalid() -> Self {
        Self {
            kind: UrlKind::Invalid,
            video_id: None,
            playlist_id: None,
        }
    }
}

/// Classify a raw input string into a [`UrlDescriptor`].
///
/// Accepted shapes: a bare 11-character video id, or a recognized host with
/// a path. Video and playlist ids are extracted independently; either, both,
/// or neither may be present. A playlist id with the reserved
/// [`RADIO_PLAYLIST_PREFIX`] always classifies as [`UrlKind::RadioMix`],
/// never as a downloadable playlist.
pub fn classify(input: &str) -> UrlDescriptor {
    let input = input.trim();
    if input.is_empty() {
        return UrlDescriptor::invalid();
    }

    // Bare video id form
    if is_video_id(input) {
        return UrlDescriptor {
            kind: UrlKind::Video,
            video_id: Some(input.to_string()),
            playlist_id: None,
        };
    }

    let url = match parse_lenient(input) {
        Some(url) => url,
        None => return UrlDescriptor::invalid(),
    };

    let host = match url.host_str() {
        Some(host) if KNOWN_HOSTS.contains(&host.to_ascii_lowercase().as_str()) => {
            host.to_ascii_lowercase()
        }
        _ => return UrlDescriptor::invalid(),
    };

    // A recognized host still needs a path to refer to anything
    if url.path() == "/" && url.query().is_none() {
        return UrlDescriptor::invalid();
    }

    let video_id = extract_video_id(&url, &host);
    let playlist_id = extract_playlist_id(&url);

    let kind = match (&video_id, &playlist_id) {
        (_, Some(list)) if list.starts_with(RADIO_PLAYLIST_PREFIX) => UrlKind::RadioMix,
        (Some(_), Some(_)) => UrlKind::VideoAndPlaylist,
        (None, Some(_)) => UrlKind::Playlist,
        // A recognized host with a path but no extractable ids is handed to
        // the engine as-is, treated as a single video target.
        _ => UrlKind::Video,
    };

    UrlDescriptor {
        kind,
        video_id,
        playlist_id,
    }
}

/// Canonical watch URL for a video id
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Canonical playlist URL for a playlist id
pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={}", playlist_id)
}

/// Parse with an implied https scheme for scheme-less inputs.
fn parse_lenient(input: &str) -> Option<Url> {
    if input.starts_with("http://") || input.starts_with("https://") {
        Url::parse(input).ok()
    } else if input.contains('.') && !input.contains("://") {
        Url::parse(&format!("https://{}", input)).ok()
    } else {
        None
    }
}

fn is_video_id(token: &str) -> bool {
    token.len() == VIDEO_ID_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[allow(clippy::expect_used)]
fn video_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^/(?:embed|v|shorts)/([A-Za-z0-9_-]{11})").expect("static pattern is valid")
    })
}

fn extract_video_id(url: &Url, host: &str) -> Option<String> {
    // Short-link form: the id is the first path segment
    if host == "youtu.be" {
        let candidate = url.path().trim_start_matches('/');
        let candidate = candidate.split('/').next().unwrap_or_default();
        return is_video_id(candidate).then(|| candidate.to_string());
    }

    // watch?v=<id>
    if let Some((_, value)) = url.query_pairs().find(|(key, _)| key == "v") {
        if is_video_id(&value) {
            return Some(value.into_owned());
        }
    }

    // /embed/<id>, /v/<id>, /shorts/<id>
    video_path_re()
        .captures(url.path())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_playlist_id(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "list")
        .map(|(_, value)| value.into_owned())
        .filter(|id| {
            !id.is_empty()
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}
