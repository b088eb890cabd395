//! Credential resolution
//!
//! Selects which authentication material to hand to the extraction engine.
//! Resolution only states *intent*: whether the resolved source is actually
//! usable (browser store locked, cookie decryption failing) surfaces later,
//! when the engine is invoked, as
//! [`Error::Credential`](crate::error::Error::Credential).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::CredentialConfig;

/// Browsers the engine can extract cookies from
pub const SUPPORTED_BROWSERS: &[&str] = &["chrome", "firefox", "edge", "opera", "brave"];

/// Authentication material handed to the extraction engine
///
/// Exactly one source is resolved per job.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CredentialSource {
    /// No credentials
    #[default]
    None,
    /// Cookies read from a Netscape-format cookie file
    CookieFile {
        /// Path to the cookie file
        path: PathBuf,
    },
    /// Cookies extracted from a browser's own store
    Browser {
        /// Normalized browser name (see [`SUPPORTED_BROWSERS`])
        name: String,
    },
}

/// Whether a browser name is one the engine can extract cookies from
pub fn is_supported_browser(name: &str) -> bool {
    SUPPORTED_BROWSERS.contains(&name.to_ascii_lowercase().as_str())
}

/// Resolve the credential source for a job.
///
/// Precedence, highest first:
/// 1. an explicitly selected cookie file that exists on disk
/// 2. a supported named-browser extraction request
/// 3. a bundled default cookie file, if present on disk
/// 4. none
///
/// A missing explicit file falls through rather than silently substituting
/// the default file; an unsupported browser name likewise falls through.
/// Deterministic given its inputs and the two file-existence probes; never
/// touches the network.
pub fn resolve(
    explicit_file: Option<&Path>,
    explicit_browser: Option<&str>,
    default_file: Option<&Path>,
) -> CredentialSource {
    if let Some(path) = explicit_file {
        if path.is_file() {
            return CredentialSource::CookieFile {
                path: path.to_path_buf(),
            };
        }
        tracing::warn!(path = %path.display(), "selected cookie file not found, ignoring");
    }

    if let Some(name) = explicit_browser {
        if is_supported_browser(name) {
            return CredentialSource::Browser {
                name: name.to_ascii_lowercase(),
            };
        }
        tracing::warn!(browser = name, "unsupported cookie browser, ignoring");
    }

    if let Some(path) = default_file {
        if path.is_file() {
            return CredentialSource::CookieFile {
                path: path.to_path_buf(),
            };
        }
    }

    CredentialSource::None
}

/// Resolve from the credential section of the configuration.
pub fn resolve_from_config(config: &CredentialConfig) -> CredentialSource {
    resolve(
        config.cookie_file.as_deref(),
        config.cookie_browser.as_deref(),
        config.default_cookie_file.as_deref(),
    )
}
