//! Durable settings and download history
//!
//! One small JSON document holds the last-used credential choice, the
//! download folder and a bounded most-recent-first history list. Writes go
//! through a temp file in the same directory followed by a rename, so a
//! crash mid-write never leaves a torn document behind.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::credentials::CredentialSource;
use crate::error::Result;
use crate::types::HistoryEntry;

/// Persisted document shape
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoredSettings {
    /// Last-used credential source
    #[serde(default)]
    pub cookie_source: CredentialSource,

    /// Last explicitly selected cookie file
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,

    /// Last-used download folder
    #[serde(default)]
    pub download_folder: Option<PathBuf>,

    /// Completed downloads, most recent first
    #[serde(default)]
    pub download_history: Vec<HistoryEntry>,
}

/// Settings store bound to one JSON file
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    history_limit: usize,
    settings: StoredSettings,
}

impl SettingsStore {
    /// Open the store, reading the document at `path` when it exists.
    ///
    /// A missing file is not an error: the store starts from defaults and
    /// the file appears on the first write.
    pub fn open(path: impl Into<PathBuf>, history_limit: usize) -> Result<Self> {
        let path = path.into();
        let settings = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredSettings::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            history_limit,
            settings,
        })
    }

    /// Current document contents.
    pub fn settings(&self) -> &StoredSettings {
        &self.settings
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a completed download and persist.
    ///
    /// Entries are most-recent-first, capped at the configured limit; a
    /// title identical to the current head is not duplicated.
    pub fn record_download(&mut self, title: &str) -> Result<()> {
        let duplicate_of_head = self
            .settings
            .download_history
            .first()
            .is_some_and(|head| head.title == title);
        if !duplicate_of_head {
            self.settings.download_history.insert(
                0,
                HistoryEntry {
                    title: title.to_string(),
                    date: Utc::now(),
                },
            );
            self.settings.download_history.truncate(self.history_limit);
        }
        self.write()
    }

    /// Update the remembered credential choice and persist.
    pub fn set_cookie_source(&mut self, source: CredentialSource) -> Result<()> {
        if let CredentialSource::CookieFile { path } = &source {
            self.settings.cookie_file = Some(path.clone());
        }
        self.settings.cookie_source = source;
        self.write()
    }

    /// Update the remembered download folder and persist.
    pub fn set_download_folder(&mut self, folder: impl Into<PathBuf>) -> Result<()> {
        self.settings.download_folder = Some(folder.into());
        self.write()
    }

    /// Serialize to a temp file next to the document, then rename over it.
    fn write(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(json.as_bytes())?;
        temp.flush()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
