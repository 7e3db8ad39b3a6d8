// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration: user-facing settings and process configuration.
//
// Settings are held as an immutable snapshot (`Arc<Settings>`).  An update
// replaces the whole snapshot, so a reader always observes either the old or
// the new settings, never a mix.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, ScriptoriumError};
use crate::types::ExportFormat;

/// Bytes per megabyte as used by the upload size limit.
pub const BYTES_PER_MB: u64 = 1_048_576;

/// Upper bound accepted for `maxFileSize`, in MB.
pub const MAX_FILE_SIZE_CEILING_MB: u64 = 256;

/// Process-wide recognition and export defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Default recognition language (e.g. `eng`, `fra`, `deu`).
    pub default_language: String,
    pub enable_handwriting: bool,
    pub enable_table_detection: bool,
    pub preserve_formatting: bool,
    /// Upload size limit in megabytes.
    pub max_file_size: u64,
    pub default_export_format: ExportFormat,
    #[serde(default = "default_true")]
    pub enable_diagram_detection: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_language: "eng".into(),
            enable_handwriting: true,
            enable_table_detection: true,
            preserve_formatting: true,
            max_file_size: 10,
            default_export_format: ExportFormat::Pdf,
            enable_diagram_detection: true,
        }
    }
}

impl Settings {
    /// The upload size limit in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size.saturating_mul(BYTES_PER_MB)
    }

    pub fn validate(&self) -> Result<()> {
        let lang = self.default_language.trim();
        if lang.is_empty() {
            return Err(ScriptoriumError::InvalidRequest(
                "defaultLanguage must not be empty".into(),
            ));
        }
        if !lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '+') {
            return Err(ScriptoriumError::InvalidRequest(format!(
                "defaultLanguage {lang:?} is not a language code"
            )));
        }
        if self.max_file_size == 0 || self.max_file_size > MAX_FILE_SIZE_CEILING_MB {
            return Err(ScriptoriumError::InvalidRequest(format!(
                "maxFileSize must be between 1 and {MAX_FILE_SIZE_CEILING_MB} MB, got {}",
                self.max_file_size
            )));
        }
        Ok(())
    }
}

/// Sole owner and writer of the process-wide [`Settings`].
pub struct ConfigStore {
    current: RwLock<Arc<Settings>>,
    /// Where replacements are persisted; `None` keeps settings in memory.
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// A store that never touches disk (useful for tests).
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
            path: None,
        }
    }

    /// Load settings from `path`, falling back to the defaults when the file
    /// is missing or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match read_settings(&path) {
            Ok(Some(settings)) => {
                info!(path = %path.display(), "settings loaded");
                settings
            }
            Ok(None) => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "settings file unusable, using defaults");
                Settings::default()
            }
        };
        Self {
            current: RwLock::new(Arc::new(settings)),
            path: Some(path),
        }
    }

    /// The current settings snapshot.
    pub fn snapshot(&self) -> Arc<Settings> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Replace the settings as a whole.
    ///
    /// The new value is validated and persisted before it becomes visible;
    /// on any error the previous snapshot stays in place.
    pub fn replace(&self, settings: Settings) -> Result<Arc<Settings>> {
        settings.validate()?;
        if let Some(path) = &self.path {
            persist_settings(path, &settings)?;
        }
        let next = Arc::new(settings);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::clone(&next);
        info!(
            max_file_size = next.max_file_size,
            export = %next.default_export_format,
            "settings replaced"
        );
        Ok(next)
    }
}

fn read_settings(path: &Path) -> Result<Option<Settings>> {
    match std::fs::read_to_string(path) {
        Ok(data) => {
            let settings: Settings = serde_json::from_str(&data)?;
            settings.validate()?;
            Ok(Some(settings))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn persist_settings(path: &Path, settings: &Settings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    // Write-then-rename so a crash never leaves a truncated file behind.
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Process configuration
// ---------------------------------------------------------------------------

/// Default bind address for the HTTP surface.
pub const DEFAULT_BIND: &str = "0.0.0.0:5000";

/// Default base URL of the external recognition engine.
pub const DEFAULT_ENGINE_URL: &str = "http://ocr-engine:6000";

/// Process configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub bind: String,
    pub engine_url: String,
    /// Upper bound on concurrently running recognition calls.
    pub max_concurrent_processing: usize,
    pub processing_timeout: Duration,
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = lookup("SCRIPTORIUM_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir(&lookup));
        let bind = lookup("SCRIPTORIUM_BIND").unwrap_or_else(|| DEFAULT_BIND.into());
        let engine_url = lookup("OCR_ENGINE_URL").unwrap_or_else(|| DEFAULT_ENGINE_URL.into());

        let max_concurrent_processing =
            parse_number(&lookup, "SCRIPTORIUM_MAX_CONCURRENT", 4)? as usize;
        if max_concurrent_processing == 0 {
            return Err(ScriptoriumError::InvalidRequest(
                "SCRIPTORIUM_MAX_CONCURRENT must be at least 1".into(),
            ));
        }
        let timeout_secs = parse_number(&lookup, "SCRIPTORIUM_PROCESSING_TIMEOUT_SECS", 120)?;
        if timeout_secs == 0 {
            return Err(ScriptoriumError::InvalidRequest(
                "SCRIPTORIUM_PROCESSING_TIMEOUT_SECS must be at least 1".into(),
            ));
        }

        Ok(Self {
            data_dir,
            bind,
            engine_url,
            max_concurrent_processing,
            processing_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("documents.db")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.data_dir.join("artifacts")
    }
}

fn parse_number(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
            ScriptoriumError::InvalidRequest(format!("{key}={raw:?} is not a number: {e}"))
        }),
    }
}

fn default_data_dir(lookup: &impl Fn(&str) -> Option<String>) -> PathBuf {
    // XDG data dir, then ~/.local/share, then the working directory.
    let base = if let Some(xdg) = lookup("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = lookup("HOME") {
        PathBuf::from(home).join(".local").join("share")
    } else {
        PathBuf::from(".")
    };
    base.join("scriptorium")
}
