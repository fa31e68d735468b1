//! Persisted user preferences.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Preference key holding the user's language code.
pub const LANGUAGE_KEY: &str = "lang";

/// Read-only key lookup into persisted preferences.
pub trait PreferenceStore: Debug {
    /// Returns the string stored under `key`, if any.
    fn get_string(&self, key: &str) -> Option<String>;
}

/// Errors that can occur when loading preferences.
#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    /// The preference file could not be read.
    #[error("failed to read preferences: {0}")]
    Io(#[from] std::io::Error),
    /// The preference file is not a JSON object.
    #[error("failed to parse preferences: {0}")]
    Parse(#[from] serde_json::Error),
    /// No configuration directory exists for the current user.
    #[error("no configuration directory")]
    NoConfigDir,
}

/// In-memory preference store.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: HashMap<String, String>,
}

impl MemoryPreferences {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Preference store backed by a JSON object file.
///
/// Only string values are visible through [`PreferenceStore::get_string`].
#[derive(Debug, Clone, Default)]
pub struct FilePreferences {
    path: PathBuf,
    values: serde_json::Map<String, Value>,
}

impl FilePreferences {
    /// Loads preferences from `path`. A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns a [`PreferenceError`] if the file exists but cannot be read or
    /// is not a JSON object.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PreferenceError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no preferences at {}", path.display());
                serde_json::Map::new()
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, values })
    }

    /// Default preference file for `app`: `<config dir>/<app>/preferences.json`.
    ///
    /// # Errors
    ///
    /// Returns [`PreferenceError::NoConfigDir`] if the platform has no
    /// per-user configuration directory.
    pub fn default_path(app: &str) -> Result<PathBuf, PreferenceError> {
        dirs::config_dir()
            .map(|dir| dir.join(app).join("preferences.json"))
            .ok_or(PreferenceError::NoConfigDir)
    }

    /// The file these preferences were loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FilePreferences {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }
}

/// Maps a stored language code to the one used for lookups: Chinese variants
/// are kept as-is, everything else falls back to `"en"`.
#[must_use]
pub fn normalize_language(code: &str) -> &str {
    if code.contains("zh") { code } else { "en" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chinese_codes_pass_through() {
        assert_eq!(normalize_language("zh-TW"), "zh-TW");
        assert_eq!(normalize_language("zh"), "zh");
    }

    #[test]
    fn other_codes_fall_back_to_english() {
        assert_eq!(normalize_language("fr"), "en");
        assert_eq!(normalize_language(""), "en");
        assert_eq!(normalize_language("ZH"), "en");
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = FilePreferences::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(prefs.get_string(LANGUAGE_KEY), None);
    }

    #[test]
    fn file_exposes_string_values_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, r#"{"lang": "zh-TW", "launches": 3}"#).unwrap();

        let prefs = FilePreferences::load(&path).unwrap();
        assert_eq!(prefs.get_string(LANGUAGE_KEY).as_deref(), Some("zh-TW"));
        assert_eq!(prefs.get_string("launches"), None);
        assert_eq!(prefs.path(), path.as_path());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        assert!(matches!(
            FilePreferences::load(&path),
            Err(PreferenceError::Parse(_))
        ));
    }
}
