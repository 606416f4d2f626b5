//! Editor settings on disk: one versioned JSON file in the configuration
//! directory. Unknown sections are ignored, missing ones take defaults, and
//! values the editor cannot use are repaired on the way in and out.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use doc_model::EditorSettings;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::files::write_atomic;
use crate::StorageError;

const SETTINGS_FILE: &str = "settings.json";

/// Version 2 added `default_tool`; version 1 files load with its default.
pub const SETTINGS_VERSION: u32 = 2;

#[derive(Serialize)]
struct SettingsFileOut<'a> {
    version: u32,
    settings: &'a EditorSettings,
}

#[derive(Deserialize)]
struct SettingsFileIn {
    version: u32,
    #[serde(default)]
    settings: EditorSettings,
}

/// Location of the settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsStore {
    dir: PathBuf,
}

impl SettingsStore {
    /// The platform configuration directory for the editor.
    pub fn for_current_user() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "PdfEditor", "PdfEditor")
            .ok_or(StorageError::NoDataDirectory)?;
        Ok(Self::in_dir(dirs.config_dir()))
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    /// Reads the settings, or the defaults when no file has been saved yet.
    pub fn load(&self) -> Result<EditorSettings, StorageError> {
        let path = self.path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no settings at {}, using defaults", path.display());
                return Ok(EditorSettings::default());
            }
            Err(err) => return Err(err.into()),
        };

        let file: SettingsFileIn = serde_json::from_slice(&bytes)?;
        if file.version > SETTINGS_VERSION {
            return Err(StorageError::UnsupportedSettingsVersion {
                found: file.version,
                supported: SETTINGS_VERSION,
            });
        }

        let mut settings = file.settings;
        let repaired = settings.repair();
        if !repaired.is_empty() {
            warn!("reset invalid settings in {}: {}", path.display(), repaired.join(", "));
        }
        Ok(settings)
    }

    /// Writes `settings` after repairing a copy, and returns what was written.
    pub fn save(&self, settings: &EditorSettings) -> Result<EditorSettings, StorageError> {
        let mut settings = settings.clone();
        let repaired = settings.repair();
        if !repaired.is_empty() {
            warn!("not saving invalid settings: {}", repaired.join(", "));
        }

        let bytes = serde_json::to_vec_pretty(&SettingsFileOut {
            version: SETTINGS_VERSION,
            settings: &settings,
        })?;
        write_atomic(&self.path(), &bytes)?;
        info!("saved settings to {}", self.path().display());
        Ok(settings)
    }

    /// Loads, changes and saves the settings in one step.
    pub fn update(
        &self,
        change: impl FnOnce(&mut EditorSettings),
    ) -> Result<EditorSettings, StorageError> {
        let mut settings = self.load()?;
        change(&mut settings);
        self.save(&settings)
    }
}
