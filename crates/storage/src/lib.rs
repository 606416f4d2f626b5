//! File, dialog and settings persistence for the editor.

pub mod files;
pub mod settings;

pub use doc_model::EditorSettings;
pub use files::{Dialogs, FileStore, LocalFileStore, ScriptedDialogs};
pub use settings::{SettingsStore, SETTINGS_VERSION};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("settings file version {found} is newer than the supported version {supported}")]
    UnsupportedSettingsVersion { found: u32, supported: u32 },
    #[error("dialog failed: {0}")]
    Dialog(String),
}
