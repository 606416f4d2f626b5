//! Document file access and the dialogs that pick paths for it.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::StorageError;

/// Path pickers. A cancelled dialog yields `Ok(None)` or an empty list.
pub trait Dialogs {
    fn pick_file(&mut self) -> Result<Option<PathBuf>, StorageError>;
    fn pick_files(&mut self) -> Result<Vec<PathBuf>, StorageError>;
    fn pick_save_path(&mut self, default_name: &str) -> Result<Option<PathBuf>, StorageError>;
    fn pick_folder(&mut self) -> Result<Option<PathBuf>, StorageError>;
}

/// Everything the editor needs from the file system.
pub trait FileStore {
    fn open_file(&mut self) -> Result<Option<PathBuf>, StorageError>;
    fn open_multiple(&mut self) -> Result<Vec<PathBuf>, StorageError>;
    fn save_as(&mut self, default_name: &str) -> Result<Option<PathBuf>, StorageError>;
    fn select_folder(&mut self) -> Result<Option<PathBuf>, StorageError>;
    fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError>;
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError>;
}

/// Reads and writes the local file system, asking `dialogs` for paths.
#[derive(Debug, Clone, Default)]
pub struct LocalFileStore<D> {
    dialogs: D,
}

impl<D: Dialogs> LocalFileStore<D> {
    pub fn new(dialogs: D) -> Self {
        Self { dialogs }
    }

    pub fn dialogs(&self) -> &D {
        &self.dialogs
    }

    pub fn dialogs_mut(&mut self) -> &mut D {
        &mut self.dialogs
    }
}

impl<D: Dialogs> FileStore for LocalFileStore<D> {
    fn open_file(&mut self) -> Result<Option<PathBuf>, StorageError> {
        self.dialogs.pick_file()
    }

    fn open_multiple(&mut self) -> Result<Vec<PathBuf>, StorageError> {
        self.dialogs.pick_files()
    }

    fn save_as(&mut self, default_name: &str) -> Result<Option<PathBuf>, StorageError> {
        self.dialogs.pick_save_path(default_name)
    }

    fn select_folder(&mut self) -> Result<Option<PathBuf>, StorageError> {
        self.dialogs.pick_folder()
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        let bytes = fs::read(path)?;
        debug!("read {} bytes from {}", bytes.len(), path.display());
        Ok(bytes)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        write_atomic(path, bytes)?;
        info!("wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

/// Writes to a sibling temporary file and renames it over `path`, so a
/// failed write never leaves a truncated file behind.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    write_atomic_with(path, |file| file.write_all(bytes))
}

fn write_atomic_with(
    path: &Path,
    fill: impl FnOnce(&mut File) -> io::Result<()>,
) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let written = File::create(&partial).and_then(|mut file| {
        fill(&mut file)?;
        file.sync_all()
    });
    if let Err(err) = written.and_then(|()| fs::rename(&partial, path)) {
        if let Err(cleanup) = fs::remove_file(&partial) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                warn!("could not remove {}: {cleanup}", partial.display());
            }
        }
        return Err(err.into());
    }
    Ok(())
}

/// Dialogs answered from queued responses, for headless runs and tests.
/// An exhausted queue behaves like a cancelled dialog.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDialogs {
    files: VecDeque<Option<PathBuf>>,
    file_lists: VecDeque<Vec<PathBuf>>,
    save_paths: VecDeque<Option<PathBuf>>,
    folders: VecDeque<Option<PathBuf>>,
    save_requests: Vec<String>,
}

impl ScriptedDialogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_file(&mut self, path: Option<PathBuf>) -> &mut Self {
        self.files.push_back(path);
        self
    }

    pub fn push_files(&mut self, paths: Vec<PathBuf>) -> &mut Self {
        self.file_lists.push_back(paths);
        self
    }

    pub fn push_save_path(&mut self, path: Option<PathBuf>) -> &mut Self {
        self.save_paths.push_back(path);
        self
    }

    pub fn push_folder(&mut self, path: Option<PathBuf>) -> &mut Self {
        self.folders.push_back(path);
        self
    }

    /// Default names the save dialog was opened with, oldest first.
    pub fn save_requests(&self) -> &[String] {
        &self.save_requests
    }
}

impl Dialogs for ScriptedDialogs {
    fn pick_file(&mut self) -> Result<Option<PathBuf>, StorageError> {
        Ok(self.files.pop_front().flatten())
    }

    fn pick_files(&mut self) -> Result<Vec<PathBuf>, StorageError> {
        Ok(self.file_lists.pop_front().unwrap_or_default())
    }

    fn pick_save_path(&mut self, default_name: &str) -> Result<Option<PathBuf>, StorageError> {
        self.save_requests.push(default_name.to_owned());
        Ok(self.save_paths.pop_front().flatten())
    }

    fn pick_folder(&mut self) -> Result<Option<PathBuf>, StorageError> {
        Ok(self.folders.pop_front().flatten())
    }
}
