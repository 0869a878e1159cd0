//! Recordings directory: where capture files are created and listed from.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::command::RecordingInfo;
use crate::platform::Container;

/// File name prefix of every recording
pub const RECORDING_PREFIX: &str = "record_";

/// Candidate storage locations, resolved by the platform integration layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocations {
    /// App-specific external music directory, when the platform has one
    pub external_music: Option<PathBuf>,
    /// App-private storage, always available
    pub private_files: PathBuf,
}

impl StorageLocations {
    /// External music directory if available, else private storage
    pub fn recordings_dir(&self) -> &Path {
        self.external_music
            .as_deref()
            .unwrap_or(self.private_files.as_path())
    }

    /// Desktop locations: `<audio dir>/chatvox`, falling back to
    /// `<data dir>/chatvox/recordings`.
    pub fn desktop() -> Self {
        let private_files = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("chatvox")
            .join("recordings");
        Self {
            external_music: dirs::audio_dir().map(|dir| dir.join("chatvox")),
            private_files,
        }
    }
}

/// The designated recordings directory plus the naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingsDir {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl RecordingsDir {
    pub fn new(dir: impl Into<PathBuf>, container: Container) -> Self {
        let dir = dir.into();
        let dir = std::path::absolute(&dir).unwrap_or(dir);
        Self {
            dir,
            prefix: RECORDING_PREFIX.to_string(),
            extension: container.extension().to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Create a fresh, uniquely named, empty recording file.
    pub fn create_file(&self) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let (_file, path) = tempfile::Builder::new()
            .prefix(&self.prefix)
            .suffix(&format!(".{}", self.extension))
            .tempfile_in(&self.dir)?
            .keep()
            .map_err(|e| e.error)?;
        Ok(path)
    }

    /// Whether a file name belongs to the recordings set
    pub fn is_recording_name(&self, name: &str) -> bool {
        name.ends_with(&format!(".{}", self.extension)) || name.contains(&self.prefix)
    }

    /// List recordings in directory enumeration order.
    ///
    /// An unreadable or missing directory yields an empty list.
    pub fn list(&self) -> Vec<RecordingInfo> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                if !metadata.is_file() {
                    return None;
                }
                let name = entry.file_name();
                if !self.is_recording_name(&name.to_string_lossy()) {
                    return None;
                }
                let modified = metadata
                    .modified()
                    .ok()
                    .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                    .map(|elapsed| elapsed.as_millis() as u64)
                    .unwrap_or(0);
                Some(RecordingInfo {
                    path: entry.path(),
                    size: metadata.len(),
                    modified,
                })
            })
            .collect()
    }
}

/// Byte length of a file, or 0 if it cannot be stat'ed
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
