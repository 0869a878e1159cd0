//! Persisted user settings (`settings.json` in the chatvox config directory).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::storage::StorageLocations;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("no config directory available on this platform")]
    NoConfigDir,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Overrides the platform's recordings directory
    #[serde(default)]
    pub recordings_dir: Option<PathBuf>,

    /// Selected microphone device name (None = system default)
    #[serde(default)]
    pub microphone_device: Option<String>,
}

impl Settings {
    /// Default settings file location
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatvox").join("settings.json"))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load from `path`; a missing or unreadable file gives defaults
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Ignoring invalid settings file {}: {e}", path.display());
            Self::default()
        })
    }

    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply the recordings directory override to platform locations
    pub fn storage(&self, locations: StorageLocations) -> StorageLocations {
        match &self.recordings_dir {
            Some(dir) => StorageLocations {
                external_music: Some(dir.clone()),
                private_files: locations.private_files,
            },
            None => locations,
        }
    }
}
