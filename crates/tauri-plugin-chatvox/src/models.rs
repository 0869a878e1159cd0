use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `plugins.chatvox` in `tauri.conf.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    /// Overrides the resolved recordings directory.
    #[serde(default)]
    pub recordings_dir: Option<PathBuf>,

    /// Input device name. Default: the system default input.
    #[serde(default)]
    pub microphone_device: Option<String>,

    /// Start without asking the host for microphone access.
    /// Default: true on desktop, false on mobile
    #[serde(default = "default_assume_granted")]
    pub assume_microphone_granted: bool,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            recordings_dir: None,
            microphone_device: None,
            assume_microphone_granted: default_assume_granted(),
        }
    }
}

fn default_assume_granted() -> bool {
    cfg!(desktop)
}
