//! Show or change settings

use anyhow::Result;
use chatvox_core::Settings;
use std::path::PathBuf;

use crate::app;

pub struct ConfigChanges {
    pub recordings_dir: Option<PathBuf>,
    pub clear_recordings_dir: bool,
    pub device: Option<String>,
    pub clear_device: bool,
}

impl ConfigChanges {
    /// Apply to `settings`, returning whether anything changed
    fn apply(self, settings: &mut Settings) -> bool {
        let before = settings.clone();
        if let Some(dir) = self.recordings_dir {
            settings.recordings_dir = Some(dir);
        }
        if self.clear_recordings_dir {
            settings.recordings_dir = None;
        }
        if let Some(device) = self.device {
            settings.microphone_device = Some(device);
        }
        if self.clear_device {
            settings.microphone_device = None;
        }
        *settings != before
    }
}

pub fn run(changes: ConfigChanges) -> Result<()> {
    let mut settings = Settings::load();

    if changes.apply(&mut settings) {
        let path = settings.save()?;
        println!("Saved {}", path.display());
    }

    println!("{}", serde_json::to_string_pretty(&settings)?);
    println!(
        "Recordings are stored in {}",
        app::recordings_dir(None, &settings).display()
    );
    Ok(())
}
