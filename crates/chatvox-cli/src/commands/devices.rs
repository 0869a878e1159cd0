//! List audio input devices

use anyhow::Result;
use chatvox_core::audio::list_input_devices;

pub fn run() -> Result<()> {
    for device in list_input_devices()? {
        let marker = if device.is_default { "*" } else { " " };
        println!("{marker} {}", device.name);
    }
    Ok(())
}
