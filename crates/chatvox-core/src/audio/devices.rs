//! Audio input device enumeration and lookup.

use anyhow::{Context, Result};
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

/// An input device as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// List all available audio input devices on the system.
///
/// # Errors
/// Returns an error if the host cannot enumerate devices or none are found.
pub fn list_input_devices() -> Result<Vec<AudioDeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for device in host
        .input_devices()
        .context("Failed to enumerate input devices")?
    {
        if let Ok(name) = device.name() {
            devices.push(AudioDeviceInfo {
                is_default: default_name.as_ref() == Some(&name),
                name,
            });
        }
    }

    if devices.is_empty() {
        anyhow::bail!("No audio input devices found");
    }

    Ok(devices)
}

/// Find an input device by name, or the default input device when `name` is
/// `None`. An unknown name is an error rather than a silent fallback.
pub fn find_input_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    let Some(wanted) = name else {
        return host
            .default_input_device()
            .context("No default input device available");
    };

    host.input_devices()
        .context("Failed to enumerate input devices")?
        .find(|device| device.name().is_ok_and(|n| n == wanted))
        .with_context(|| format!("Input device '{wanted}' not found"))
}
