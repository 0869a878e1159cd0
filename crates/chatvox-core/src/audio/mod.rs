//! Desktop audio backends: cpal capture into WAV via hound, rodio playback.

mod capture;
mod devices;
mod playback;

pub use capture::CpalCapture;
pub use devices::{AudioDeviceInfo, find_input_device, list_input_devices};
pub use playback::RodioPlayback;
