//! Seams to the device layer.
//!
//! The dispatcher only talks to capture, playback and permissions through
//! these traits. Desktop implementations live in [`crate::audio`]; hosts with
//! their own native recorder (mobile shells) plug in theirs.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::events::BridgeEvent;

/// Where captured audio comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioSource {
    Microphone,
}

/// File container written by a capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// MPEG-4 audio, the native mobile recorder format
    Mpeg4,
    /// RIFF WAVE, written by the desktop recorder
    Wav,
}

impl Container {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mpeg4 => "m4a",
            Container::Wav => "wav",
        }
    }
}

/// Audio encoding inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoder {
    Aac,
    Pcm16,
}

/// Fixed configuration a capture backend records with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub source: AudioSource,
    pub container: Container,
    pub encoder: Encoder,
}

impl CaptureConfig {
    /// Microphone to AAC in an MPEG-4 container
    pub const MOBILE: CaptureConfig = CaptureConfig {
        source: AudioSource::Microphone,
        container: Container::Mpeg4,
        encoder: Encoder::Aac,
    };

    /// Microphone to 16-bit PCM WAV
    pub const DESKTOP: CaptureConfig = CaptureConfig {
        source: AudioSource::Microphone,
        container: Container::Wav,
        encoder: Encoder::Pcm16,
    };
}

/// Creates capture sessions.
pub trait CaptureBackend: Send {
    fn config(&self) -> CaptureConfig;

    /// Start recording into `output`, which already exists and is empty.
    ///
    /// Returns once the device is actually capturing.
    fn start(&mut self, output: &Path) -> Result<Box<dyn CaptureSession>>;
}

/// An active microphone-to-file recording.
pub trait CaptureSession: Send {
    /// Halt capture and flush the file
    fn stop(&mut self) -> Result<()>;

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    /// Free the device. Called after `stop`, and also after a failed `stop`.
    fn release(self: Box<Self>) -> Result<()>;
}

/// Invoked by a playback backend when the media plays to its end.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Creates playback sessions.
pub trait PlaybackBackend: Send {
    /// Prepare and start playing `path`.
    ///
    /// On error, anything partially built must already be released.
    /// `on_complete` runs at most once, and only on natural end of media.
    fn play(&mut self, path: &Path, on_complete: CompletionCallback)
    -> Result<Box<dyn PlaybackSession>>;
}

/// An active file-to-speaker rendering.
pub trait PlaybackSession: Send {
    fn is_playing(&self) -> bool;

    fn stop(&mut self) -> Result<()>;

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(self: Box<Self>) -> Result<()>;
}

/// Microphone permission as seen by the dispatcher.
pub trait PermissionGate: Send {
    fn is_granted(&self) -> bool;

    /// Ask the platform for microphone access.
    ///
    /// The answer is delivered later as a permission-result signal carrying
    /// `request_code`. An error means no prompt was shown.
    fn request(&mut self, request_code: i32) -> Result<()>;
}

/// Receives reverse notifications for the caller.
pub trait EventSink: Send {
    fn emit(&self, event: BridgeEvent) -> Result<()>;
}

/// A permission gate with a fixed answer.
///
/// Desktop platforms don't prompt at runtime, so the gate is simply granted.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission {
    granted: bool,
}

impl StaticPermission {
    pub fn granted() -> Self {
        Self { granted: true }
    }

    pub fn denied() -> Self {
        Self { granted: false }
    }
}

impl PermissionGate for StaticPermission {
    fn is_granted(&self) -> bool {
        self.granted
    }

    fn request(&mut self, _request_code: i32) -> Result<()> {
        anyhow::bail!("microphone permission cannot be requested on this platform")
    }
}
