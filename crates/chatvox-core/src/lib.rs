#[cfg(feature = "desktop-audio")]
pub mod audio;
pub mod bridge;
pub mod command;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod platform;
pub mod settings;
pub mod storage;

#[cfg(test)]
mod testing;

pub use bridge::{BridgeHandle, Signal, SignalSender};
pub use command::{Command, MethodCall, RecordingInfo, Reply, Status, StoppedRecording};
pub use dispatcher::{
    Backends, Dispatcher, PermissionState, PlaybackToken, RECORD_AUDIO_REQUEST_CODE, Responder,
};
pub use error::{CallError, CommandError, ErrorCategory, ErrorCode, Outcome};
pub use events::{BridgeEvent, PermissionRequest};
pub use platform::{
    AudioSource, CaptureBackend, CaptureConfig, CaptureSession, CompletionCallback, Container,
    Encoder, EventSink, PermissionGate, PlaybackBackend, PlaybackSession, StaticPermission,
};
pub use settings::{Settings, SettingsError};
pub use storage::{RECORDING_PREFIX, RecordingsDir, StorageLocations};
