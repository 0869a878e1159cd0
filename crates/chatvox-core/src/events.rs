//! Reverse notifications pushed from the dispatcher to the caller.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Events the caller receives without having asked for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Playback reached the end of the media on its own
    PlaybackComplete { path: PathBuf },
}

impl BridgeEvent {
    pub const PLAYBACK_COMPLETE: &'static str = "playback-complete";

    /// Event name on the channel
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::PlaybackComplete { .. } => Self::PLAYBACK_COMPLETE,
        }
    }

    /// Event payload on the channel (the bare path for playback completion)
    pub fn payload(&self) -> serde_json::Value {
        match self {
            BridgeEvent::PlaybackComplete { path } => {
                serde_json::Value::String(path.to_string_lossy().into_owned())
            }
        }
    }
}

/// Sent to hosts that have to show the microphone prompt themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    pub request_code: i32,
    pub permission: String,
}

impl PermissionRequest {
    pub const EVENT: &'static str = "permission-request";

    pub fn microphone(request_code: i32) -> Self {
        Self {
            request_code,
            permission: "microphone".to_string(),
        }
    }
}
