//! Channel messages: the raw `(method, arguments)` call, the parsed command
//! and the success values sent back.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// A raw call received over the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// A call with no arguments
    pub fn bare(method: impl Into<String>) -> Self {
        Self::new(method, Value::Null)
    }

    fn string_argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// A recognized command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartCapture,
    StopCapture,
    ListRecordings,
    PlayAudio { path: Option<PathBuf> },
    StopAudio,
}

impl Command {
    pub const START_CAPTURE: &'static str = "start-capture";
    pub const STOP_CAPTURE: &'static str = "stop-capture";
    pub const LIST_RECORDINGS: &'static str = "list-recordings";
    pub const PLAY_AUDIO: &'static str = "play-audio";
    pub const STOP_AUDIO: &'static str = "stop-audio";

    /// Parse a raw call. Returns `None` for a method the channel doesn't know.
    ///
    /// Legacy camelCase method names from the mobile chat channel
    /// (`startAudioRecord`, `playAudio`, ...) are accepted as aliases.
    pub fn parse(call: &MethodCall) -> Option<Self> {
        let command = match call.method.as_str() {
            Self::START_CAPTURE | "startAudioRecord" => Command::StartCapture,
            Self::STOP_CAPTURE | "stopAudioRecord" => Command::StopCapture,
            Self::LIST_RECORDINGS | "listRecordings" => Command::ListRecordings,
            Self::PLAY_AUDIO | "playAudio" => Command::PlayAudio {
                path: call.string_argument("path").map(PathBuf::from),
            },
            Self::STOP_AUDIO | "stopAudio" => Command::StopAudio,
            _ => return None,
        };
        Some(command)
    }

    /// Canonical method name
    pub fn method(&self) -> &'static str {
        match self {
            Command::StartCapture => Self::START_CAPTURE,
            Command::StopCapture => Self::STOP_CAPTURE,
            Command::ListRecordings => Self::LIST_RECORDINGS,
            Command::PlayAudio { .. } => Self::PLAY_AUDIO,
            Command::StopAudio => Self::STOP_AUDIO,
        }
    }

    /// Build the channel message for this command
    pub fn into_call(self) -> MethodCall {
        let method = self.method();
        match self {
            Command::PlayAudio { path: Some(path) } => MethodCall::new(
                method,
                serde_json::json!({ "path": path.to_string_lossy() }),
            ),
            _ => MethodCall::bare(method),
        }
    }
}

/// Plain status replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Started,
    Playing,
    Stopped,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Started => "started",
            Status::Playing => "playing",
            Status::Stopped => "stopped",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The file produced by a finished capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoppedRecording {
    pub path: PathBuf,
    pub size: u64,
}

/// One entry of the recordings listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub path: PathBuf,
    pub size: u64,
    /// Last modification time in milliseconds since the Unix epoch
    pub modified: u64,
}

/// Success value of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Status(Status),
    Stopped(StoppedRecording),
    Recordings(Vec<RecordingInfo>),
}

impl Reply {
    pub fn status(&self) -> Option<Status> {
        match self {
            Reply::Status(status) => Some(*status),
            _ => None,
        }
    }
}

impl From<Status> for Reply {
    fn from(status: Status) -> Self {
        Reply::Status(status)
    }
}
