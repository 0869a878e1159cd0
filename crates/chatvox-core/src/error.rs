//! Typed failures surfaced to the caller of the command channel.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::command::Reply;

/// Result of one command, as seen by the caller.
pub type Outcome = Result<Reply, CallError>;

/// Failure codes reported over the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AlreadyRecording,
    NotRecording,
    MissingPath,
    StartFailed,
    StopFailed,
    PlayFailed,
    PermissionDenied,
}

/// Broad grouping of error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The command conflicts with the current recorder/player state
    StateConflict,
    /// The caller supplied bad or missing arguments
    InputValidation,
    /// The audio device or filesystem failed
    Device,
    /// Microphone access was refused
    Permission,
}

impl ErrorCode {
    /// Wire identifier for this code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AlreadyRecording => "ALREADY_RECORDING",
            ErrorCode::NotRecording => "NOT_RECORDING",
            ErrorCode::MissingPath => "MISSING_PATH",
            ErrorCode::StartFailed => "START_FAILED",
            ErrorCode::StopFailed => "STOP_FAILED",
            ErrorCode::PlayFailed => "PLAY_FAILED",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::AlreadyRecording | ErrorCode::NotRecording => ErrorCategory::StateConflict,
            ErrorCode::MissingPath => ErrorCategory::InputValidation,
            ErrorCode::StartFailed | ErrorCode::StopFailed | ErrorCode::PlayFailed => {
                ErrorCategory::Device
            }
            ErrorCode::PermissionDenied => ErrorCategory::Permission,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed failure with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
}

impl CommandError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn already_recording() -> Self {
        Self::new(ErrorCode::AlreadyRecording, "Already recording")
    }

    pub fn not_recording() -> Self {
        Self::new(ErrorCode::NotRecording, "No active recording")
    }

    pub fn missing_path() -> Self {
        Self::new(ErrorCode::MissingPath, "No path provided")
    }

    pub fn permission_denied() -> Self {
        Self::new(ErrorCode::PermissionDenied, "Microphone permission denied")
    }
}

/// Everything a call can resolve to other than a reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Failed(#[from] CommandError),

    /// The method name is not part of the channel
    #[error("method '{method}' is not implemented")]
    NotImplemented { method: String },

    /// The dispatcher went away before the call was resolved
    #[error("recorder bridge is closed")]
    Closed,
}

impl CallError {
    /// Wire code, including the non-typed outcomes
    pub fn code(&self) -> &'static str {
        match self {
            CallError::Failed(err) => err.code.as_str(),
            CallError::NotImplemented { .. } => "NOT_IMPLEMENTED",
            CallError::Closed => "BRIDGE_CLOSED",
        }
    }

    /// The typed error code, if this is a typed failure
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            CallError::Failed(err) => Some(err.code),
            _ => None,
        }
    }
}

impl Serialize for CallError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let message = match self {
            CallError::Failed(err) => err.message.clone(),
            other => other.to_string(),
        };
        let mut state = serializer.serialize_struct("CallError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &message)?;
        state.end()
    }
}
