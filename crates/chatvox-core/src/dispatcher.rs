//! Command Dispatcher
//!
//! Owns the single recorder and player handles plus the one pending start
//! that waits on a permission decision. Every method runs on the dispatcher
//! thread (see [`crate::bridge`]), so no locking happens here.
//!
//! ## Permission state machine
//!
//! `Idle` → `AwaitingPermission` (start requested without access, prompt
//! issued) → `Idle` (permission result for our request code arrives, granted
//! or not).

use anyhow::Context;
use std::fs;
use std::path::PathBuf;
use tokio::sync::oneshot;

use crate::bridge::{Signal, SignalSender};
use crate::command::{Command, MethodCall, Reply, Status, StoppedRecording};
use crate::error::{CallError, CommandError, ErrorCode, Outcome};
use crate::events::BridgeEvent;
use crate::platform::{
    CaptureBackend, CaptureSession, EventSink, PermissionGate, PlaybackBackend, PlaybackSession,
};
use crate::storage::{self, RecordingsDir};

/// Request identifier used for the microphone permission prompt
pub const RECORD_AUDIO_REQUEST_CODE: i32 = 2001;

/// Resolves one call. Consumed on use, so a call resolves at most once.
#[derive(Debug)]
pub struct Responder(oneshot::Sender<Outcome>);

impl Responder {
    pub fn new(tx: oneshot::Sender<Outcome>) -> Self {
        Self(tx)
    }

    /// A responder and the receiver its outcome arrives on
    pub fn channel() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    pub fn resolve(self, outcome: Outcome) {
        // The caller may have stopped waiting
        let _ = self.0.send(outcome);
    }

    fn fail(self, error: CommandError) {
        self.resolve(Err(error.into()));
    }
}

/// Device-layer collaborators of the dispatcher.
pub struct Backends {
    pub capture: Box<dyn CaptureBackend>,
    pub playback: Box<dyn PlaybackBackend>,
    pub permission: Box<dyn PermissionGate>,
    pub events: Box<dyn EventSink>,
}

/// Where the permission dance currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Idle,
    AwaitingPermission,
}

/// Identifies one playback session, so a late completion from a replaced
/// player is not mistaken for the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackToken(u64);

struct ActiveCapture {
    session: Box<dyn CaptureSession>,
    output: PathBuf,
}

struct ActivePlayback {
    session: Box<dyn PlaybackSession>,
    path: PathBuf,
    token: PlaybackToken,
}

struct PendingStart {
    responder: Responder,
}

pub struct Dispatcher {
    backends: Backends,
    recordings: RecordingsDir,
    signals: SignalSender,
    recorder: Option<ActiveCapture>,
    player: Option<ActivePlayback>,
    pending: Option<PendingStart>,
    next_token: u64,
}

impl Dispatcher {
    pub fn new(backends: Backends, recordings: RecordingsDir, signals: SignalSender) -> Self {
        Self {
            backends,
            recordings,
            signals,
            recorder: None,
            player: None,
            pending: None,
            next_token: 0,
        }
    }

    pub fn recordings(&self) -> &RecordingsDir {
        &self.recordings
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_some()
    }

    pub fn permission_state(&self) -> PermissionState {
        if self.pending.is_some() {
            PermissionState::AwaitingPermission
        } else {
            PermissionState::Idle
        }
    }

    /// Route one call. The responder is resolved now, or later for a start
    /// that waits on the permission prompt.
    pub fn handle(&mut self, call: MethodCall, responder: Responder) {
        let Some(command) = Command::parse(&call) else {
            log::debug!("Unknown method '{}'", call.method);
            responder.resolve(Err(CallError::NotImplemented {
                method: call.method,
            }));
            return;
        };

        match command {
            Command::StartCapture => self.start_capture(responder),
            Command::StopCapture => responder.resolve(self.stop_capture()),
            Command::ListRecordings => {
                responder.resolve(Ok(Reply::Recordings(self.recordings.list())))
            }
            Command::PlayAudio { path } => responder.resolve(self.play_audio(path)),
            Command::StopAudio => {
                self.stop_audio();
                responder.resolve(Ok(Status::Stopped.into()));
            }
        }
    }

    /// Process a platform event
    pub fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::PermissionResult {
                request_code,
                granted,
            } => self.on_permission_result(request_code, granted),
            Signal::PlaybackFinished(token) => self.on_playback_finished(token),
        }
    }

    fn start_capture(&mut self, responder: Responder) {
        if self.recorder.is_some() {
            return responder.fail(CommandError::already_recording());
        }
        if self.pending.is_some() {
            return responder.fail(CommandError::new(
                ErrorCode::AlreadyRecording,
                "A recording start is already waiting for permission",
            ));
        }

        if !self.backends.permission.is_granted() {
            self.pending = Some(PendingStart { responder });
            if let Err(e) = self.backends.permission.request(RECORD_AUDIO_REQUEST_CODE) {
                log::warn!("Could not request microphone permission: {e:#}");
                if let Some(pending) = self.pending.take() {
                    pending.responder.fail(CommandError::permission_denied());
                }
            }
            return;
        }

        match self.begin_capture() {
            Ok(()) => responder.resolve(Ok(Status::Started.into())),
            Err(e) => {
                log::warn!("Starting capture failed: {e:#}");
                responder.fail(CommandError::new(
                    ErrorCode::StartFailed,
                    "Could not start recorder",
                ));
            }
        }
    }

    /// Create a fresh file and start capturing into it.
    fn begin_capture(&mut self) -> anyhow::Result<()> {
        let output = self.recordings.create_file().with_context(|| {
            format!(
                "could not create recording file in {}",
                self.recordings.path().display()
            )
        })?;

        match self.backends.capture.start(&output) {
            Ok(session) => {
                log::info!("Recording started: {}", output.display());
                self.recorder = Some(ActiveCapture { session, output });
                Ok(())
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&output) {
                    log::debug!("Ignoring cleanup error for {}: {cleanup}", output.display());
                }
                Err(e)
            }
        }
    }

    fn stop_capture(&mut self) -> Outcome {
        let Some(ActiveCapture {
            mut session,
            output,
        }) = self.recorder.take()
        else {
            return Err(CommandError::not_recording().into());
        };

        let halted = session.stop().and_then(|()| session.reset());
        let released = match halted {
            Ok(()) => session.release(),
            Err(e) => {
                if let Err(release_err) = session.release() {
                    log::debug!("Ignoring release error after failed stop: {release_err:#}");
                }
                Err(e)
            }
        };

        if let Err(e) = released {
            log::warn!("Stopping capture failed: {e:#}");
            return Err(CommandError::new(ErrorCode::StopFailed, "Could not stop recorder").into());
        }

        let size = storage::file_size(&output);
        log::info!("Recording stopped: path={} size={size}", output.display());
        Ok(Reply::Stopped(StoppedRecording { path: output, size }))
    }

    fn play_audio(&mut self, path: Option<PathBuf>) -> Outcome {
        let Some(path) = path else {
            return Err(CommandError::missing_path().into());
        };

        self.stop_audio();

        let token = PlaybackToken(self.next_token);
        self.next_token += 1;
        let signals = self.signals.clone();
        let on_complete = Box::new(move || signals.send(Signal::PlaybackFinished(token)));

        match self.backends.playback.play(&path, on_complete) {
            Ok(session) => {
                log::info!("Playing {}", path.display());
                self.player = Some(ActivePlayback {
                    session,
                    path,
                    token,
                });
                Ok(Status::Playing.into())
            }
            Err(e) => {
                log::warn!("Playing {} failed: {e:#}", path.display());
                Err(CommandError::new(ErrorCode::PlayFailed, "Could not play audio").into())
            }
        }
    }

    /// Tear down the player, if any. Teardown errors are ignored.
    fn stop_audio(&mut self) {
        let Some(ActivePlayback { mut session, .. }) = self.player.take() else {
            return;
        };

        let halted = if session.is_playing() {
            session.stop()
        } else {
            Ok(())
        };
        if let Err(e) = halted.and_then(|()| session.reset()) {
            log::debug!("Ignoring playback stop error: {e:#}");
        }
        if let Err(e) = session.release() {
            log::debug!("Ignoring playback release error: {e:#}");
        }
    }

    fn on_playback_finished(&mut self, token: PlaybackToken) {
        let Some(active) = &self.player else {
            log::debug!("Playback finished after player was torn down");
            return;
        };
        if active.token != token {
            log::debug!("Ignoring completion from a replaced player");
            return;
        }

        let event = BridgeEvent::PlaybackComplete {
            path: active.path.clone(),
        };
        if let Err(e) = self.backends.events.emit(event) {
            log::debug!("Ignoring playback-complete delivery error: {e:#}");
        }
        self.stop_audio();
    }

    fn on_permission_result(&mut self, request_code: i32, granted: bool) {
        if request_code != RECORD_AUDIO_REQUEST_CODE {
            log::debug!("Ignoring permission result for request {request_code}");
            return;
        }

        let Some(PendingStart { responder }) = self.pending.take() else {
            return;
        };

        if !granted {
            log::info!("Microphone permission denied");
            return responder.fail(CommandError::permission_denied());
        }

        match self.begin_capture() {
            Ok(()) => responder.resolve(Ok(Status::Started.into())),
            Err(e) => {
                log::warn!("Starting capture after permission failed: {e:#}");
                responder.fail(CommandError::new(
                    ErrorCode::StartFailed,
                    "Could not start after permission",
                ));
            }
        }
    }

    /// Release every device handle and drop any pending call.
    pub fn shutdown(&mut self) {
        self.stop_audio();
        if self.recorder.is_some()
            && let Err(e) = self.stop_capture()
        {
            log::debug!("Ignoring capture stop error during shutdown: {e}");
        }
        self.pending = None;
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, HarnessOptions};
    use serde_json::json;
    use tokio::sync::oneshot::error::TryRecvError;

    fn call(harness: &mut Harness, method: &str) -> oneshot::Receiver<Outcome> {
        harness.call(MethodCall::bare(method))
    }

    fn resolved(rx: &mut oneshot::Receiver<Outcome>) -> Outcome {
        rx.try_recv().expect("call should be resolved")
    }

    fn code(outcome: Outcome) -> ErrorCode {
        outcome
            .expect_err("expected a failure")
            .error_code()
            .expect("expected a typed failure")
    }

    #[test]
    fn test_start_then_stop_reports_file() {
        let mut h = Harness::new(HarnessOptions::default());

        let mut started = call(&mut h, "start-capture");
        assert_eq!(resolved(&mut started), Ok(Status::Started.into()));
        assert!(h.dispatcher.is_recording());

        let mut stopped = call(&mut h, "stop-capture");
        let Ok(Reply::Stopped(recording)) = resolved(&mut stopped) else {
            panic!("expected a stopped recording");
        };

        assert!(!h.dispatcher.is_recording());
        assert_eq!(recording.path.parent(), Some(h.dir()));
        let name = recording.path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("record_") && name.ends_with(".m4a"));
        assert!(recording.size > 0);
        assert_eq!(recording.size, fs::metadata(&recording.path).unwrap().len());
    }

    #[test]
    fn test_second_start_is_already_recording() {
        let mut h = Harness::new(HarnessOptions::default());
        let mut first = call(&mut h, "start-capture");
        assert!(resolved(&mut first).is_ok());

        let mut second = call(&mut h, "start-capture");
        assert_eq!(code(resolved(&mut second)), ErrorCode::AlreadyRecording);
        assert_eq!(h.capture.starts(), 1);
    }

    #[test]
    fn test_stop_without_capture_is_not_recording() {
        let mut h = Harness::new(HarnessOptions::default());
        let mut stopped = call(&mut h, "stop-capture");
        assert_eq!(code(resolved(&mut stopped)), ErrorCode::NotRecording);
    }

    #[test]
    fn test_start_failure_leaves_no_recorder_or_file() {
        let mut h = Harness::new(HarnessOptions {
            fail_start: true,
            ..Default::default()
        });

        let mut started = call(&mut h, "start-capture");
        assert_eq!(code(resolved(&mut started)), ErrorCode::StartFailed);
        assert!(!h.dispatcher.is_recording());
        assert!(h.dispatcher.recordings().list().is_empty());
    }

    #[test]
    fn test_stop_failure_clears_recorder_and_releases() {
        let mut h = Harness::new(HarnessOptions {
            fail_stop: true,
            ..Default::default()
        });
        let mut started = call(&mut h, "start-capture");
        assert!(resolved(&mut started).is_ok());

        let mut stopped = call(&mut h, "stop-capture");
        assert_eq!(code(resolved(&mut stopped)), ErrorCode::StopFailed);
        assert!(!h.dispatcher.is_recording());
        assert_eq!(h.capture.releases(), 1);

        // The dispatcher is not stuck: a new capture can start
        let mut again = call(&mut h, "start-capture");
        assert!(resolved(&mut again).is_ok());
    }

    #[test]
    fn test_list_recordings_after_capture() {
        let mut h = Harness::new(HarnessOptions::default());
        let mut empty = call(&mut h, "list-recordings");
        assert_eq!(resolved(&mut empty), Ok(Reply::Recordings(Vec::new())));

        let _ = call(&mut h, "start-capture");
        let mut stopped = call(&mut h, "stop-capture");
        let Ok(Reply::Stopped(recording)) = resolved(&mut stopped) else {
            panic!("expected a stopped recording");
        };

        let mut listed = call(&mut h, "listRecordings");
        let Ok(Reply::Recordings(list)) = resolved(&mut listed) else {
            panic!("expected a listing");
        };
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].path, recording.path);
        assert_eq!(list[0].size, recording.size);
    }

    #[test]
    fn test_start_waits_for_permission_then_starts() {
        let mut h = Harness::new(HarnessOptions {
            granted: false,
            ..Default::default()
        });

        let mut started = call(&mut h, "start-capture");
        assert_eq!(started.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(
            h.dispatcher.permission_state(),
            PermissionState::AwaitingPermission
        );
        assert_eq!(h.permission.requests(), vec![RECORD_AUDIO_REQUEST_CODE]);

        h.permission.grant();
        h.dispatcher.handle_signal(Signal::PermissionResult {
            request_code: RECORD_AUDIO_REQUEST_CODE,
            granted: true,
        });

        assert_eq!(resolved(&mut started), Ok(Status::Started.into()));
        assert_eq!(h.dispatcher.permission_state(), PermissionState::Idle);
        assert!(h.dispatcher.is_recording());
    }

    #[test]
    fn test_start_denied_permission() {
        let mut h = Harness::new(HarnessOptions {
            granted: false,
            ..Default::default()
        });

        let mut started = call(&mut h, "start-capture");
        h.dispatcher.handle_signal(Signal::PermissionResult {
            request_code: RECORD_AUDIO_REQUEST_CODE,
            granted: false,
        });

        assert_eq!(code(resolved(&mut started)), ErrorCode::PermissionDenied);
        assert_eq!(h.dispatcher.permission_state(), PermissionState::Idle);
        assert!(!h.dispatcher.is_recording());
    }

    #[test]
    fn test_unrelated_permission_result_is_ignored() {
        let mut h = Harness::new(HarnessOptions {
            granted: false,
            ..Default::default()
        });

        let mut started = call(&mut h, "start-capture");
        h.dispatcher.handle_signal(Signal::PermissionResult {
            request_code: 7,
            granted: true,
        });
        assert_eq!(started.try_recv(), Err(TryRecvError::Empty));

        h.dispatcher.handle_signal(Signal::PermissionResult {
            request_code: RECORD_AUDIO_REQUEST_CODE,
            granted: false,
        });
        assert_eq!(code(resolved(&mut started)), ErrorCode::PermissionDenied);

        // A late duplicate result finds nothing pending and does nothing
        h.dispatcher.handle_signal(Signal::PermissionResult {
            request_code: RECORD_AUDIO_REQUEST_CODE,
            granted: true,
        });
        assert!(!h.dispatcher.is_recording());
    }

    #[test]
    fn test_second_start_while_awaiting_permission_is_rejected() {
        let mut h = Harness::new(HarnessOptions {
            granted: false,
            ..Default::default()
        });

        let mut first = call(&mut h, "start-capture");
        let mut second = call(&mut h, "start-capture");
        assert_eq!(code(resolved(&mut second)), ErrorCode::AlreadyRecording);
        assert_eq!(first.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(h.permission.requests().len(), 1);

        h.dispatcher.handle_signal(Signal::PermissionResult {
            request_code: RECORD_AUDIO_REQUEST_CODE,
            granted: true,
        });
        assert_eq!(resolved(&mut first), Ok(Status::Started.into()));
    }

    #[test]
    fn test_granted_but_capture_fails_after_permission() {
        let mut h = Harness::new(HarnessOptions {
            granted: false,
            fail_start: true,
            ..Default::default()
        });

        let mut started = call(&mut h, "start-capture");
        h.dispatcher.handle_signal(Signal::PermissionResult {
            request_code: RECORD_AUDIO_REQUEST_CODE,
            granted: true,
        });

        let err = resolved(&mut started).unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::StartFailed));
        assert_eq!(h.dispatcher.permission_state(), PermissionState::Idle);
    }

    #[test]
    fn test_permission_request_failure_denies_immediately() {
        let mut h = Harness::new(HarnessOptions {
            granted: false,
            fail_permission_request: true,
            ..Default::default()
        });

        let mut started = call(&mut h, "start-capture");
        assert_eq!(code(resolved(&mut started)), ErrorCode::PermissionDenied);
        assert_eq!(h.dispatcher.permission_state(), PermissionState::Idle);
    }

    #[test]
    fn test_play_without_path_is_missing_path() {
        let mut h = Harness::new(HarnessOptions::default());
        let mut played = call(&mut h, "play-audio");
        assert_eq!(code(resolved(&mut played)), ErrorCode::MissingPath);
    }

    #[test]
    fn test_play_nonexistent_path_fails() {
        let mut h = Harness::new(HarnessOptions::default());
        let mut played = h.call(MethodCall::new(
            "play-audio",
            json!({ "path": "/no/such/record_1.m4a" }),
        ));
        assert_eq!(code(resolved(&mut played)), ErrorCode::PlayFailed);
        assert!(!h.dispatcher.is_playing());
    }

    #[test]
    fn test_stop_audio_without_player() {
        let mut h = Harness::new(HarnessOptions::default());
        let mut stopped = call(&mut h, "stop-audio");
        assert_eq!(resolved(&mut stopped), Ok(Status::Stopped.into()));
    }

    #[test]
    fn test_playback_completion_notifies_once() {
        let mut h = Harness::new(HarnessOptions::default());
        let path = h.write_audio("record_song.m4a");

        let mut played = h.call(MethodCall::new(
            "playAudio",
            json!({ "path": path.to_string_lossy() }),
        ));
        assert_eq!(resolved(&mut played), Ok(Status::Playing.into()));
        assert!(h.dispatcher.is_playing());

        h.playback.finish_current();
        h.pump_signals();

        assert_eq!(
            h.events.events(),
            vec![BridgeEvent::PlaybackComplete { path: path.clone() }]
        );
        assert!(!h.dispatcher.is_playing());
        assert_eq!(h.playback.releases(), 1);

        let mut stopped = call(&mut h, "stop-audio");
        assert_eq!(resolved(&mut stopped), Ok(Status::Stopped.into()));
        assert_eq!(h.events.events().len(), 1);
    }

    #[test]
    fn test_completion_from_replaced_player_is_ignored() {
        let mut h = Harness::new(HarnessOptions::default());
        let first = h.write_audio("record_a.m4a");
        let second = h.write_audio("record_b.m4a");

        let _ = h.call(Command::PlayAudio { path: Some(first) }.into_call());
        let stale = h.playback.take_completion().unwrap();
        let _ = h.call(
            Command::PlayAudio {
                path: Some(second.clone()),
            }
            .into_call(),
        );

        stale();
        h.pump_signals();
        assert!(h.events.events().is_empty());
        assert!(h.dispatcher.is_playing());

        h.playback.finish_current();
        h.pump_signals();
        assert_eq!(
            h.events.events(),
            vec![BridgeEvent::PlaybackComplete { path: second }]
        );
    }

    #[test]
    fn test_event_delivery_failure_still_tears_down() {
        let mut h = Harness::new(HarnessOptions {
            fail_events: true,
            ..Default::default()
        });
        let path = h.write_audio("record_song.m4a");

        let _ = h.call(Command::PlayAudio { path: Some(path) }.into_call());
        h.playback.finish_current();
        h.pump_signals();

        assert!(!h.dispatcher.is_playing());
    }

    #[test]
    fn test_play_replaces_existing_player() {
        let mut h = Harness::new(HarnessOptions::default());
        let path = h.write_audio("record_song.m4a");

        let _ = h.call(Command::PlayAudio { path: Some(path.clone()) }.into_call());
        let mut again = h.call(Command::PlayAudio { path: Some(path) }.into_call());

        assert_eq!(resolved(&mut again), Ok(Status::Playing.into()));
        assert_eq!(h.playback.releases(), 1);
        assert!(h.dispatcher.is_playing());
    }

    #[test]
    fn test_unknown_method_is_not_implemented() {
        let mut h = Harness::new(HarnessOptions::default());
        let mut result = call(&mut h, "seekAudio");
        assert_eq!(
            resolved(&mut result),
            Err(CallError::NotImplemented {
                method: "seekAudio".into()
            })
        );
    }

    #[test]
    fn test_shutdown_releases_handles_and_drops_pending() {
        let mut h = Harness::new(HarnessOptions {
            granted: false,
            ..Default::default()
        });
        let path = h.write_audio("record_song.m4a");
        let _ = h.call(Command::PlayAudio { path: Some(path) }.into_call());
        let mut pending = call(&mut h, "start-capture");

        h.dispatcher.shutdown();

        assert!(!h.dispatcher.is_playing());
        assert_eq!(h.dispatcher.permission_state(), PermissionState::Idle);
        assert_eq!(pending.try_recv(), Err(TryRecvError::Closed));
    }
}
