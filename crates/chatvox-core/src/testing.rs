//! In-memory backends for dispatcher and bridge tests.

use anyhow::{Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};

use crate::bridge::{BridgeMessage, SignalSender};
use crate::command::MethodCall;
use crate::dispatcher::{Backends, Dispatcher, Responder};
use crate::error::Outcome;
use crate::events::BridgeEvent;
use crate::platform::{
    CaptureBackend, CaptureConfig, CaptureSession, CompletionCallback, EventSink, PermissionGate,
    PlaybackBackend, PlaybackSession,
};
use crate::storage::RecordingsDir;

/// Bytes a fake capture session writes on stop
pub const FAKE_AUDIO: &[u8] = b"\x00\x00\x00\x18ftypM4A fake audio payload";

#[derive(Clone, Copy)]
pub struct HarnessOptions {
    pub granted: bool,
    pub fail_start: bool,
    pub fail_stop: bool,
    pub fail_permission_request: bool,
    pub fail_events: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            granted: true,
            fail_start: false,
            fail_stop: false,
            fail_permission_request: false,
            fail_events: false,
        }
    }
}

// ─── Capture ───

#[derive(Clone, Default)]
pub struct CaptureProbe(Arc<Mutex<(usize, usize)>>);

impl CaptureProbe {
    pub fn starts(&self) -> usize {
        self.0.lock().unwrap().0
    }

    pub fn releases(&self) -> usize {
        self.0.lock().unwrap().1
    }
}

struct FakeCapture {
    probe: CaptureProbe,
    fail_start: bool,
    fail_stop: bool,
}

impl CaptureBackend for FakeCapture {
    fn config(&self) -> CaptureConfig {
        CaptureConfig::MOBILE
    }

    fn start(&mut self, output: &Path) -> Result<Box<dyn CaptureSession>> {
        if self.fail_start {
            bail!("microphone unavailable");
        }
        self.probe.0.lock().unwrap().0 += 1;
        Ok(Box::new(FakeCaptureSession {
            output: output.to_path_buf(),
            probe: self.probe.clone(),
            fail_stop: self.fail_stop,
        }))
    }
}

struct FakeCaptureSession {
    output: PathBuf,
    probe: CaptureProbe,
    fail_stop: bool,
}

impl CaptureSession for FakeCaptureSession {
    fn stop(&mut self) -> Result<()> {
        if self.fail_stop {
            bail!("stop called in an invalid state");
        }
        fs::write(&self.output, FAKE_AUDIO)?;
        Ok(())
    }

    fn release(self: Box<Self>) -> Result<()> {
        self.probe.0.lock().unwrap().1 += 1;
        Ok(())
    }
}

// ─── Playback ───

#[derive(Default)]
struct PlaybackLog {
    current: Option<CompletionCallback>,
    releases: usize,
}

#[derive(Clone, Default)]
pub struct PlaybackProbe(Arc<Mutex<PlaybackLog>>);

impl PlaybackProbe {
    /// Simulate the current media reaching its end
    pub fn finish_current(&self) {
        if let Some(on_complete) = self.take_completion() {
            on_complete();
        }
    }

    pub fn take_completion(&self) -> Option<CompletionCallback> {
        self.0.lock().unwrap().current.take()
    }

    pub fn releases(&self) -> usize {
        self.0.lock().unwrap().releases
    }
}

struct FakePlayback {
    probe: PlaybackProbe,
}

impl PlaybackBackend for FakePlayback {
    fn play(
        &mut self,
        path: &Path,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn PlaybackSession>> {
        if !path.is_file() {
            bail!("cannot open {}", path.display());
        }
        self.probe.0.lock().unwrap().current = Some(on_complete);
        Ok(Box::new(FakePlaybackSession {
            probe: self.probe.clone(),
            playing: true,
        }))
    }
}

struct FakePlaybackSession {
    probe: PlaybackProbe,
    playing: bool,
}

impl PlaybackSession for FakePlaybackSession {
    fn is_playing(&self) -> bool {
        self.playing
    }

    fn stop(&mut self) -> Result<()> {
        self.playing = false;
        Ok(())
    }

    fn release(self: Box<Self>) -> Result<()> {
        self.probe.0.lock().unwrap().releases += 1;
        Ok(())
    }
}

// ─── Permission ───

#[derive(Clone, Default)]
pub struct PermissionProbe {
    granted: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<i32>>>,
}

impl PermissionProbe {
    pub fn grant(&self) {
        self.granted.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<i32> {
        self.requests.lock().unwrap().clone()
    }
}

struct FakePermission {
    probe: PermissionProbe,
    fail_request: bool,
}

impl PermissionGate for FakePermission {
    fn is_granted(&self) -> bool {
        self.probe.granted.load(Ordering::SeqCst)
    }

    fn request(&mut self, request_code: i32) -> Result<()> {
        if self.fail_request {
            bail!("no activity to show the prompt");
        }
        self.probe.requests.lock().unwrap().push(request_code);
        Ok(())
    }
}

// ─── Events ───

#[derive(Clone, Default)]
pub struct EventProbe(Arc<Mutex<Vec<BridgeEvent>>>);

impl EventProbe {
    pub fn events(&self) -> Vec<BridgeEvent> {
        self.0.lock().unwrap().clone()
    }
}

struct FakeEvents {
    probe: EventProbe,
    fail: bool,
}

impl EventSink for FakeEvents {
    fn emit(&self, event: BridgeEvent) -> Result<()> {
        if self.fail {
            bail!("caller is gone");
        }
        self.probe.0.lock().unwrap().push(event);
        Ok(())
    }
}

// ─── Wiring ───

/// Observers for the fake backends, plus the recordings directory.
#[derive(Clone)]
pub struct Probes {
    temp: Arc<TempDir>,
    pub capture: CaptureProbe,
    pub playback: PlaybackProbe,
    pub permission: PermissionProbe,
    pub events: EventProbe,
}

impl Probes {
    pub fn dir(&self) -> &Path {
        self.temp.path()
    }

    /// Create a playable file in the recordings directory
    pub fn write_audio(&self, name: &str) -> PathBuf {
        let path = self.dir().join(name);
        fs::write(&path, FAKE_AUDIO).unwrap();
        path
    }
}

/// Everything needed to build a dispatcher on another thread.
pub struct Parts {
    backends: Backends,
    recordings: RecordingsDir,
}

impl Parts {
    pub fn into_dispatcher(self, signals: SignalSender) -> Dispatcher {
        Dispatcher::new(self.backends, self.recordings, signals)
    }
}

/// A dispatcher driven directly from the test thread.
pub struct Harness {
    pub dispatcher: Dispatcher,
    probes: Probes,
    signals: mpsc::UnboundedReceiver<BridgeMessage>,
    // Keeps the signal queue open; the dispatcher only holds a weak sender
    _tx: mpsc::UnboundedSender<BridgeMessage>,
}

impl Harness {
    pub fn new(options: HarnessOptions) -> Self {
        let (parts, probes) = Self::parts(options);
        let (tx, signals) = mpsc::unbounded_channel();
        Self {
            dispatcher: parts.into_dispatcher(SignalSender::new(&tx)),
            probes,
            signals,
            _tx: tx,
        }
    }

    pub fn parts(options: HarnessOptions) -> (Parts, Probes) {
        let probes = Probes {
            temp: Arc::new(tempfile::tempdir().unwrap()),
            capture: CaptureProbe::default(),
            playback: PlaybackProbe::default(),
            permission: PermissionProbe::default(),
            events: EventProbe::default(),
        };
        if options.granted {
            probes.permission.grant();
        }

        let backends = Backends {
            capture: Box::new(FakeCapture {
                probe: probes.capture.clone(),
                fail_start: options.fail_start,
                fail_stop: options.fail_stop,
            }),
            playback: Box::new(FakePlayback {
                probe: probes.playback.clone(),
            }),
            permission: Box::new(FakePermission {
                probe: probes.permission.clone(),
                fail_request: options.fail_permission_request,
            }),
            events: Box::new(FakeEvents {
                probe: probes.events.clone(),
                fail: options.fail_events,
            }),
        };
        let recordings = RecordingsDir::new(probes.dir(), CaptureConfig::MOBILE.container);

        (
            Parts {
                backends,
                recordings,
            },
            probes,
        )
    }

    pub fn call(&mut self, call: MethodCall) -> oneshot::Receiver<Outcome> {
        let (responder, rx) = Responder::channel();
        self.dispatcher.handle(call, responder);
        rx
    }

    /// Deliver queued signals (playback completions) to the dispatcher
    pub fn pump_signals(&mut self) {
        while let Ok(message) = self.signals.try_recv() {
            if let BridgeMessage::Signal(signal) = message {
                self.dispatcher.handle_signal(signal);
            }
        }
    }
}

impl std::ops::Deref for Harness {
    type Target = Probes;

    fn deref(&self) -> &Probes {
        &self.probes
    }
}
