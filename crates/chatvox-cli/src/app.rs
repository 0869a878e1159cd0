use anyhow::{Result, anyhow};
use chatvox_core::audio::{CpalCapture, RodioPlayback};
use chatvox_core::{
    Backends, BridgeEvent, BridgeHandle, CallError, CaptureBackend, Dispatcher, EventSink, Outcome,
    RecordingsDir, Reply, Settings, StaticPermission, StorageLocations,
};
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// A running bridge plus the reverse events it pushes
pub struct Session {
    pub bridge: BridgeHandle,
    pub events: mpsc::UnboundedReceiver<BridgeEvent>,
}

/// Forwards bridge events to the command that is waiting on them
struct ChannelEvents(mpsc::UnboundedSender<BridgeEvent>);

impl EventSink for ChannelEvents {
    fn emit(&self, event: BridgeEvent) -> Result<()> {
        self.0
            .send(event)
            .map_err(|_| anyhow!("event receiver dropped"))
    }
}

/// Directory recordings go to: `--dir`, then settings, then the platform default
pub fn recordings_dir(dir_override: Option<PathBuf>, settings: &Settings) -> PathBuf {
    dir_override.unwrap_or_else(|| {
        settings
            .storage(StorageLocations::desktop())
            .recordings_dir()
            .to_path_buf()
    })
}

/// Spawn the bridge with the desktop capture and playback backends
pub fn open_session(dir_override: Option<PathBuf>) -> Result<Session> {
    let settings = Settings::load();
    let dir = recordings_dir(dir_override, &settings);
    let device = settings.microphone_device;
    tracing::debug!("Recordings directory: {}", dir.display());

    let (tx, events) = mpsc::unbounded_channel();
    let bridge = BridgeHandle::spawn(move |signals| {
        let capture = CpalCapture::new(device);
        let recordings = RecordingsDir::new(dir, capture.config().container);
        let backends = Backends {
            capture: Box::new(capture),
            playback: Box::new(RodioPlayback::new()),
            permission: Box::new(StaticPermission::granted()),
            events: Box::new(ChannelEvents(tx)),
        };
        Dispatcher::new(backends, recordings, signals)
    })?;

    Ok(Session { bridge, events })
}

/// Turn a call outcome into a reply, or an error reading `CODE: message`
pub fn expect_reply(outcome: Outcome) -> Result<Reply> {
    outcome.map_err(|e| match e {
        CallError::Failed(err) => anyhow!("{err}"),
        other => anyhow!("{}: {other}", other.code()),
    })
}

pub fn wait_for_enter() -> Result<()> {
    std::io::stdout().flush()?;

    // Raw mode reads keypresses without echoing
    enable_raw_mode()?;
    let result = loop {
        match event::read() {
            Ok(Event::Key(key)) if key.code == KeyCode::Enter => break Ok(()),
            // Raw mode swallows SIGINT, so treat Ctrl-C like Enter
            Ok(Event::Key(key))
                if key.code == KeyCode::Char('c')
                    && key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                break Ok(());
            }
            Ok(_) => {}
            Err(e) => break Err(e.into()),
        }
    };
    disable_raw_mode()?;

    result
}

pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Rough age of a millisecond Unix timestamp, e.g. "5m ago"
pub fn format_age(modified_ms: u64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64;
    let secs = now.saturating_sub(modified_ms) / 1000;
    match secs {
        0..60 => format!("{secs}s ago"),
        60..3600 => format!("{}m ago", secs / 60),
        3600..86400 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86400),
    }
}
