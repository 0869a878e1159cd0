//! File playback through the default output device.

use anyhow::{Context, Result, anyhow, bail};
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::platform::{CompletionCallback, PlaybackBackend, PlaybackSession};

/// How often the playback thread checks for end of media
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, Default)]
pub struct RodioPlayback;

impl RodioPlayback {
    pub fn new() -> Self {
        Self
    }
}

impl PlaybackBackend for RodioPlayback {
    fn play(
        &mut self,
        path: &Path,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn PlaybackSession>> {
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = mpsc::channel();
        let playing = Arc::new(AtomicBool::new(false));

        let path = path.to_path_buf();
        let thread_playing = playing.clone();
        let worker = thread::Builder::new()
            .name("chatvox-playback".into())
            .spawn(move || run_playback(path, on_complete, thread_playing, ready_tx, stop_rx))
            .context("Failed to spawn playback thread")?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(RodioSession {
                stop_tx: Some(stop_tx),
                worker: Some(worker),
                playing,
            })),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                bail!("Playback thread exited before playback started")
            }
        }
    }
}

struct RodioSession {
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    playing: Arc<AtomicBool>,
}

impl RodioSession {
    fn join(&mut self) -> Result<()> {
        self.stop_tx = None;
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| anyhow!("Playback thread panicked")),
            None => Ok(()),
        }
    }
}

impl PlaybackSession for RodioSession {
    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(tx) = &self.stop_tx {
            let _ = tx.send(());
        }
        self.join()
    }

    fn release(mut self: Box<Self>) -> Result<()> {
        self.join()
    }
}

fn run_playback(
    path: PathBuf,
    on_complete: CompletionCallback,
    playing: Arc<AtomicBool>,
    ready: SyncSender<Result<()>>,
    stop: Receiver<()>,
) {
    let (_stream, sink) = match open_sink(&path) {
        Ok(parts) => parts,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    playing.store(true, Ordering::SeqCst);
    let _ = ready.send(Ok(()));

    loop {
        match stop.recv_timeout(POLL_INTERVAL) {
            Err(RecvTimeoutError::Timeout) => {
                if sink.empty() {
                    playing.store(false, Ordering::SeqCst);
                    on_complete();
                    return;
                }
            }
            // Explicit stop, or the session handle went away
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                sink.stop();
                playing.store(false, Ordering::SeqCst);
                return;
            }
        }
    }
}

fn open_sink(path: &Path) -> Result<(OutputStream, Sink)> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut stream =
        OutputStreamBuilder::open_default_stream().context("Failed to open audio output")?;
    // rodio otherwise prints a line to stderr every time a playback ends
    stream.log_on_drop(false);
    let sink = rodio::play(stream.mixer(), BufReader::new(file))
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    Ok((stream, sink))
}
