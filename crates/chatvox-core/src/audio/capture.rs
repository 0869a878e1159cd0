//! Microphone capture into a 16-bit PCM WAV file.
//!
//! The cpal stream lives on a dedicated capture thread for the whole session;
//! the session handle only holds the stop channel and the join handle.

use anyhow::{Context, Result, anyhow, bail};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use hound::{WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::devices::find_input_device;
use crate::platform::{CaptureBackend, CaptureConfig, CaptureSession};

type SharedWriter = Arc<Mutex<Option<WavWriter<BufWriter<File>>>>>;

/// Records the configured (or default) input device.
#[derive(Debug, Clone, Default)]
pub struct CpalCapture {
    device_name: Option<String>,
}

impl CpalCapture {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }
}

impl CaptureBackend for CpalCapture {
    fn config(&self) -> CaptureConfig {
        CaptureConfig::DESKTOP
    }

    fn start(&mut self, output: &Path) -> Result<Box<dyn CaptureSession>> {
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = mpsc::channel();
        let output = output.to_path_buf();
        let device_name = self.device_name.clone();

        let worker = thread::Builder::new()
            .name("chatvox-capture".into())
            .spawn(move || run_capture(output, device_name, ready_tx, stop_rx))
            .context("Failed to spawn capture thread")?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalSession {
                stop_tx: Some(stop_tx),
                worker: Some(worker),
            })),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                bail!("Capture thread exited before the stream started")
            }
        }
    }
}

struct CpalSession {
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<Result<()>>>,
}

impl CpalSession {
    fn join(&mut self) -> Result<()> {
        // Dropping the sender also wakes the capture thread
        self.stop_tx = None;
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| anyhow!("Capture thread panicked"))?,
            None => Ok(()),
        }
    }
}

impl CaptureSession for CpalSession {
    fn stop(&mut self) -> Result<()> {
        let worker = self.worker.as_ref().context("Capture already stopped")?;
        if let Some(tx) = &self.stop_tx {
            let _ = tx.send(());
        }
        if worker.is_finished() {
            log::debug!("Capture thread ended before stop was requested");
        }
        self.join()
    }

    fn release(mut self: Box<Self>) -> Result<()> {
        self.join()
    }
}

fn run_capture(
    output: PathBuf,
    device_name: Option<String>,
    ready: SyncSender<Result<()>>,
    stop: Receiver<()>,
) -> Result<()> {
    let (stream, writer, errors) = match open_stream(&output, device_name.as_deref()) {
        Ok(parts) => parts,
        Err(e) => {
            let _ = ready.send(Err(e));
            return Ok(());
        }
    };
    let _ = ready.send(Ok(()));

    // Blocks until stop is requested or the session is dropped
    let _ = stop.recv();
    drop(stream);

    let error_count = errors.load(Ordering::Relaxed);
    if error_count > 0 {
        log::debug!("Capture finished with {error_count} non-fatal stream errors");
    }

    let writer = writer
        .lock()
        .map_err(|_| anyhow!("WAV writer lock poisoned"))?
        .take();
    match writer {
        Some(writer) => writer.finalize().context("Failed to finalize WAV file"),
        None => Ok(()),
    }
}

fn open_stream(
    output: &Path,
    device_name: Option<&str>,
) -> Result<(Stream, SharedWriter, Arc<AtomicU64>)> {
    let device = find_input_device(device_name)?;
    let supported = device
        .default_input_config()
        .context("Failed to get default input config")?;
    let config: StreamConfig = supported.config();

    let spec = WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate.0,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let writer = WavWriter::create(output, spec).context("Failed to create WAV writer")?;
    let writer: SharedWriter = Arc::new(Mutex::new(Some(writer)));
    let errors = Arc::new(AtomicU64::new(0));

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, writer.clone(), errors.clone()),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, writer.clone(), errors.clone()),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, writer.clone(), errors.clone()),
        SampleFormat::I32 => build_stream::<i32>(&device, &config, writer.clone(), errors.clone()),
        other => bail!("Unsupported input sample format: {other:?}"),
    }?;
    stream.play().context("Failed to start input stream")?;

    log::debug!(
        "Capturing {} ch @ {} Hz into {}",
        spec.channels,
        spec.sample_rate,
        output.display()
    );
    Ok((stream, writer, errors))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    writer: SharedWriter,
    errors: Arc<AtomicU64>,
) -> Result<Stream>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let stream_errors = errors.clone();
    // Stream errors are common with USB audio on Linux and don't stop capture
    let err_fn = move |err: cpal::StreamError| {
        let count = stream_errors.fetch_add(1, Ordering::Relaxed);
        if count == 0 {
            log::warn!("Audio stream error (non-fatal, further ones suppressed): {err}");
        } else if count.is_multiple_of(1000) {
            log::debug!("Audio stream: {count} non-fatal errors so far");
        }
    };

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let Ok(mut guard) = writer.lock() else {
                return;
            };
            let Some(wav) = guard.as_mut() else {
                return;
            };
            for &sample in data {
                if wav.write_sample(i16::from_sample(sample)).is_err() {
                    errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
