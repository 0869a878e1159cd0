//! The asynchronous command channel.
//!
//! A single dispatcher thread owns the [`Dispatcher`] and processes calls and
//! platform signals strictly in arrival order. Callers hold a cheap, cloneable
//! [`BridgeHandle`] and await each call's outcome; a call that waits on the
//! permission prompt simply stays pending until the result signal arrives.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::command::{Command, MethodCall};
use crate::dispatcher::{Dispatcher, PlaybackToken, Responder};
use crate::error::{CallError, Outcome};

/// Platform events fed back into the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The platform answered a permission prompt
    PermissionResult { request_code: i32, granted: bool },
    /// A playback session reached the end of its media
    PlaybackFinished(PlaybackToken),
}

pub(crate) enum BridgeMessage {
    Call {
        call: MethodCall,
        responder: Responder,
    },
    Signal(Signal),
    Shutdown,
}

/// Delivers [`Signal`]s to the dispatcher thread from any thread.
///
/// Holds a weak sender: the dispatcher keeps one of these, and it must not
/// keep its own queue open once every [`BridgeHandle`] is gone.
#[derive(Clone)]
pub struct SignalSender {
    tx: mpsc::WeakUnboundedSender<BridgeMessage>,
}

impl SignalSender {
    pub(crate) fn new(tx: &mpsc::UnboundedSender<BridgeMessage>) -> Self {
        Self { tx: tx.downgrade() }
    }

    /// Send a signal. Dropped silently once the bridge has shut down.
    pub fn send(&self, signal: Signal) {
        let delivered = self
            .tx
            .upgrade()
            .is_some_and(|tx| tx.send(BridgeMessage::Signal(signal)).is_ok());
        if !delivered {
            log::debug!("Dropping {signal:?}: bridge is closed");
        }
    }
}

/// Caller-side handle to the dispatcher thread.
#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::UnboundedSender<BridgeMessage>,
}

impl BridgeHandle {
    /// Spawn the dispatcher thread.
    ///
    /// `build` runs on that thread, so the dispatcher and its backends never
    /// cross threads after construction. The thread exits on [`shutdown`]
    /// or once the last handle is dropped.
    ///
    /// [`shutdown`]: Self::shutdown
    pub fn spawn<F>(build: F) -> Result<Self>
    where
        F: FnOnce(SignalSender) -> Dispatcher + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let signals = SignalSender::new(&tx);

        std::thread::Builder::new()
            .name("chatvox-dispatcher".into())
            .spawn(move || {
                let mut dispatcher = build(signals);
                while let Some(message) = rx.blocking_recv() {
                    match message {
                        BridgeMessage::Call { call, responder } => {
                            dispatcher.handle(call, responder)
                        }
                        BridgeMessage::Signal(signal) => dispatcher.handle_signal(signal),
                        BridgeMessage::Shutdown => break,
                    }
                }
                dispatcher.shutdown();
                log::debug!("Dispatcher thread exiting");
            })
            .context("Failed to spawn dispatcher thread")?;

        Ok(Self { tx })
    }

    /// Send a raw call and wait for its outcome.
    pub async fn invoke(&self, call: MethodCall) -> Outcome {
        let (responder, rx) = Responder::channel();
        self.tx
            .send(BridgeMessage::Call { call, responder })
            .map_err(|_| CallError::Closed)?;
        rx.await.unwrap_or(Err(CallError::Closed))
    }

    /// Name + arguments form of [`invoke`](Self::invoke)
    pub async fn call(&self, method: &str, arguments: Value) -> Outcome {
        self.invoke(MethodCall::new(method, arguments)).await
    }

    pub async fn start_capture(&self) -> Outcome {
        self.invoke(Command::StartCapture.into_call()).await
    }

    pub async fn stop_capture(&self) -> Outcome {
        self.invoke(Command::StopCapture.into_call()).await
    }

    pub async fn list_recordings(&self) -> Outcome {
        self.invoke(Command::ListRecordings.into_call()).await
    }

    pub async fn play_audio(&self, path: Option<PathBuf>) -> Outcome {
        self.invoke(Command::PlayAudio { path }.into_call()).await
    }

    pub async fn stop_audio(&self) -> Outcome {
        self.invoke(Command::StopAudio.into_call()).await
    }

    /// Forward the platform's answer to a permission prompt
    pub fn permission_result(&self, request_code: i32, granted: bool) {
        self.signals().send(Signal::PermissionResult {
            request_code,
            granted,
        });
    }

    pub fn signals(&self) -> SignalSender {
        SignalSender::new(&self.tx)
    }

    /// Stop the dispatcher thread after the messages already queued.
    ///
    /// Device handles are released; a call still waiting on permission
    /// resolves with [`CallError::Closed`].
    pub fn shutdown(&self) {
        let _ = self.tx.send(BridgeMessage::Shutdown);
    }
}
