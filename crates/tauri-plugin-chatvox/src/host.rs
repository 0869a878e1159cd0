//! Backends that talk to the webview: event emission and the permission prompt.

use anyhow::{Context, Result};
use chatvox_core::{BridgeEvent, EventSink, PermissionGate, PermissionRequest};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tauri::{AppHandle, Emitter, Runtime};

/// Emits bridge events to every webview.
pub struct TauriEvents<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> TauriEvents<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> EventSink for TauriEvents<R> {
    fn emit(&self, event: BridgeEvent) -> Result<()> {
        self.app
            .emit(event.name(), event.payload())
            .with_context(|| format!("Failed to emit {}", event.name()))
    }
}

/// Asks the host for microphone access through a `permission-request` event.
///
/// The grant is cached in a flag shared with [`crate::Chatvox`], which sets it
/// when the host answers.
pub struct TauriPermission<R: Runtime> {
    app: AppHandle<R>,
    granted: Arc<AtomicBool>,
}

impl<R: Runtime> TauriPermission<R> {
    pub fn new(app: AppHandle<R>, granted: Arc<AtomicBool>) -> Self {
        Self { app, granted }
    }
}

impl<R: Runtime> PermissionGate for TauriPermission<R> {
    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request(&mut self, request_code: i32) -> Result<()> {
        log::debug!("Requesting microphone permission (code {request_code})");
        self.app
            .emit(
                PermissionRequest::EVENT,
                PermissionRequest::microphone(request_code),
            )
            .context("Failed to emit permission request")
    }
}
