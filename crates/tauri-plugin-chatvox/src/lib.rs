use chatvox_core::audio::{CpalCapture, RodioPlayback};
use chatvox_core::{
    Backends, BridgeHandle, CaptureBackend, Dispatcher, RECORD_AUDIO_REQUEST_CODE, RecordingsDir,
    StorageLocations,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tauri::{
    AppHandle, Manager, Runtime,
    plugin::{Builder, TauriPlugin},
};

mod commands;
mod host;
mod models;

pub use host::{TauriEvents, TauriPermission};
pub use models::PluginConfig;

/// Managed state: the running bridge and the cached microphone grant.
pub struct Chatvox {
    bridge: BridgeHandle,
    microphone: Arc<AtomicBool>,
}

impl Chatvox {
    pub fn bridge(&self) -> &BridgeHandle {
        &self.bridge
    }

    /// Record the host's permission answer and resume a pending start.
    pub fn permission_result(&self, request_code: i32, granted: bool) {
        if request_code == RECORD_AUDIO_REQUEST_CODE {
            self.microphone.store(granted, Ordering::SeqCst);
        }
        self.bridge.permission_result(request_code, granted);
    }
}

/// Access the chatvox bridge from any Tauri manager.
pub trait ChatvoxExt<R: Runtime> {
    fn chatvox(&self) -> &Chatvox;
}

impl<R: Runtime, T: Manager<R>> ChatvoxExt<R> for T {
    fn chatvox(&self) -> &Chatvox {
        self.state::<Chatvox>().inner()
    }
}

/// Storage locations from Tauri's path resolver, with the config override.
fn resolve_locations(
    config: &PluginConfig,
    audio_dir: Option<PathBuf>,
    app_data_dir: PathBuf,
) -> StorageLocations {
    let external_music = config
        .recordings_dir
        .clone()
        .or_else(|| audio_dir.map(|dir| dir.join("chatvox")));
    StorageLocations {
        external_music,
        private_files: app_data_dir.join("recordings"),
    }
}

fn spawn_bridge<R: Runtime>(app: &AppHandle<R>, config: &PluginConfig) -> tauri::Result<Chatvox> {
    let locations = resolve_locations(
        config,
        app.path().audio_dir().ok(),
        app.path().app_data_dir()?,
    );
    let dir = locations.recordings_dir().to_path_buf();
    log::info!("Recordings directory: {}", dir.display());

    let microphone = Arc::new(AtomicBool::new(config.assume_microphone_granted));
    let device = config.microphone_device.clone();
    let app = app.clone();
    let granted = microphone.clone();

    let bridge = BridgeHandle::spawn(move |signals| {
        let capture = CpalCapture::new(device);
        let recordings = RecordingsDir::new(dir, capture.config().container);
        let backends = Backends {
            capture: Box::new(capture),
            playback: Box::new(RodioPlayback::new()),
            permission: Box::new(TauriPermission::new(app.clone(), granted)),
            events: Box::new(TauriEvents::new(app)),
        };
        Dispatcher::new(backends, recordings, signals)
    })
    .map_err(tauri::Error::Anyhow)?;

    Ok(Chatvox { bridge, microphone })
}

/// Initializes the plugin.
///
/// Capture always goes through cpal and writes WAV, on mobile targets too.
/// A host that wants `.m4a` recordings has to build the bridge itself with a
/// native [`chatvox_core::CaptureBackend`] reporting
/// [`chatvox_core::CaptureConfig::MOBILE`].
pub fn init<R: Runtime>() -> TauriPlugin<R, Option<PluginConfig>> {
    Builder::<R, Option<PluginConfig>>::new("chatvox")
        .invoke_handler(tauri::generate_handler![
            commands::invoke,
            commands::start_capture,
            commands::stop_capture,
            commands::list_recordings,
            commands::play_audio,
            commands::stop_audio,
            commands::permission_result,
        ])
        .setup(|app, api| {
            let config = api.config().clone().unwrap_or_default();
            let chatvox = spawn_bridge(app, &config)?;
            app.manage(chatvox);
            Ok(())
        })
        .on_drop(|app| {
            if let Some(chatvox) = app.try_state::<Chatvox>() {
                chatvox.bridge().shutdown();
            }
        })
        .build()
}
