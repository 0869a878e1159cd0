//! Play a recording until it finishes or Ctrl-C

use anyhow::Result;
use chatvox_core::BridgeEvent;
use std::path::PathBuf;

use crate::app;

pub async fn run(dir: Option<PathBuf>, path: PathBuf) -> Result<()> {
    let mut session = app::open_session(dir)?;
    let bridge = session.bridge.clone();

    if let Err(e) = app::expect_reply(bridge.play_audio(Some(path.clone())).await) {
        bridge.shutdown();
        return Err(e);
    }
    println!("Playing {} (Ctrl-C to stop)", path.display());

    tokio::select! {
        event = session.events.recv() => match event {
            Some(BridgeEvent::PlaybackComplete { path }) => println!("Finished {}", path.display()),
            None => tracing::debug!("Event channel closed"),
        },
        _ = tokio::signal::ctrl_c() => println!("Stopped"),
    }

    let stopped = app::expect_reply(bridge.stop_audio().await);
    bridge.shutdown();
    stopped.map(|_| ())
}
