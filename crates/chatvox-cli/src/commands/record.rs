//! Record from the microphone until Enter is pressed

use anyhow::{Result, bail};
use chatvox_core::Reply;
use std::path::PathBuf;

use crate::app;

pub async fn run(dir: Option<PathBuf>) -> Result<()> {
    let session = app::open_session(dir)?;
    let bridge = session.bridge;

    if let Err(e) = app::expect_reply(bridge.start_capture().await) {
        bridge.shutdown();
        return Err(e);
    }
    println!("Recording... press Enter to stop");

    // Stop even if the terminal wait failed, so the file is finalized
    let waited = tokio::task::spawn_blocking(app::wait_for_enter).await?;
    let stopped = app::expect_reply(bridge.stop_capture().await);
    bridge.shutdown();
    waited?;

    match stopped? {
        Reply::Stopped(recording) => {
            println!(
                "Saved {} ({})",
                recording.path.display(),
                app::format_size(recording.size)
            );
            Ok(())
        }
        other => bail!("unexpected reply to stop-capture: {other:?}"),
    }
}
