//! List recorded files

use anyhow::{Result, bail};
use chatvox_core::Reply;
use std::path::PathBuf;

use crate::app;

pub async fn run(dir: Option<PathBuf>) -> Result<()> {
    let session = app::open_session(dir)?;
    let reply = app::expect_reply(session.bridge.list_recordings().await);
    session.bridge.shutdown();

    let Reply::Recordings(recordings) = reply? else {
        bail!("unexpected reply to list-recordings");
    };

    if recordings.is_empty() {
        println!("No recordings yet");
        return Ok(());
    }

    for recording in recordings {
        println!(
            "{:>10}  {:>8}  {}",
            app::format_size(recording.size),
            app::format_age(recording.modified),
            recording.path.display()
        );
    }
    Ok(())
}
