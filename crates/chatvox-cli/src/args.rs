use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chatvox")]
#[command(version)]
#[command(about = "Record, list and play back voice messages")]
pub struct Cli {
    /// Log device and dispatcher activity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this recordings directory instead of the configured one
    #[arg(long, global = true, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record from the microphone until Enter is pressed
    Record,

    /// List recorded files
    List,

    /// Play a recording until it ends or Ctrl-C is pressed
    Play {
        /// File to play
        path: PathBuf,
    },

    /// List audio input devices
    Devices,

    /// Show or change settings
    Config {
        /// Store recordings in this directory
        #[arg(long, value_name = "PATH")]
        recordings_dir: Option<PathBuf>,

        /// Forget the recordings directory override
        #[arg(long, conflicts_with = "recordings_dir")]
        clear_recordings_dir: bool,

        /// Record from this input device
        #[arg(long, value_name = "NAME")]
        device: Option<String>,

        /// Record from the system default input device
        #[arg(long, conflicts_with = "device")]
        clear_device: bool,
    },
}
