mod app;
mod args;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Record => commands::record::run(cli.dir).await,
        Commands::List => commands::list::run(cli.dir).await,
        Commands::Play { path } => commands::play::run(cli.dir, path).await,
        Commands::Devices => commands::devices::run(),
        Commands::Config {
            recordings_dir,
            clear_recordings_dir,
            device,
            clear_device,
        } => commands::config::run(commands::config::ConfigChanges {
            recordings_dir,
            clear_recordings_dir,
            device,
            clear_device,
        }),
    }
}

/// `RUST_LOG` wins; otherwise warnings, or debug output with `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
