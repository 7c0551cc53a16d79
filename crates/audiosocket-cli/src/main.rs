//! audiosocket: stream raw PCM or WAV audio to an output device.
//!
//! A small pool of buffers is cycled between the input and the device. After
//! submitting, the player sleeps for one buffer's playback time before checking
//! the oldest buffer, so waiting costs roughly one status check per buffer.
//!
//! ## Modes
//! - `play <PATH|->`: stream a `.wav` file, or headerless PCM described by `--channels`,
//!   `--rate` and `--bits`.
//! - `--list-devices`: print output devices and exit.

use anyhow::Result;
use audiosocket_cli::{cli, config::PlayConfig, runtime};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,audiosocket=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.list_devices {
        return runtime::list_devices();
    }

    match PlayConfig::from_args(&args)? {
        Some(config) => {
            runtime::run_play(config)?;
        }
        None => {
            cli::Args::command().print_help()?;
        }
    }
    Ok(())
}
