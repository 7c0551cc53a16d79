use std::path::PathBuf;

use audiosocket::config::DEFAULT_SLOT_BYTES;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "audiosocket", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Number of buffers cycled through the device (at least 2)
    #[arg(long, default_value_t = 2)]
    pub slots: usize,

    /// Bytes per buffer before frame alignment (larger => fewer wakeups, more latency)
    #[arg(long, default_value_t = DEFAULT_SLOT_BYTES)]
    pub slot_bytes: usize,

    /// Discard audio instead of opening a sound card, keeping real-time pacing
    #[arg(long)]
    pub null_output: bool,

    /// Print the playback report as JSON on stdout when done
    #[arg(long)]
    pub report_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream a PCM file to the output device
    Play {
        /// Path to a .wav or raw PCM file, or `-` for stdin
        path: PathBuf,

        /// Treat the input as headerless PCM even if it looks like a WAV file
        #[arg(long)]
        raw: bool,

        /// Channel count for raw input
        #[arg(long, default_value_t = 2)]
        channels: u16,

        /// Sample rate in Hz for raw input
        #[arg(long, default_value_t = 44_100)]
        rate: u32,

        /// Bits per sample for raw input (8 or 16)
        #[arg(long, default_value_t = 16)]
        bits: u16,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_defaults_to_cd_audio() {
        let args = Args::try_parse_from(["audiosocket", "play", "song.pcm"]).unwrap();
        assert_eq!(args.slots, 2);
        assert_eq!(args.slot_bytes, DEFAULT_SLOT_BYTES);
        let Some(Command::Play {
            path,
            raw,
            channels,
            rate,
            bits,
        }) = args.cmd
        else {
            panic!("expected play");
        };
        assert_eq!(path, PathBuf::from("song.pcm"));
        assert!(!raw);
        assert_eq!((channels, rate, bits), (2, 44_100, 16));
    }

    #[test]
    fn global_flags_parse_without_subcommand() {
        let args = Args::try_parse_from(["audiosocket", "--list-devices", "--device", "usb"])
            .unwrap();
        assert!(args.list_devices);
        assert_eq!(args.device.as_deref(), Some("usb"));
        assert!(args.cmd.is_none());
    }
}
