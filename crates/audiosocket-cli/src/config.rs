use std::path::{Path, PathBuf};

use audiosocket::{AudioFormat, SchedulerConfig};

use crate::cli::{Args, Command};

/// How the input bytes are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    /// RIFF/WAV file; the format comes from its header.
    Wav,
    /// Headerless PCM in the given format.
    Raw(AudioFormat),
}

#[derive(Clone, Debug)]
pub struct PlayConfig {
    /// Input path; `-` reads stdin.
    pub path: PathBuf,
    pub input: InputKind,
    pub device: Option<String>,
    pub null_output: bool,
    pub report_json: bool,
    pub scheduler: SchedulerConfig,
}

impl PlayConfig {
    /// Build a play config from parsed arguments, or `None` when no `play` subcommand was given.
    pub fn from_args(args: &Args) -> audiosocket::Result<Option<Self>> {
        let Some(Command::Play {
            path,
            raw,
            channels,
            rate,
            bits,
        }) = &args.cmd
        else {
            return Ok(None);
        };

        let input = if !raw && is_wav_path(path) {
            InputKind::Wav
        } else {
            InputKind::Raw(AudioFormat::new(*channels, *rate, *bits)?)
        };
        let scheduler = SchedulerConfig {
            slot_count: args.slots,
            slot_bytes: args.slot_bytes,
            ..SchedulerConfig::default()
        };

        Ok(Some(Self {
            path: path.clone(),
            input,
            device: args.device.clone(),
            null_output: args.null_output,
            report_json: args.report_json,
            scheduler,
        }))
    }

    pub fn reads_stdin(&self) -> bool {
        self.path.as_os_str() == "-"
    }
}

fn is_wav_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}
