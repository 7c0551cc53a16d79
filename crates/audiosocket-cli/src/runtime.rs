//! CLI runtime helpers.
//!
//! Provides device enumeration and local playback through the stream scheduler.

use std::fs::File;
use std::io::{BufReader, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use audiosocket::device::select::list_device_infos;
use audiosocket::device::{CpalBackend, NullBackend};
use audiosocket::{
    AudioBackend, AudioFormat, ByteSource, PlaybackReport, ReadSource, SchedulerConfig,
    StoppableSource, StreamScheduler, wav,
};

use crate::config::{InputKind, PlayConfig};

/// List output devices and print them to stdout.
pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    let infos = list_device_infos(&host).context("list output devices")?;
    for (i, info) in infos.iter().enumerate() {
        println!(
            "#{i}: {} (up to {} ch, {}-{} Hz)",
            info.name, info.max_channels, info.min_rate, info.max_rate
        );
    }
    Ok(())
}

/// Stream the configured input to the output device until it ends or Ctrl-C is pressed.
pub fn run_play(config: PlayConfig) -> Result<PlaybackReport> {
    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc(stop.clone());

    let (format, source) = open_input(&config)?;
    let mut source = StoppableSource::new(source, stop);
    tracing::info!(path = ?config.path, %format, "source");

    let report = if config.null_output {
        stream(&NullBackend, format, &config.scheduler, &mut source)?
    } else {
        let backend = CpalBackend::new(normalize_device_name(config.device.clone()))
            .with_max_in_flight(config.scheduler.slot_count);
        stream(&backend, format, &config.scheduler, &mut source)?
    };

    tracing::info!(
        submissions = report.submissions,
        audio_ms = report.audio_ms,
        elapsed_ms = report.elapsed_ms,
        checks_per_buffer = report.checks_per_buffer(),
        "playback summary"
    );
    if report.underruns > 0 {
        tracing::warn!(underruns = report.underruns, "playback had gaps");
    }
    if config.report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(report)
}

/// Open the device, play `source` to the end and release the device.
fn stream<B: AudioBackend>(
    backend: &B,
    format: AudioFormat,
    scheduler: &SchedulerConfig,
    source: &mut dyn ByteSource,
) -> Result<PlaybackReport> {
    let mut sched = StreamScheduler::open(backend, format, scheduler.clone())
        .context("open output device")?;
    let report = sched.play(source).context("stream audio")?;
    sched.close().context("close output device")?;
    Ok(report)
}

fn open_input(config: &PlayConfig) -> Result<(AudioFormat, Box<dyn ByteSource>)> {
    match config.input {
        InputKind::Wav => {
            let wav = wav::open_wav(&config.path)
                .with_context(|| format!("open wav {:?}", config.path))?;
            tracing::info!(data_bytes = wav.data_bytes, "wav data chunk");
            Ok((wav.format, Box::new(wav.source)))
        }
        InputKind::Raw(format) => {
            let reader: Box<dyn Read> = if config.reads_stdin() {
                Box::new(std::io::stdin().lock())
            } else {
                let file = File::open(&config.path)
                    .with_context(|| format!("open {:?}", config.path))?;
                Box::new(BufReader::new(file))
            };
            Ok((format, Box::new(ReadSource::new(reader))))
        }
    }
}

/// First Ctrl-C drains what is already queued; a second one exits immediately.
fn install_ctrlc(stop: Arc<AtomicBool>) {
    let result = ctrlc::set_handler(move || {
        if stop.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        tracing::info!("stopping after queued audio drains; press Ctrl-C again to quit");
    });
    if let Err(e) = result {
        tracing::warn!("ctrl-c handler not installed: {e}");
    }
}

fn normalize_device_name(device: Option<String>) -> Option<String> {
    device.and_then(|name| {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
