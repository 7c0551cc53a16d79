//! Output device discovery and selection.
//!
//! Thin wrappers around CPAL for:
//! - listing available output devices
//! - selecting either the default device or a device by substring match
//! - finding a stream config that plays an [`AudioFormat`] without conversion of rate or layout

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::{PlayError, Result};
use crate::format::AudioFormat;

/// Lightweight output device metadata for `--list-devices`.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub name: String,
    pub max_channels: u16,
    pub min_rate: u32,
    pub max_rate: u32,
}

/// Pick a CPAL output device.
///
/// - If `needle` is `Some`, chooses the first output device whose name contains the substring
///   (case-insensitive).
/// - Otherwise, returns the host default output device.
pub fn pick_device(
    host: &cpal::Host,
    needle: Option<&str>,
    format: &AudioFormat,
) -> Result<cpal::Device> {
    let unavailable = |reason: String| PlayError::DeviceUnavailable {
        format: format.to_string(),
        reason,
    };

    if let Some(needle) = needle {
        let devices = host
            .output_devices()
            .map_err(|e| unavailable(format!("cannot enumerate output devices: {e}")))?;
        for d in devices {
            let matched = d
                .description()
                .ok()
                .map(|n| matches_device_name(&n.name(), needle))
                .unwrap_or(false);
            if matched {
                return Ok(d);
            }
        }
        return Err(unavailable(format!("no output device matched '{needle}'")));
    }

    host.default_output_device()
        .ok_or_else(|| unavailable("no default output device".to_string()))
}

/// Choose a stream config with exactly `format`'s channel count and sample rate.
///
/// Among matching ranges the device sample type closest to the source depth wins
/// (`i16` for 16-bit, `u8` for 8-bit), then `f32`, then wider integers.
pub fn pick_output_config(
    device: &cpal::Device,
    format: &AudioFormat,
) -> Result<cpal::SupportedStreamConfig> {
    let unavailable = |reason: String| PlayError::DeviceUnavailable {
        format: format.to_string(),
        reason,
    };
    let ranges: Vec<cpal::SupportedStreamConfigRange> = device
        .supported_output_configs()
        .map_err(|e| unavailable(format!("cannot query output configs: {e}")))?
        .collect();

    let mut best: Option<(u8, cpal::SupportedStreamConfig)> = None;
    for range in ranges {
        if range.channels() != format.channels() {
            continue;
        }
        if !rate_in_range(range.min_sample_rate(), range.max_sample_rate(), format.sample_rate()) {
            continue;
        }
        let Some(rank) = sample_format_rank(range.sample_format(), format.bits_per_sample()) else {
            continue;
        };
        let replace = match &best {
            None => true,
            Some((best_rank, _)) => rank < *best_rank,
        };
        if replace {
            best = Some((rank, range.with_sample_rate(format.sample_rate())));
        }
    }

    best.map(|(_, cfg)| cfg)
        .ok_or_else(|| unavailable("device has no matching output config".to_string()))
}

/// Return output device metadata for device selection UIs.
pub fn list_device_infos(host: &cpal::Host) -> Result<Vec<DeviceInfo>> {
    let devices = host.output_devices().map_err(|e| PlayError::DeviceUnavailable {
        format: "any".to_string(),
        reason: format!("cannot enumerate output devices: {e}"),
    })?;
    let mut out = Vec::new();
    for d in devices {
        let Ok(desc) = d.description() else {
            continue;
        };
        let mut info = DeviceInfo {
            name: desc.to_string(),
            max_channels: 0,
            min_rate: u32::MAX,
            max_rate: 0,
        };
        if let Ok(ranges) = d.supported_output_configs() {
            for r in ranges {
                info.max_channels = info.max_channels.max(r.channels());
                info.min_rate = info.min_rate.min(r.min_sample_rate());
                info.max_rate = info.max_rate.max(r.max_sample_rate());
            }
        }
        if info.max_rate == 0 {
            tracing::warn!(device = %info.name, "skipping device without output configs");
            continue;
        }
        out.push(info);
    }
    Ok(out)
}

fn rate_in_range(min: u32, max: u32, rate: u32) -> bool {
    rate >= min && rate <= max
}

fn sample_format_rank(format: cpal::SampleFormat, bits: u16) -> Option<u8> {
    match (bits, format) {
        (16, cpal::SampleFormat::I16) | (8, cpal::SampleFormat::U8) => Some(0),
        (_, cpal::SampleFormat::F32) => Some(1),
        (_, cpal::SampleFormat::I32) => Some(2),
        (_, cpal::SampleFormat::I16) => Some(3),
        (_, cpal::SampleFormat::U16) => Some(4),
        (_, cpal::SampleFormat::U8) => Some(5),
        _ => None,
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}
