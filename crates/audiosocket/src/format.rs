//! PCM stream format and the byte/time arithmetic derived from it.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::{PlayError, Result};

/// Interleaved integer PCM format shared by the source and the device.
///
/// 8-bit samples are unsigned, 16-bit samples are signed little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AudioFormat {
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

impl AudioFormat {
    /// Build a validated format.
    ///
    /// Rejects zero channels, a zero sample rate, and any bit depth other than 8 or 16.
    pub fn new(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Result<Self> {
        if channels == 0 {
            return Err(PlayError::InvalidFormat("channel count must be at least 1".into()));
        }
        if sample_rate == 0 {
            return Err(PlayError::InvalidFormat("sample rate must be positive".into()));
        }
        if bits_per_sample != 8 && bits_per_sample != 16 {
            return Err(PlayError::InvalidFormat(format!(
                "{bits_per_sample} bits per sample (only 8 and 16 are supported)"
            )));
        }
        Ok(Self {
            channels,
            sample_rate,
            bits_per_sample,
        })
    }

    /// CD audio: 2 channels, 44.1 kHz, 16-bit.
    pub fn cd() -> Self {
        Self {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    /// Bytes per sample of a single channel.
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Size of one interleaved frame in bytes.
    pub fn block_align(&self) -> usize {
        usize::from(self.channels) * self.bytes_per_sample()
    }

    /// Bytes consumed per second of playback.
    pub fn avg_bytes_per_sec(&self) -> u64 {
        u64::from(self.sample_rate) * self.block_align() as u64
    }

    /// Round `bytes` down to a whole number of frames.
    pub fn align_down(&self, bytes: usize) -> usize {
        bytes - bytes % self.block_align()
    }

    /// Whether `bytes` is a whole number of frames.
    pub fn is_aligned(&self, bytes: usize) -> bool {
        bytes % self.block_align() == 0
    }

    /// Playback time of `bytes` of audio in this format, truncated to whole nanoseconds.
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let nanos = (bytes as u128 * 1_000_000_000) / u128::from(self.avg_bytes_per_sec());
        Duration::from_nanos(nanos as u64)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ch, {} Hz, {}-bit",
            self.channels, self.sample_rate, self.bits_per_sample
        )
    }
}
