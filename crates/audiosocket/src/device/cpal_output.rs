//! CPAL output stream adapter.
//!
//! The adapter owns a running output stream whose real-time callback:
//! - drains submitted slot buffers from a [`SubmissionQueue`] without waiting
//! - converts integer PCM bytes to the device sample type
//! - plays silence when the queue runs dry and counts the gap as an underrun
//!
//! Completion travels back to the driving thread as slot indices over a
//! `crossbeam-channel`; `poll_status` only ever reads that channel.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::Receiver;

use super::queue::{PushError, SubmissionQueue};
use super::{AudioBackend, BufferStatus, OutputDevice, check_submission, select};
use crate::error::{PlayError, Result};
use crate::format::AudioFormat;

const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Opens CPAL output streams on the default host.
#[derive(Clone, Debug, Default)]
pub struct CpalBackend {
    device: Option<String>,
    max_in_flight: Option<usize>,
}

impl CpalBackend {
    /// Select a device by case-insensitive name substring, or the host default when `None`.
    pub fn new(device: Option<String>) -> Self {
        Self {
            device,
            max_in_flight: None,
        }
    }

    /// Cap on buffers queued on the stream at once.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = Some(max.max(1));
        self
    }
}

impl AudioBackend for CpalBackend {
    type Device = CpalDevice;

    fn open(&self, format: &AudioFormat) -> Result<CpalDevice> {
        let host = cpal::default_host();
        let device = select::pick_device(&host, self.device.as_deref(), format)?;
        let config = select::pick_output_config(&device, format)?;
        let stream_config: cpal::StreamConfig = config.clone().into();
        let name = device
            .description()
            .map(|d| d.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        let queue = Arc::new(SubmissionQueue::new(
            self.max_in_flight.unwrap_or(DEFAULT_MAX_IN_FLIGHT),
            done_tx,
        ));
        let underrun_events = Arc::new(AtomicU64::new(0));
        let stream_reset = Arc::new(AtomicBool::new(false));
        let stream_error = Arc::new(Mutex::new(None));

        let stream = build_output_stream(
            &device,
            &stream_config,
            config.sample_format(),
            *format,
            StreamShared {
                queue: queue.clone(),
                underrun_events: underrun_events.clone(),
                stream_reset: stream_reset.clone(),
                stream_error: stream_error.clone(),
            },
        )?;
        stream.play().map_err(|e| PlayError::DeviceUnavailable {
            format: format.to_string(),
            reason: format!("stream start failed: {e}"),
        })?;

        tracing::info!(
            device = %name,
            rate_hz = stream_config.sample_rate,
            channels = stream_config.channels,
            sample_format = ?config.sample_format(),
            "output stream started"
        );

        Ok(CpalDevice {
            format: *format,
            name,
            stream: Some(stream),
            queue,
            done_rx,
            in_flight: HashSet::new(),
            underrun_events,
            reported_underruns: 0,
            stream_reset,
            stream_error,
        })
    }
}

/// An open CPAL output stream fed slot by slot.
pub struct CpalDevice {
    format: AudioFormat,
    name: String,
    stream: Option<cpal::Stream>,
    queue: Arc<SubmissionQueue>,
    done_rx: Receiver<usize>,
    in_flight: HashSet<usize>,
    underrun_events: Arc<AtomicU64>,
    reported_underruns: u64,
    /// Raised when a stream drains completely; the callback forgets its gap state.
    stream_reset: Arc<AtomicBool>,
    stream_error: Arc<Mutex<Option<String>>>,
}

impl CpalDevice {
    fn collect_completions(&mut self) {
        for slot in self.done_rx.try_iter() {
            self.in_flight.remove(&slot);
        }
    }

    fn report_underruns(&mut self) {
        let now = self.underrun_events.load(Ordering::Relaxed);
        if now > self.reported_underruns {
            tracing::warn!(
                new = now - self.reported_underruns,
                total = now,
                "output underrun (silence inserted)"
            );
            self.reported_underruns = now;
        }
    }
}

impl OutputDevice for CpalDevice {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn submit(&mut self, slot: usize, data: &[u8]) -> Result<()> {
        if self.stream.is_none() {
            return Err(PlayError::AlreadyClosed);
        }
        check_submission(&self.format, slot, data)?;
        self.collect_completions();
        if self.in_flight.contains(&slot) {
            return Err(PlayError::BufferBusy { slot });
        }
        match self.queue.push(slot, data) {
            Ok(()) => {
                self.in_flight.insert(slot);
                Ok(())
            }
            Err(PushError::Full) => Err(PlayError::SubmitFailed {
                slot,
                len: data.len(),
                reason: format!("device queue full ({} buffers in flight)", self.queue.len()),
            }),
            Err(PushError::Closed) => Err(PlayError::SubmitFailed {
                slot,
                len: data.len(),
                reason: "device queue closed".to_string(),
            }),
        }
    }

    fn poll_status(&mut self, slot: usize) -> Result<BufferStatus> {
        if let Some(reason) = self.stream_error.lock().ok().and_then(|g| g.clone()) {
            return Err(PlayError::PollFailed { slot, reason });
        }
        self.collect_completions();
        self.report_underruns();
        if self.in_flight.contains(&slot) {
            Ok(BufferStatus::Playing)
        } else {
            Ok(BufferStatus::Done)
        }
    }

    fn underruns(&self) -> u64 {
        self.underrun_events.load(Ordering::Relaxed)
    }

    fn stream_ended(&mut self) {
        self.stream_reset.store(true, Ordering::Release);
    }

    fn close(&mut self) -> Result<()> {
        let Some(stream) = self.stream.take() else {
            return Err(PlayError::AlreadyClosed);
        };
        if let Err(e) = stream.pause() {
            tracing::debug!("stream pause on close failed: {e}");
        }
        drop(stream);
        self.queue.close();
        self.in_flight.clear();
        tracing::info!(device = %self.name, "output stream closed");
        Ok(())
    }
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        self.queue.close();
    }
}

/// State shared between the device handle and the real-time callback.
struct StreamShared {
    queue: Arc<SubmissionQueue>,
    underrun_events: Arc<AtomicU64>,
    stream_reset: Arc<AtomicBool>,
    stream_error: Arc<Mutex<Option<String>>>,
}

/// Build a CPAL output stream that plays PCM bytes from the submission queue.
fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    format: AudioFormat,
    shared: StreamShared,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, format, shared),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, format, shared),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, format, shared),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, format, shared),
        cpal::SampleFormat::U8 => build_stream::<u8>(device, config, format, shared),
        other => Err(PlayError::DeviceUnavailable {
            format: format.to_string(),
            reason: format!("unsupported device sample format {other:?}"),
        }),
    }
}

/// Type-specialized stream builder for CPAL sample formats.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    format: AudioFormat,
    shared: StreamShared,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let bytes_per_sample = format.bytes_per_sample();
    let StreamShared {
        queue,
        underrun_events,
        stream_reset,
        stream_error,
    } = shared;

    let err_fn = move |err: cpal::StreamError| {
        tracing::warn!("stream error: {err}");
        if let Ok(mut g) = stream_error.lock() {
            g.get_or_insert_with(|| err.to_string());
        }
    };

    let mut scratch: Vec<u8> = Vec::new();
    let mut gap = GapTracker::default();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if stream_reset.swap(false, Ordering::AcqRel) {
                    gap.reset();
                }
                let want = data.len() * bytes_per_sample;
                if scratch.len() < want {
                    scratch.resize(want, 0);
                }
                let got = queue.drain_into(&mut scratch[..want]);
                let samples = got / bytes_per_sample;

                for (i, out) in data.iter_mut().enumerate() {
                    let value = if i < samples {
                        pcm_to_f32(&scratch[i * bytes_per_sample..], bytes_per_sample)
                    } else {
                        0.0
                    };
                    *out = <T as cpal::Sample>::from_sample::<f32>(value);
                }

                if gap.observe(got, want) {
                    underrun_events.fetch_add(1, Ordering::Relaxed);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| PlayError::DeviceUnavailable {
            format: format.to_string(),
            reason: format!("build output stream failed: {e}"),
        })
}

/// Counts silence gaps between buffers.
///
/// Silence before the first buffer and after the last one is not an underrun;
/// a gap is counted when audio resumes after the queue ran dry.
#[derive(Debug, Default)]
struct GapTracker {
    had_audio: bool,
    starved: bool,
}

impl GapTracker {
    /// Record one callback that received `got` of `want` bytes. Returns `true` on a new gap.
    fn observe(&mut self, got: usize, want: usize) -> bool {
        let mut resumed_after_gap = false;
        if got > 0 {
            resumed_after_gap = self.starved;
            self.starved = false;
            self.had_audio = true;
        }
        if got < want && self.had_audio {
            self.starved = true;
        }
        resumed_after_gap
    }

    /// Forget previous audio so the next buffer starts a fresh stream.
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Decode one little-endian integer PCM sample to `[-1.0, 1.0)`.
fn pcm_to_f32(bytes: &[u8], bytes_per_sample: usize) -> f32 {
    match bytes_per_sample {
        1 => (f32::from(bytes[0]) - 128.0) / 128.0,
        _ => f32::from(i16::from_le_bytes([bytes[0], bytes[1]])) / 32768.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_to_f32_handles_both_depths() {
        assert_eq!(pcm_to_f32(&[128], 1), 0.0);
        assert_eq!(pcm_to_f32(&[0], 1), -1.0);
        assert_eq!(pcm_to_f32(&[0x00, 0x80], 2), -1.0);
        assert_eq!(pcm_to_f32(&[0x00, 0x40], 2), 0.5);
        assert_eq!(pcm_to_f32(&[0, 0], 2), 0.0);
    }

    #[test]
    fn gap_tracker_ignores_leading_and_trailing_silence() {
        let mut gap = GapTracker::default();
        assert!(!gap.observe(0, 64));
        assert!(!gap.observe(64, 64));
        assert!(!gap.observe(16, 64));
        assert!(!gap.observe(0, 64));
    }

    #[test]
    fn gap_tracker_counts_resume_after_starvation() {
        let mut gap = GapTracker::default();
        assert!(!gap.observe(64, 64));
        assert!(!gap.observe(0, 64));
        assert!(gap.observe(64, 64));
        assert!(!gap.observe(64, 64));
    }

    #[test]
    fn gap_tracker_reset_starts_a_new_stream() {
        let mut gap = GapTracker::default();
        assert!(!gap.observe(64, 64));
        assert!(!gap.observe(0, 64));
        gap.reset();
        assert!(!gap.observe(64, 64));
        assert!(!gap.observe(0, 64));
        assert!(gap.observe(64, 64));
    }

    #[test]
    fn backend_caps_in_flight_at_one() {
        let backend = CpalBackend::new(None).with_max_in_flight(0);
        assert_eq!(backend.max_in_flight, Some(1));
    }
}
