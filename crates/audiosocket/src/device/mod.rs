//! Output device contract and its implementations.
//!
//! The scheduler only talks to [`OutputDevice`]; platform handshakes such as
//! buffer preparation live behind `submit`/`poll_status`.
//!
//! - [`cpal_output`]: real hardware through CPAL
//! - [`null`]: discards audio but keeps real-time pacing

pub mod cpal_output;
pub mod null;
pub mod queue;
pub mod select;

use crate::error::{PlayError, Result};
use crate::format::AudioFormat;

pub use cpal_output::{CpalBackend, CpalDevice};
pub use null::{NullBackend, NullDevice};

/// Playback state of a submitted buffer as reported by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferStatus {
    Playing,
    Done,
}

/// An open playback endpoint configured with a fixed [`AudioFormat`].
pub trait OutputDevice {
    /// Format the endpoint was opened with.
    fn format(&self) -> AudioFormat;

    /// Queue `data` for playback on behalf of `slot`.
    ///
    /// Fails with [`PlayError::BufferBusy`] if `slot` still has a buffer in
    /// flight, or [`PlayError::SubmitFailed`] if the buffer is malformed.
    fn submit(&mut self, slot: usize, data: &[u8]) -> Result<()>;

    /// Report whether the last buffer submitted for `slot` finished playing.
    ///
    /// A slot with nothing in flight reports [`BufferStatus::Done`].
    fn poll_status(&mut self, slot: usize) -> Result<BufferStatus>;

    /// Number of times the device ran dry and played silence.
    fn underruns(&self) -> u64 {
        0
    }

    /// The stream drained completely; the next submission starts a new stream
    /// rather than resuming after a gap.
    fn stream_ended(&mut self) {}

    /// Release the endpoint. Buffers still queued are discarded.
    fn close(&mut self) -> Result<()>;
}

/// Opens [`OutputDevice`]s for a requested format.
pub trait AudioBackend {
    type Device: OutputDevice;

    /// Open an endpoint, failing with [`PlayError::DeviceUnavailable`] when
    /// nothing can play `format`.
    fn open(&self, format: &AudioFormat) -> Result<Self::Device>;
}

/// Reject empty or partially-framed buffers before they reach the platform.
pub(crate) fn check_submission(format: &AudioFormat, slot: usize, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(PlayError::SubmitFailed {
            slot,
            len: 0,
            reason: "empty buffer".to_string(),
        });
    }
    if !format.is_aligned(data.len()) {
        return Err(PlayError::SubmitFailed {
            slot,
            len: data.len(),
            reason: format!(
                "length is not a multiple of the {}-byte block",
                format.block_align()
            ),
        });
    }
    Ok(())
}
