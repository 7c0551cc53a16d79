//! Error taxonomy for device lifecycle, submission, and source failures.

use thiserror::Error;

/// Convenient result alias for scheduler and device operations.
pub type Result<T> = std::result::Result<T, PlayError>;

/// Errors raised while opening, feeding, polling, or closing an output device.
///
/// Every variant is fatal at the point of discovery. The only condition the
/// scheduler retries is a slot that is still playing, which is a polled state
/// and never an error.
#[derive(Debug, Error)]
pub enum PlayError {
    /// No output endpoint can play the requested format.
    #[error("open failed: no output device for {format}: {reason}")]
    DeviceUnavailable {
        /// Human-readable format description.
        format: String,
        /// Underlying platform status.
        reason: String,
    },
    /// The device rejected a buffer.
    #[error("submit failed for slot {slot} ({len} bytes): {reason}")]
    SubmitFailed {
        /// Slot index the buffer belongs to.
        slot: usize,
        /// Length of the rejected buffer.
        len: usize,
        /// Underlying platform status.
        reason: String,
    },
    /// A buffer was submitted into a slot that is still in flight.
    #[error("slot {slot} is still in flight and cannot take another buffer")]
    BufferBusy {
        /// Slot index.
        slot: usize,
    },
    /// Asking the device whether a slot drained failed.
    #[error("status poll failed for slot {slot}: {reason}")]
    PollFailed {
        /// Slot index.
        slot: usize,
        /// Underlying platform status.
        reason: String,
    },
    /// The byte source failed mid-stream.
    #[error("source read failed")]
    SourceRead(#[source] std::io::Error),
    /// The device was already released.
    #[error("device already closed")]
    AlreadyClosed,
    /// Close was requested while buffers were still queued on the device.
    #[error("refusing to close device with {pending} buffer(s) still pending")]
    UnsafeTeardown {
        /// Number of slots still PENDING.
        pending: usize,
    },
    /// The requested audio format is not representable.
    #[error("invalid audio format: {0}")]
    InvalidFormat(String),
    /// Scheduler tuning parameters are out of range.
    #[error("invalid scheduler config: {0}")]
    InvalidConfig(String),
    /// A WAV header could not be parsed.
    #[error("wav header error")]
    Wav(#[from] hound::Error),
}

impl PlayError {
    /// Short name of the failing operation, used in CLI diagnostics.
    pub fn operation(&self) -> &'static str {
        match self {
            PlayError::DeviceUnavailable { .. } => "open",
            PlayError::SubmitFailed { .. } | PlayError::BufferBusy { .. } => "submit",
            PlayError::PollFailed { .. } => "poll",
            PlayError::SourceRead(_) | PlayError::Wav(_) => "read",
            PlayError::AlreadyClosed | PlayError::UnsafeTeardown { .. } => "close",
            PlayError::InvalidFormat(_) | PlayError::InvalidConfig(_) => "configure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_slot_and_status() {
        let err = PlayError::SubmitFailed {
            slot: 1,
            len: 3,
            reason: "length not aligned".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "submit failed for slot 1 (3 bytes): length not aligned"
        );
        assert_eq!(err.operation(), "submit");
    }

    #[test]
    fn lifecycle_errors_map_to_close() {
        assert_eq!(PlayError::AlreadyClosed.operation(), "close");
        assert_eq!(PlayError::UnsafeTeardown { pending: 2 }.operation(), "close");
    }
}
