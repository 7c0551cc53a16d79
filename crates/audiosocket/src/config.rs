use std::time::Duration;

use crate::error::{PlayError, Result};
use crate::format::AudioFormat;

/// Default slot capacity before frame alignment.
pub const DEFAULT_SLOT_BYTES: usize = 100 * 1024;

/// Scheduler tuning parameters.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Number of buffers cycled between the source and the device (at least 2).
    pub slot_count: usize,
    /// Capacity of each buffer in bytes; aligned down to whole frames on open.
    pub slot_bytes: usize,
    /// Status checks made back-to-back before backing off while a slot is still playing.
    pub spin_limit: u32,
    /// Pause between status checks once `spin_limit` is exhausted.
    pub poll_backoff: Duration,
}

impl Default for SchedulerConfig {
    /// Double buffering with ~0.58 s of CD audio per slot.
    fn default() -> Self {
        Self {
            slot_count: 2,
            slot_bytes: DEFAULT_SLOT_BYTES,
            spin_limit: 64,
            poll_backoff: Duration::from_millis(1),
        }
    }
}

impl SchedulerConfig {
    /// Check the config against `format` and return the frame-aligned slot capacity.
    pub fn validate(&self, format: &AudioFormat) -> Result<usize> {
        if self.slot_count < 2 {
            return Err(PlayError::InvalidConfig(format!(
                "at least 2 slots are required, got {}",
                self.slot_count
            )));
        }
        let capacity = format.align_down(self.slot_bytes);
        if capacity == 0 {
            return Err(PlayError::InvalidConfig(format!(
                "slot of {} bytes cannot hold one {}-byte frame",
                self.slot_bytes,
                format.block_align()
            )));
        }
        Ok(capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_double_buffered_and_aligned_for_cd() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.slot_count, 2);
        assert_eq!(cfg.validate(&AudioFormat::cd()).unwrap(), 102_400);
    }

    #[test]
    fn capacity_is_rounded_to_frames() {
        let fmt = AudioFormat::new(3, 48_000, 16).unwrap();
        let cfg = SchedulerConfig {
            slot_bytes: 1000,
            ..SchedulerConfig::default()
        };
        assert_eq!(cfg.validate(&fmt).unwrap(), 996);
    }

    #[test]
    fn rejects_single_slot_and_tiny_slots() {
        let fmt = AudioFormat::cd();
        let single = SchedulerConfig {
            slot_count: 1,
            ..SchedulerConfig::default()
        };
        assert!(matches!(single.validate(&fmt), Err(PlayError::InvalidConfig(_))));

        let tiny = SchedulerConfig {
            slot_bytes: 3,
            ..SchedulerConfig::default()
        };
        assert!(matches!(tiny.validate(&fmt), Err(PlayError::InvalidConfig(_))));
    }
}
