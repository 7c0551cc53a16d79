use std::time::Duration;

use serde::Serialize;

use crate::format::AudioFormat;

/// Counters collected over one `play()` run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackReport {
    /// Buffers handed to the device.
    pub submissions: u64,
    /// Total bytes handed to the device.
    pub bytes_submitted: u64,
    /// Timed sleeps between fill and poll rounds.
    pub sleeps: u64,
    /// Status polls issued to the device.
    pub status_checks: u64,
    /// Polls that found the slot still playing.
    pub still_playing: u64,
    /// Backoff pauses taken after the spin limit was exhausted.
    pub backoffs: u64,
    /// Underruns observed by the device.
    pub underruns: u64,
    /// Wall-clock duration of the run in milliseconds.
    pub elapsed_ms: u64,
    /// Audio duration of everything submitted, in milliseconds.
    pub audio_ms: u64,
}

impl PlaybackReport {
    /// Stamp the duration fields once the run ends.
    pub fn finish(&mut self, format: &AudioFormat, elapsed: Duration) {
        self.elapsed_ms = elapsed.as_millis() as u64;
        self.audio_ms = format.duration_of(self.bytes_submitted as usize).as_millis() as u64;
    }

    /// Average status polls per submitted buffer.
    pub fn checks_per_buffer(&self) -> f64 {
        if self.submissions == 0 {
            return 0.0;
        }
        self.status_checks as f64 / self.submissions as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_derives_audio_duration() {
        let mut report = PlaybackReport {
            submissions: 2,
            bytes_submitted: 176_400,
            ..PlaybackReport::default()
        };
        report.finish(&AudioFormat::cd(), Duration::from_millis(1_020));
        assert_eq!(report.audio_ms, 1_000);
        assert_eq!(report.elapsed_ms, 1_020);
    }

    #[test]
    fn checks_per_buffer_handles_empty_runs() {
        assert_eq!(PlaybackReport::default().checks_per_buffer(), 0.0);
        let report = PlaybackReport {
            submissions: 4,
            status_checks: 6,
            ..PlaybackReport::default()
        };
        assert_eq!(report.checks_per_buffer(), 1.5);
    }

    #[test]
    fn serializes_field_names() {
        let json = serde_json::to_string(&PlaybackReport::default()).unwrap();
        assert!(json.contains("\"submissions\":0"));
        assert!(json.contains("\"still_playing\":0"));
    }
}
