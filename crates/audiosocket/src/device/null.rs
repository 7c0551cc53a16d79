//! Output device that discards audio but completes buffers in real time.
//!
//! Useful for exercising the scheduler on hosts without sound hardware: each
//! buffer reports done once its playback duration has elapsed after the
//! previous buffer finished.

use std::collections::VecDeque;
use std::time::Instant;

use super::{AudioBackend, BufferStatus, OutputDevice, check_submission};
use crate::error::{PlayError, Result};
use crate::format::AudioFormat;

#[derive(Clone, Copy, Debug, Default)]
pub struct NullBackend;

impl AudioBackend for NullBackend {
    type Device = NullDevice;

    fn open(&self, format: &AudioFormat) -> Result<NullDevice> {
        tracing::info!(%format, "null output opened");
        Ok(NullDevice {
            format: *format,
            queued: VecDeque::new(),
            play_head: None,
            underruns: 0,
            open: true,
        })
    }
}

pub struct NullDevice {
    format: AudioFormat,
    /// (slot, instant its buffer finishes), in submission order.
    queued: VecDeque<(usize, Instant)>,
    /// When the last queued buffer finishes.
    play_head: Option<Instant>,
    underruns: u64,
    open: bool,
}

impl NullDevice {
    fn retire_finished(&mut self, now: Instant) {
        while let Some(&(_, end)) = self.queued.front() {
            if end > now {
                break;
            }
            self.queued.pop_front();
        }
    }
}

impl OutputDevice for NullDevice {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn submit(&mut self, slot: usize, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(PlayError::AlreadyClosed);
        }
        check_submission(&self.format, slot, data)?;
        let now = Instant::now();
        self.retire_finished(now);
        if self.queued.iter().any(|(s, _)| *s == slot) {
            return Err(PlayError::BufferBusy { slot });
        }

        let start = match self.play_head {
            Some(head) if head > now => head,
            Some(_) => {
                self.underruns += 1;
                now
            }
            None => now,
        };
        let end = start + self.format.duration_of(data.len());
        self.play_head = Some(end);
        self.queued.push_back((slot, end));
        Ok(())
    }

    fn poll_status(&mut self, slot: usize) -> Result<BufferStatus> {
        self.retire_finished(Instant::now());
        if self.queued.iter().any(|(s, _)| *s == slot) {
            Ok(BufferStatus::Playing)
        } else {
            Ok(BufferStatus::Done)
        }
    }

    fn underruns(&self) -> u64 {
        self.underruns
    }

    fn stream_ended(&mut self) {
        self.play_head = None;
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Err(PlayError::AlreadyClosed);
        }
        self.open = false;
        self.queued.clear();
        tracing::info!("null output closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn mono8() -> AudioFormat {
        AudioFormat::new(1, 8_000, 8).unwrap()
    }

    #[test]
    fn buffer_completes_after_its_duration() {
        let mut dev = NullBackend.open(&mono8()).unwrap();
        dev.submit(0, &[128; 800]).unwrap();
        assert_eq!(dev.poll_status(0).unwrap(), BufferStatus::Playing);
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(dev.poll_status(0).unwrap(), BufferStatus::Done);
    }

    #[test]
    fn resubmitting_in_flight_slot_is_busy() {
        let mut dev = NullBackend.open(&mono8()).unwrap();
        dev.submit(1, &[128; 800]).unwrap();
        assert!(matches!(
            dev.submit(1, &[128; 800]),
            Err(PlayError::BufferBusy { slot: 1 })
        ));
    }

    #[test]
    fn idle_slot_reports_done() {
        let mut dev = NullBackend.open(&mono8()).unwrap();
        assert_eq!(dev.poll_status(5).unwrap(), BufferStatus::Done);
    }

    #[test]
    fn late_submission_is_an_underrun() {
        let mut dev = NullBackend.open(&mono8()).unwrap();
        dev.submit(0, &[128; 80]).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        dev.submit(1, &[128; 80]).unwrap();
        assert_eq!(dev.underruns(), 1);
    }

    #[test]
    fn new_stream_after_end_is_not_an_underrun() {
        let mut dev = NullBackend.open(&mono8()).unwrap();
        dev.submit(0, &[128; 80]).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(dev.poll_status(0).unwrap(), BufferStatus::Done);
        dev.stream_ended();
        dev.submit(0, &[128; 80]).unwrap();
        assert_eq!(dev.underruns(), 0);
    }

    #[test]
    fn close_twice_is_rejected() {
        let mut dev = NullBackend.open(&mono8()).unwrap();
        dev.close().unwrap();
        assert!(matches!(dev.close(), Err(PlayError::AlreadyClosed)));
        assert!(matches!(dev.submit(0, &[0; 8]), Err(PlayError::AlreadyClosed)));
    }
}
