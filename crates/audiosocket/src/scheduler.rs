//! N-buffered streaming scheduler.
//!
//! The scheduler cycles a fixed pool of [`BufferSlot`]s between a [`ByteSource`]
//! and an [`OutputDevice`]:
//!
//! 1. reclaim slots the device has finished with
//! 2. stop once the source is exhausted and every slot has drained
//! 3. fill free slots from the source and submit them, in pool order
//! 4. sleep for one slot's playback time
//! 5. poll the oldest in-flight slot until the device reports it done
//!
//! Sleeping a whole slot duration before the first poll keeps the cost of
//! waiting at roughly one status check per buffer. With two or more slots one
//! buffer is always queued behind the one playing, so refills never leave the
//! device idle as long as fill + submit takes less than a slot's duration.
//!
//! Completion is only ever observed by polling from the driving thread.

use std::time::{Duration, Instant};

use crate::clock::{Sleeper, ThreadSleeper};
use crate::config::SchedulerConfig;
use crate::device::{AudioBackend, BufferStatus, OutputDevice};
use crate::error::{PlayError, Result};
use crate::format::AudioFormat;
use crate::report::PlaybackReport;
use crate::slot::{BufferSlot, SlotState};
use crate::source::ByteSource;

/// Progress reported by [`StreamScheduler::pump`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Buffers are in flight or the source has more data.
    Streaming,
    /// Source exhausted and every slot drained.
    Finished,
}

/// Owns an open device and the slot pool feeding it.
pub struct StreamScheduler<D: OutputDevice, S: Sleeper = ThreadSleeper> {
    /// `None` once closed.
    device: Option<D>,
    format: AudioFormat,
    config: SchedulerConfig,
    slots: Vec<BufferSlot>,
    /// Oldest in-flight slot; completions are expected in this order.
    cursor: usize,
    /// Next slot to fill.
    fill_cursor: usize,
    stopping: bool,
    sleeper: S,
}

impl<D: OutputDevice> StreamScheduler<D, ThreadSleeper> {
    /// Open a device for `format` on `backend` and allocate the slot pool.
    pub fn open<B>(backend: &B, format: AudioFormat, config: SchedulerConfig) -> Result<Self>
    where
        B: AudioBackend<Device = D>,
    {
        Self::open_with_sleeper(backend, format, config, ThreadSleeper)
    }
}

impl<D: OutputDevice, S: Sleeper> StreamScheduler<D, S> {
    /// Like [`StreamScheduler::open`], with a caller-supplied sleeper.
    pub fn open_with_sleeper<B>(
        backend: &B,
        format: AudioFormat,
        config: SchedulerConfig,
        sleeper: S,
    ) -> Result<Self>
    where
        B: AudioBackend<Device = D>,
    {
        config.validate(&format)?;
        let device = backend.open(&format)?;
        Self::with_device(device, config, sleeper)
    }

    /// Wrap an already-open device. The pool uses the device's format.
    pub fn with_device(device: D, config: SchedulerConfig, sleeper: S) -> Result<Self> {
        let format = device.format();
        let capacity = config.validate(&format)?;
        let slots = (0..config.slot_count)
            .map(|i| BufferSlot::new(i, capacity))
            .collect();

        tracing::info!(
            %format,
            slots = config.slot_count,
            slot_bytes = capacity,
            interval_ms = format.duration_of(capacity).as_secs_f64() * 1000.0,
            "scheduler opened"
        );

        Ok(Self {
            device: Some(device),
            format,
            config,
            slots,
            cursor: 0,
            fill_cursor: 0,
            stopping: false,
            sleeper,
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Frame-aligned capacity of each slot in bytes.
    pub fn slot_capacity(&self) -> usize {
        self.slots.first().map(BufferSlot::capacity).unwrap_or(0)
    }

    /// Time a full slot takes to play; the pause between fill and poll rounds.
    pub fn sleep_interval(&self) -> Duration {
        self.format.duration_of(self.slot_capacity())
    }

    pub fn slot_states(&self) -> Vec<SlotState> {
        self.slots.iter().map(BufferSlot::state).collect()
    }

    /// Slots handed to the device and not yet confirmed drained.
    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_pending()).count()
    }

    pub fn is_closed(&self) -> bool {
        self.device.is_none()
    }

    /// Stream `source` to the device until it is exhausted and every slot has drained.
    ///
    /// Any failure releases the device before the error is returned; the
    /// scheduler is closed afterwards.
    pub fn play<Src>(&mut self, source: &mut Src) -> Result<PlaybackReport>
    where
        Src: ByteSource + ?Sized,
    {
        let started = Instant::now();
        let underruns_before = self.underruns();
        let mut report = PlaybackReport::default();
        while self.pump(source, &mut report)? == StreamState::Streaming {}

        report.underruns = self.underruns().saturating_sub(underruns_before);
        report.finish(&self.format, started.elapsed());
        tracing::info!(
            submissions = report.submissions,
            bytes = report.bytes_submitted,
            status_checks = report.status_checks,
            underruns = report.underruns,
            elapsed_ms = report.elapsed_ms,
            "stream finished"
        );
        Ok(report)
    }

    /// Run a single reclaim/fill/sleep/poll round.
    ///
    /// For callers that drive the loop themselves between other work. Returns
    /// [`StreamState::Finished`] once the source is exhausted and every slot
    /// has drained, after which the scheduler is ready for a new source.
    /// Errors release the device exactly like [`StreamScheduler::play`].
    pub fn pump<Src>(
        &mut self,
        source: &mut Src,
        report: &mut PlaybackReport,
    ) -> Result<StreamState>
    where
        Src: ByteSource + ?Sized,
    {
        if self.device.is_none() {
            return Err(PlayError::AlreadyClosed);
        }
        match self.step(source, report) {
            Ok(state) => Ok(state),
            Err(e) => {
                self.abort(&e);
                Err(e)
            }
        }
    }

    /// Release the device.
    ///
    /// Fails with [`PlayError::AlreadyClosed`] on a second call and with
    /// [`PlayError::UnsafeTeardown`] while buffers are still pending.
    pub fn close(&mut self) -> Result<()> {
        if self.device.is_none() {
            return Err(PlayError::AlreadyClosed);
        }
        let pending = self.pending_count();
        if pending > 0 {
            return Err(PlayError::UnsafeTeardown { pending });
        }
        let Some(mut device) = self.device.take() else {
            return Err(PlayError::AlreadyClosed);
        };
        device.close()?;
        tracing::info!("scheduler closed");
        Ok(())
    }

    fn underruns(&self) -> u64 {
        self.device.as_ref().map(D::underruns).unwrap_or(0)
    }

    fn step<Src>(
        &mut self,
        source: &mut Src,
        report: &mut PlaybackReport,
    ) -> Result<StreamState>
    where
        Src: ByteSource + ?Sized,
    {
        for slot in &mut self.slots {
            slot.reclaim();
        }

        if self.stopping && self.pending_count() == 0 {
            tracing::debug!("source exhausted and all slots drained");
            self.stopping = false;
            if let Some(device) = self.device.as_mut() {
                device.stream_ended();
            }
            return Ok(StreamState::Finished);
        }

        if !self.stopping {
            self.fill(source, report)?;
        }

        if self.pending_count() == 0 {
            return Ok(StreamState::Streaming);
        }

        let interval = self.sleep_interval();
        self.sleeper.sleep(interval);
        report.sleeps += 1;

        self.await_cursor(report)?;
        Ok(StreamState::Streaming)
    }

    /// Fill and submit free slots in pool order until none are free or the source ends.
    fn fill<Src>(&mut self, source: &mut Src, report: &mut PlaybackReport) -> Result<()>
    where
        Src: ByteSource + ?Sized,
    {
        let slot_count = self.slots.len();
        while self.slots[self.fill_cursor].is_free() {
            let idx = self.fill_cursor;
            let slot = &mut self.slots[idx];
            let buf = slot.fill_buf()?;
            let read = source.read_chunk(buf)?.min(buf.len());
            let len = self.format.align_down(read);
            if len < read {
                tracing::warn!(
                    slot = idx,
                    dropped_bytes = read - len,
                    "dropping trailing partial frame"
                );
            }
            if len == 0 {
                tracing::debug!(slot = idx, "source returned empty read; stopping");
                self.stopping = true;
                return Ok(());
            }

            slot.mark_pending(len)?;
            let device = self.device.as_mut().ok_or(PlayError::AlreadyClosed)?;
            device.submit(idx, slot.filled())?;
            tracing::trace!(slot = idx, bytes = len, "slot submitted");

            report.submissions += 1;
            report.bytes_submitted += len as u64;
            self.fill_cursor = (idx + 1) % slot_count;
        }
        Ok(())
    }

    /// Wait for the slot under the cursor to drain, then advance the cursor.
    ///
    /// The preceding sleep already covered the expected playback time, so
    /// "still playing" answers are re-checked back to back; only after
    /// `spin_limit` of them does the scheduler pause for `poll_backoff`.
    fn await_cursor(&mut self, report: &mut PlaybackReport) -> Result<()> {
        let idx = self.cursor;
        if !self.slots[idx].is_pending() {
            return Ok(());
        }
        let device = self.device.as_mut().ok_or(PlayError::AlreadyClosed)?;

        let mut spins = 0u32;
        loop {
            report.status_checks += 1;
            match device.poll_status(idx)? {
                BufferStatus::Done => break,
                BufferStatus::Playing => {
                    report.still_playing += 1;
                    spins += 1;
                    if spins >= self.config.spin_limit {
                        self.sleeper.sleep(self.config.poll_backoff);
                        report.backoffs += 1;
                        spins = 0;
                    } else {
                        std::hint::spin_loop();
                    }
                }
            }
        }

        self.slots[idx].mark_done();
        tracing::trace!(slot = idx, "slot drained");
        self.cursor = (idx + 1) % self.slots.len();
        Ok(())
    }

    /// Force-release the device after a fatal error.
    fn abort(&mut self, err: &PlayError) {
        tracing::error!(
            operation = err.operation(),
            error = %err,
            pending = self.pending_count(),
            "playback aborted; releasing device"
        );
        if let Some(mut device) = self.device.take() {
            if let Err(e) = device.close() {
                tracing::warn!("device close after abort failed: {e}");
            }
        }
    }
}

impl<D: OutputDevice, S: Sleeper> Drop for StreamScheduler<D, S> {
    fn drop(&mut self) {
        let Some(mut device) = self.device.take() else {
            return;
        };
        let pending = self.pending_count();
        if pending > 0 {
            let err = PlayError::UnsafeTeardown { pending };
            tracing::warn!("scheduler dropped mid-stream, forcing device close: {err}");
        } else {
            tracing::debug!("scheduler dropped while open; closing device");
        }
        if let Err(e) = device.close() {
            tracing::warn!("device close on drop failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ReadSource;

    /// Device that completes every buffer on the first poll.
    struct ImmediateDevice {
        format: AudioFormat,
        in_flight: Vec<usize>,
        closed: bool,
    }

    impl OutputDevice for ImmediateDevice {
        fn format(&self) -> AudioFormat {
            self.format
        }
        fn submit(&mut self, slot: usize, _data: &[u8]) -> Result<()> {
            self.in_flight.push(slot);
            Ok(())
        }
        fn poll_status(&mut self, slot: usize) -> Result<BufferStatus> {
            self.in_flight.retain(|s| *s != slot);
            Ok(BufferStatus::Done)
        }
        fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct NoSleep(Vec<Duration>);

    impl Sleeper for NoSleep {
        fn sleep(&mut self, duration: Duration) {
            self.0.push(duration);
        }
    }

    fn scheduler(slot_bytes: usize) -> StreamScheduler<ImmediateDevice, NoSleep> {
        let device = ImmediateDevice {
            format: AudioFormat::cd(),
            in_flight: Vec::new(),
            closed: false,
        };
        let config = SchedulerConfig {
            slot_bytes,
            ..SchedulerConfig::default()
        };
        StreamScheduler::with_device(device, config, NoSleep::default()).unwrap()
    }

    #[test]
    fn slots_start_free_and_return_to_free() {
        let mut sched = scheduler(16);
        assert_eq!(sched.slot_states(), vec![SlotState::Free; 2]);

        let data = vec![0u8; 40];
        let report = sched.play(&mut ReadSource::new(&data[..])).unwrap();
        assert_eq!(report.submissions, 3);
        assert_eq!(sched.pending_count(), 0);
        assert!(sched.slot_states().iter().all(|s| *s != SlotState::Pending));
    }

    #[test]
    fn close_then_play_is_already_closed() {
        let mut sched = scheduler(16);
        sched.close().unwrap();
        assert!(sched.is_closed());
        let mut src = ReadSource::new(&[0u8; 4][..]);
        assert!(matches!(sched.play(&mut src), Err(PlayError::AlreadyClosed)));
        assert!(matches!(sched.close(), Err(PlayError::AlreadyClosed)));
    }

    #[test]
    fn scheduler_can_play_twice() {
        let mut sched = scheduler(16);
        let data = vec![0u8; 32];
        assert_eq!(sched.play(&mut ReadSource::new(&data[..])).unwrap().submissions, 2);
        assert_eq!(sched.play(&mut ReadSource::new(&data[..])).unwrap().submissions, 2);
        sched.close().unwrap();
    }

    #[test]
    fn trailing_partial_frame_is_dropped() {
        let mut sched = scheduler(16);
        let data = vec![0u8; 18];
        let report = sched.play(&mut ReadSource::new(&data[..])).unwrap();
        assert_eq!(report.submissions, 1);
        assert_eq!(report.bytes_submitted, 16);
    }

    #[test]
    fn sleep_interval_tracks_aligned_capacity() {
        let sched = scheduler(17_641);
        assert_eq!(sched.slot_capacity(), 17_640);
        assert_eq!(sched.sleep_interval(), Duration::from_millis(100));
    }
}
