//! Thread-safe queue of submitted buffers shared with the output callback.
//!
//! The driving thread pushes whole slot buffers; the real-time callback drains
//! bytes from the front without blocking on anything but the queue mutex. When a
//! buffer has been fully consumed its slot index is sent on the completion
//! channel, which the driving thread drains while polling. The callback never
//! calls back into the device.

use std::collections::VecDeque;
use std::sync::Mutex;

use crossbeam_channel::Sender;

struct Submission {
    slot: usize,
    data: Vec<u8>,
    pos: usize,
}

struct QueueInner {
    queue: VecDeque<Submission>,
    closed: bool,
}

/// Bounded FIFO of in-flight slot buffers.
pub struct SubmissionQueue {
    inner: Mutex<QueueInner>,
    max_submissions: usize,
    done_tx: Sender<usize>,
}

/// Why a push was refused.
#[derive(Debug, PartialEq, Eq)]
pub enum PushError {
    Full,
    Closed,
}

impl SubmissionQueue {
    /// Create a queue holding at most `max_submissions` buffers.
    pub fn new(max_submissions: usize, done_tx: Sender<usize>) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                queue: VecDeque::with_capacity(max_submissions),
                closed: false,
            }),
            max_submissions,
            done_tx,
        }
    }

    /// Append a copy of `data` for `slot`.
    pub fn push(&self, slot: usize, data: &[u8]) -> Result<(), PushError> {
        let mut g = self.lock();
        if g.closed {
            return Err(PushError::Closed);
        }
        if g.queue.len() >= self.max_submissions {
            return Err(PushError::Full);
        }
        g.queue.push_back(Submission {
            slot,
            data: data.to_vec(),
            pos: 0,
        });
        Ok(())
    }

    /// Copy up to `out.len()` queued bytes into `out` and return the count.
    ///
    /// Buffers are consumed strictly in submission order; each one that is
    /// exhausted is reported on the completion channel.
    pub fn drain_into(&self, out: &mut [u8]) -> usize {
        let mut g = self.lock();
        let mut written = 0;
        while written < out.len() {
            let Some(front) = g.queue.front_mut() else {
                break;
            };
            let n = (out.len() - written).min(front.data.len() - front.pos);
            out[written..written + n].copy_from_slice(&front.data[front.pos..front.pos + n]);
            front.pos += n;
            written += n;
            if front.pos >= front.data.len() {
                if let Some(done) = g.queue.pop_front() {
                    let _ = self.done_tx.send(done.slot);
                }
            }
        }
        written
    }

    /// Number of buffers still in flight.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Refuse further pushes and discard anything still queued.
    ///
    /// Discarded buffers are not reported as completed. Idempotent.
    pub fn close(&self) {
        let mut g = self.lock();
        g.closed = true;
        g.queue.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(max: usize) -> (SubmissionQueue, crossbeam_channel::Receiver<usize>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (SubmissionQueue::new(max, tx), rx)
    }

    #[test]
    fn drain_reports_completion_only_when_buffer_consumed() {
        let (q, done) = queue(2);
        q.push(0, &[1, 2, 3, 4]).unwrap();

        let mut out = [0u8; 3];
        assert_eq!(q.drain_into(&mut out), 3);
        assert_eq!(out, [1, 2, 3]);
        assert!(done.try_recv().is_err());
        assert_eq!(q.len(), 1);

        assert_eq!(q.drain_into(&mut out), 1);
        assert_eq!(done.try_recv().unwrap(), 0);
        assert!(q.is_empty());
    }

    #[test]
    fn drain_spans_buffers_in_submission_order() {
        let (q, done) = queue(2);
        q.push(1, &[1, 1]).unwrap();
        q.push(0, &[2, 2]).unwrap();

        let mut out = [0u8; 4];
        assert_eq!(q.drain_into(&mut out), 4);
        assert_eq!(out, [1, 1, 2, 2]);
        assert_eq!(done.try_iter().collect::<Vec<_>>(), vec![1, 0]);
    }

    #[test]
    fn push_respects_capacity_and_close() {
        let (q, done) = queue(1);
        q.push(0, &[0; 4]).unwrap();
        assert_eq!(q.push(1, &[0; 4]), Err(PushError::Full));
        assert_eq!(q.len(), 1);

        q.close();
        assert!(q.is_empty());
        assert_eq!(q.push(0, &[0; 4]), Err(PushError::Closed));
        assert!(done.try_recv().is_err());
    }

    #[test]
    fn drain_on_empty_queue_writes_nothing() {
        let (q, _done) = queue(1);
        let mut out = [9u8; 4];
        assert_eq!(q.drain_into(&mut out), 0);
        assert_eq!(out, [9; 4]);
    }
}
