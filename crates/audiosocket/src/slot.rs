//! Reusable buffer slots and their submission state machine.
//!
//! ```text
//! FREE --submit--> PENDING --device done--> DONE --reclaim--> FREE
//! ```
//!
//! No other transition is allowed; an illegal `mark_pending` is reported as
//! [`PlayError::BufferBusy`].

use crate::error::{PlayError, Result};

/// Submission state of a [`BufferSlot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Available for filling.
    Free,
    /// Handed to the device, possibly still playing.
    Pending,
    /// Device confirmed playback finished; waiting to be reclaimed.
    Done,
}

/// One fixed-capacity buffer, refilled in place for the scheduler's lifetime.
#[derive(Debug)]
pub struct BufferSlot {
    index: usize,
    data: Vec<u8>,
    len: usize,
    state: SlotState,
}

impl BufferSlot {
    pub fn new(index: usize, capacity: usize) -> Self {
        Self {
            index,
            data: vec![0; capacity],
            len: 0,
            state: SlotState::Free,
        }
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn is_free(&self) -> bool {
        self.state == SlotState::Free
    }

    pub fn is_pending(&self) -> bool {
        self.state == SlotState::Pending
    }

    /// Whole backing buffer for the source to fill.
    ///
    /// Only a FREE slot may be written.
    pub fn fill_buf(&mut self) -> Result<&mut [u8]> {
        if !self.is_free() {
            return Err(PlayError::BufferBusy { slot: self.index });
        }
        Ok(&mut self.data)
    }

    /// Bytes of the current submission.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// FREE -> PENDING, recording `len` valid bytes.
    pub fn mark_pending(&mut self, len: usize) -> Result<()> {
        if !self.is_free() || len > self.data.len() {
            return Err(PlayError::BufferBusy { slot: self.index });
        }
        self.len = len;
        self.state = SlotState::Pending;
        Ok(())
    }

    /// PENDING -> DONE. Returns `false` when the slot was not pending.
    pub fn mark_done(&mut self) -> bool {
        if self.state != SlotState::Pending {
            return false;
        }
        self.state = SlotState::Done;
        true
    }

    /// DONE -> FREE. Returns `true` if the slot was reclaimed.
    pub fn reclaim(&mut self) -> bool {
        if self.state != SlotState::Done {
            return false;
        }
        self.len = 0;
        self.state = SlotState::Free;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle_returns_to_free() {
        let mut slot = BufferSlot::new(0, 8);
        slot.fill_buf().unwrap()[..4].copy_from_slice(&[1, 2, 3, 4]);
        slot.mark_pending(4).unwrap();
        assert_eq!(slot.filled(), &[1, 2, 3, 4]);
        assert!(slot.is_pending());
        assert!(slot.mark_done());
        assert_eq!(slot.state(), SlotState::Done);
        assert!(slot.reclaim());
        assert!(slot.is_free());
        assert!(slot.filled().is_empty());
    }

    #[test]
    fn pending_slot_rejects_refill() {
        let mut slot = BufferSlot::new(3, 8);
        slot.mark_pending(8).unwrap();
        assert!(matches!(slot.fill_buf(), Err(PlayError::BufferBusy { slot: 3 })));
        assert!(matches!(
            slot.mark_pending(8),
            Err(PlayError::BufferBusy { slot: 3 })
        ));
    }

    #[test]
    fn done_slot_must_be_reclaimed_before_submit() {
        let mut slot = BufferSlot::new(1, 8);
        slot.mark_pending(2).unwrap();
        slot.mark_done();
        assert!(slot.mark_pending(2).is_err());
        assert!(!slot.mark_done());
    }

    #[test]
    fn illegal_transitions_are_refused() {
        let mut slot = BufferSlot::new(0, 4);
        assert!(!slot.mark_done());
        assert!(!slot.reclaim());
        assert!(slot.mark_pending(5).is_err());
        assert!(slot.is_free());
    }
}
