//! Pure frame-slot ring model.
//!
//! [`FrameRing`] tracks the lifecycle state of every frame slot and the
//! serial numbers of their submissions, with no Vulkan objects involved.
//! The scheduler consults it before every device call, so an illegal
//! transition is caught as an error instead of becoming a GPU hazard. Being
//! pure, the ring is also where the scheduling invariants are unit-tested.
//!
//! Slot lifecycle:
//!
//! ```text
//! Idle → Acquiring → Recording → Submitted → Presenting → Idle
//!          │                                    │
//!          └── acquire_failed ──→ Idle          └── present_aborted ──→ Idle
//! ```
//!
//! Every submission is stamped with a monotonically increasing serial. A
//! slot may not leave `Idle` until its previous serial has been observed
//! complete — the bounded-in-flight invariant.

use thiserror::Error;

/// Lifecycle state of one frame slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Not processing a frame.
    Idle,
    /// Waiting for a swapchain image.
    Acquiring,
    /// Commands are being recorded.
    Recording,
    /// Commands handed to the queue, fence pending.
    Submitted,
    /// Present request issued.
    Presenting,
}

/// Violations of the ring's transition rules.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// An operation was applied to a slot in the wrong state.
    #[error("slot {slot}: cannot {op} from {from:?}")]
    InvalidTransition {
        /// Slot index.
        slot: usize,
        /// State the slot was in.
        from: SlotState,
        /// Operation that was attempted.
        op: &'static str,
    },

    /// A slot was about to be reused before its previous submission's fence
    /// was observed signaled.
    #[error("slot {slot}: serial {serial} not retired (completed up to {completed})")]
    SlotNotRetired {
        /// Slot index.
        slot: usize,
        /// The slot's outstanding serial.
        serial: u64,
        /// Highest serial observed complete.
        completed: u64,
    },
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    state: SlotState,
    /// Serial of the last submission from this slot; 0 before any.
    serial: u64,
}

/// Ring of frame slots with submission bookkeeping.
#[derive(Debug)]
pub struct FrameRing {
    slots: Vec<Slot>,
    current: usize,
    next_serial: u64,
    completed: u64,
}

impl FrameRing {
    /// Creates a ring of `size` idle slots.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Self {
        assert!(size >= 1, "frame ring needs at least one slot");
        Self {
            slots: vec![
                Slot {
                    state: SlotState::Idle,
                    serial: 0,
                };
                size
            ],
            current: 0,
            next_serial: 1,
            completed: 0,
        }
    }

    /// Number of slots in the ring.
    #[inline]
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Index of the slot the next frame will use.
    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    /// State of slot `index`.
    #[inline]
    pub fn state(&self, index: usize) -> SlotState {
        self.slots[index].state
    }

    /// Serial of the last submission from slot `index` (0 before any).
    #[inline]
    pub fn slot_serial(&self, index: usize) -> u64 {
        self.slots[index].serial
    }

    /// Serial the current slot must have retired before it can be reused.
    #[inline]
    pub fn pending_serial(&self) -> u64 {
        self.slots[self.current].serial
    }

    /// Highest serial observed complete.
    #[inline]
    pub fn completed_serial(&self) -> u64 {
        self.completed
    }

    /// Serial the next submission will carry.
    #[inline]
    pub fn next_serial(&self) -> u64 {
        self.next_serial
    }

    /// Number of submissions whose fences have not been observed signaled.
    pub fn in_flight(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.serial > self.completed)
            .count()
    }

    /// Whether every submission has been observed complete.
    #[inline]
    pub fn all_retired(&self) -> bool {
        self.in_flight() == 0
    }

    /// Records that all submissions up to `serial` completed (their fences
    /// were observed signaled).
    pub fn observe_completed(&mut self, serial: u64) {
        if serial > self.completed {
            self.completed = serial;
        }
    }

    /// `Idle → Acquiring` for the current slot.
    ///
    /// Fails with [`RingError::SlotNotRetired`] if the slot's previous
    /// submission is still in flight — the caller must wait that fence and
    /// call [`observe_completed`](Self::observe_completed) first.
    pub fn begin_acquire(&mut self) -> Result<(), RingError> {
        let slot = &self.slots[self.current];

        if slot.state != SlotState::Idle {
            return Err(RingError::InvalidTransition {
                slot: self.current,
                from: slot.state,
                op: "begin_acquire",
            });
        }
        if slot.serial > self.completed {
            return Err(RingError::SlotNotRetired {
                slot: self.current,
                serial: slot.serial,
                completed: self.completed,
            });
        }

        self.slots[self.current].state = SlotState::Acquiring;
        Ok(())
    }

    /// `Acquiring → Idle` when no image was granted (timeout or
    /// out-of-date). The slot is immediately reusable; nothing was
    /// submitted.
    pub fn acquire_failed(&mut self) -> Result<(), RingError> {
        self.transition(SlotState::Acquiring, SlotState::Idle, "acquire_failed")
    }

    /// `Acquiring → Recording` once an image is available.
    pub fn begin_recording(&mut self) -> Result<(), RingError> {
        self.transition(SlotState::Acquiring, SlotState::Recording, "begin_recording")
    }

    /// `Recording → Submitted`; stamps and returns the submission serial.
    pub fn submitted(&mut self) -> Result<u64, RingError> {
        self.transition(SlotState::Recording, SlotState::Submitted, "submitted")?;

        let serial = self.next_serial;
        self.next_serial += 1;
        self.slots[self.current].serial = serial;
        Ok(serial)
    }

    /// `Submitted → Presenting`.
    pub fn begin_present(&mut self) -> Result<(), RingError> {
        self.transition(SlotState::Submitted, SlotState::Presenting, "begin_present")
    }

    /// `Presenting → Idle`; advances to the next slot.
    pub fn presented(&mut self) -> Result<(), RingError> {
        self.transition(SlotState::Presenting, SlotState::Idle, "presented")?;
        self.advance();
        Ok(())
    }

    /// `Presenting → Idle` without a successful present (out-of-date or
    /// suboptimal surface). The submission stays in flight; its fence is
    /// retired at slot reuse or drain. Advances to the next slot.
    pub fn present_aborted(&mut self) -> Result<(), RingError> {
        self.transition(SlotState::Presenting, SlotState::Idle, "present_aborted")?;
        self.advance();
        Ok(())
    }

    fn transition(
        &mut self,
        expected: SlotState,
        next: SlotState,
        op: &'static str,
    ) -> Result<(), RingError> {
        let slot = &mut self.slots[self.current];
        if slot.state != expected {
            return Err(RingError::InvalidTransition {
                slot: self.current,
                from: slot.state,
                op,
            });
        }
        slot.state = next;
        Ok(())
    }

    fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs one full successful frame: acquire, record, submit, present.
    /// Returns the submission serial.
    fn run_frame(ring: &mut FrameRing) -> u64 {
        ring.begin_acquire().unwrap();
        ring.begin_recording().unwrap();
        let serial = ring.submitted().unwrap();
        ring.begin_present().unwrap();
        ring.presented().unwrap();
        serial
    }

    #[test]
    fn test_full_cycle_returns_to_idle() {
        let mut ring = FrameRing::new(2);
        let serial = run_frame(&mut ring);
        assert_eq!(serial, 1);
        assert_eq!(ring.state(0), SlotState::Idle);
        assert_eq!(ring.current(), 1);
        assert_eq!(ring.in_flight(), 1);
    }

    #[test]
    fn test_slot_reuse_requires_retirement() {
        // Bounded in-flight invariant at ring size 2.
        let mut ring = FrameRing::new(2);
        run_frame(&mut ring); // slot 0, serial 1
        run_frame(&mut ring); // slot 1, serial 2

        // Back at slot 0; its serial 1 has not been retired.
        assert_eq!(
            ring.begin_acquire(),
            Err(RingError::SlotNotRetired {
                slot: 0,
                serial: 1,
                completed: 0,
            })
        );

        // Fence for serial 1 observed signaled: slot 0 may cycle again.
        ring.observe_completed(1);
        assert!(ring.begin_acquire().is_ok());
    }

    #[test]
    fn test_slot_reuse_requires_retirement_ring_of_three() {
        let mut ring = FrameRing::new(3);
        run_frame(&mut ring);
        run_frame(&mut ring);
        run_frame(&mut ring);
        assert_eq!(ring.in_flight(), 3);

        assert!(matches!(
            ring.begin_acquire(),
            Err(RingError::SlotNotRetired { slot: 0, .. })
        ));

        ring.observe_completed(1);
        assert!(ring.begin_acquire().is_ok());

        // Slot 1 (serial 2) is still gated.
        ring.begin_recording().unwrap();
        ring.submitted().unwrap();
        ring.begin_present().unwrap();
        ring.presented().unwrap();
        assert!(matches!(
            ring.begin_acquire(),
            Err(RingError::SlotNotRetired { slot: 1, .. })
        ));
    }

    #[test]
    fn test_out_of_date_mid_run_skips_one_present() {
        // Out-of-date on frame 5 of 10: that frame presents nothing, the
        // ring resumes cycling from frame 6.
        let mut ring = FrameRing::new(2);
        let mut presented = 0;

        for frame in 1..=10 {
            // Retire whatever the current slot still has in flight.
            ring.observe_completed(ring.pending_serial());
            ring.begin_acquire().unwrap();

            if frame == 5 {
                // Acquire reported out-of-date; no image, no submission.
                ring.acquire_failed().unwrap();
                continue;
            }

            ring.begin_recording().unwrap();
            ring.submitted().unwrap();
            ring.begin_present().unwrap();
            ring.presented().unwrap();
            presented += 1;
        }

        assert_eq!(presented, 9);
        // Serials stay dense: 9 submissions happened.
        assert_eq!(ring.next_serial(), 10);
    }

    #[test]
    fn test_present_abort_keeps_submission_in_flight() {
        let mut ring = FrameRing::new(2);
        ring.begin_acquire().unwrap();
        ring.begin_recording().unwrap();
        let serial = ring.submitted().unwrap();
        ring.begin_present().unwrap();
        // Present returned out-of-date; the GPU work is still pending.
        ring.present_aborted().unwrap();

        assert_eq!(ring.in_flight(), 1);
        assert_eq!(ring.slot_serial(0), serial);

        ring.observe_completed(serial);
        assert!(ring.all_retired());
    }

    #[test]
    fn test_drain_retires_everything() {
        // Shutdown with two frames in flight: both serials must be observed
        // before the ring reports quiescence.
        let mut ring = FrameRing::new(2);
        run_frame(&mut ring);
        run_frame(&mut ring);
        assert_eq!(ring.in_flight(), 2);
        assert!(!ring.all_retired());

        ring.observe_completed(2);
        assert!(ring.all_retired());
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let mut ring = FrameRing::new(2);

        assert!(matches!(
            ring.submitted(),
            Err(RingError::InvalidTransition { op: "submitted", .. })
        ));
        assert!(matches!(
            ring.begin_recording(),
            Err(RingError::InvalidTransition { .. })
        ));

        ring.begin_acquire().unwrap();
        assert!(matches!(
            ring.begin_acquire(),
            Err(RingError::InvalidTransition {
                from: SlotState::Acquiring,
                ..
            })
        ));
    }

    #[test]
    fn test_observe_completed_is_monotonic() {
        let mut ring = FrameRing::new(2);
        ring.observe_completed(5);
        ring.observe_completed(3);
        assert_eq!(ring.completed_serial(), 5);
    }
}
