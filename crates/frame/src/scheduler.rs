//! The frame scheduler.
//!
//! Drives acquire → record → submit → present for each frame slot, with
//! the [`FrameRing`](crate::ring::FrameRing) checking every transition.
//! One instance is driven by the single rendering thread; the GPU runs
//! asynchronously behind the semaphore/fence pairs owned here.
//!
//! # Per-frame flow
//!
//! ```no_run
//! use std::sync::Arc;
//! use prism_rhi::command::CommandPool;
//! use prism_rhi::device::Device;
//! use prism_rhi::swapchain::Swapchain;
//! use prism_frame::{AcquireOutcome, FrameScheduler};
//!
//! # fn example(
//! #     device: Arc<Device>,
//! #     command_pool: &CommandPool,
//! #     swapchain: &Swapchain,
//! # ) -> prism_frame::FrameResult<()> {
//! let mut scheduler = FrameScheduler::new(device, command_pool, 100_000_000)?;
//!
//! loop {
//!     // Backpressure: the slot's previous fence gates its reuse.
//!     let completed = scheduler.wait_for_slot()?;
//!     // ... retire cache references up to `completed` ...
//!
//!     let _image_index = match scheduler.acquire(swapchain)? {
//!         AcquireOutcome::Ready { image_index, .. } => image_index,
//!         AcquireOutcome::Skipped => continue,       // timed out, no frame
//!         AcquireOutcome::OutOfDate => break,        // rebuild swapchain
//!     };
//!
//!     let _cmd = scheduler.begin_recording()?;
//!     // ... record commands targeting swapchain image `image_index` ...
//!
//!     let serial =
//!         scheduler.submit(prism_rhi::vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)?;
//!     // ... mark cache resources used by `serial` ...
//!
//!     scheduler.present(swapchain)?;
//!     # break;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use prism_rhi::command::{CommandBuffer, CommandPool};
use prism_rhi::device::Device;
use prism_rhi::swapchain::{Acquired, SurfaceStatus, Swapchain};
use prism_rhi::sync::{Fence, Semaphore};

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::error::FrameResult;
use crate::ring::FrameRing;

/// How the scheduler left an acquisition attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is ready; proceed to recording.
    Ready {
        /// Swapchain image index to render into.
        image_index: u32,
        /// The chain should be rebuilt after this frame is presented.
        suboptimal: bool,
    },
    /// Acquisition timed out; the frame is skipped, nothing was recorded or
    /// submitted. Repeated timeouts (minimized window) keep landing here
    /// rather than spinning empty submissions through the queue.
    Skipped,
    /// The chain is out of date; rebuild it before trying again.
    OutOfDate,
}

/// Per-slot GPU objects: a command buffer and the sync primitive pair.
struct FrameSlot {
    command_buffer: CommandBuffer,
    /// Signaled by acquisition when the image is ready to render into.
    image_available: Semaphore,
    /// Signaled by the submission; presentation waits on it.
    render_finished: Semaphore,
    /// Signaled when the slot's submission completes; waited at reuse.
    fence: Fence,
}

impl FrameSlot {
    fn new(device: Arc<Device>, command_pool: &CommandPool) -> FrameResult<Self> {
        let command_buffer = CommandBuffer::new(device.clone(), command_pool)?;
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        // Signaled so the first wait on a never-used slot falls through.
        let fence = Fence::new(device, true)?;

        Ok(Self {
            command_buffer,
            image_available,
            render_finished,
            fence,
        })
    }
}

/// Coordinates per-frame synchronization across the slot ring.
///
/// Not thread-safe; owned and driven by the rendering thread.
pub struct FrameScheduler {
    device: Arc<Device>,
    slots: Vec<FrameSlot>,
    ring: FrameRing,
    /// Image index from the slot's most recent successful acquire.
    image_index: u32,
    /// Bound on a single acquisition, nanoseconds.
    acquire_timeout_ns: u64,
    /// Acquisitions that timed out since the last successful one.
    consecutive_timeouts: u32,
}

impl FrameScheduler {
    /// Creates a scheduler with [`MAX_FRAMES_IN_FLIGHT`] slots.
    pub fn new(
        device: Arc<Device>,
        command_pool: &CommandPool,
        acquire_timeout_ns: u64,
    ) -> FrameResult<Self> {
        Self::with_slot_count(device, command_pool, MAX_FRAMES_IN_FLIGHT, acquire_timeout_ns)
    }

    /// Creates a scheduler with an explicit ring size.
    pub fn with_slot_count(
        device: Arc<Device>,
        command_pool: &CommandPool,
        slot_count: usize,
        acquire_timeout_ns: u64,
    ) -> FrameResult<Self> {
        let mut slots = Vec::with_capacity(slot_count);
        for i in 0..slot_count {
            slots.push(FrameSlot::new(device.clone(), command_pool)?);
            debug!("Created frame slot {}", i);
        }

        info!("Frame scheduler created with {} slots", slot_count);

        Ok(Self {
            device,
            slots,
            ring: FrameRing::new(slot_count),
            image_index: 0,
            acquire_timeout_ns,
            consecutive_timeouts: 0,
        })
    }

    /// Index of the slot the next frame will use.
    #[inline]
    pub fn current_slot(&self) -> usize {
        self.ring.current()
    }

    /// Image index from the most recent successful acquire.
    #[inline]
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Highest submission serial whose fence has been observed signaled.
    ///
    /// The resource cache retires in-flight references up to this value.
    #[inline]
    pub fn completed_serial(&self) -> u64 {
        self.ring.completed_serial()
    }

    /// Number of submissions still in flight.
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.ring.in_flight()
    }

    /// Consecutive acquire timeouts since the last delivered image.
    #[inline]
    pub fn consecutive_timeouts(&self) -> u32 {
        self.consecutive_timeouts
    }

    /// Command buffer of the current slot, for recording.
    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.slots[self.ring.current()].command_buffer
    }

    /// Waits for the current slot's previous submission to complete, then
    /// retires it.
    ///
    /// This is the deferred fence wait that bounds frames in flight: the
    /// wait belongs to the cycle *reusing* the slot, not the one that
    /// submitted. Returns the highest completed serial so the caller can
    /// retire cache references.
    pub fn wait_for_slot(&mut self) -> FrameResult<u64> {
        let pending = self.ring.pending_serial();
        if pending > self.ring.completed_serial() {
            self.slots[self.ring.current()].fence.wait(u64::MAX)?;
            self.ring.observe_completed(pending);
        }
        Ok(self.ring.completed_serial())
    }

    /// Requests the next swapchain image for the current slot.
    ///
    /// Bounded by the configured acquire timeout. Must follow
    /// [`wait_for_slot`](Self::wait_for_slot) in the same cycle.
    pub fn acquire(&mut self, swapchain: &Swapchain) -> FrameResult<AcquireOutcome> {
        self.ring.begin_acquire()?;

        let slot = &self.slots[self.ring.current()];
        match swapchain.acquire(slot.image_available.handle(), self.acquire_timeout_ns)? {
            Acquired::Image { index, suboptimal } => {
                self.consecutive_timeouts = 0;
                self.image_index = index;
                Ok(AcquireOutcome::Ready {
                    image_index: index,
                    suboptimal,
                })
            }
            Acquired::Timeout => {
                self.ring.acquire_failed()?;
                self.consecutive_timeouts += 1;
                if self.consecutive_timeouts == 1 || self.consecutive_timeouts % 100 == 0 {
                    debug!(
                        "Acquire timed out ({} consecutive), skipping frame",
                        self.consecutive_timeouts
                    );
                }
                Ok(AcquireOutcome::Skipped)
            }
            Acquired::OutOfDate => {
                self.ring.acquire_failed()?;
                debug!("Swapchain out of date during acquire");
                Ok(AcquireOutcome::OutOfDate)
            }
        }
    }

    /// Begins command recording for the current slot.
    ///
    /// Resets the slot fence and command buffer. The fence reset happens
    /// here, after the image is known to exist, so an aborted acquire never
    /// leaves the slot with an unsignaled fence nothing will signal.
    pub fn begin_recording(&mut self) -> FrameResult<&CommandBuffer> {
        self.ring.begin_recording()?;

        let slot = &self.slots[self.ring.current()];
        slot.fence.reset()?;
        slot.command_buffer.reset()?;
        slot.command_buffer.begin()?;
        Ok(&slot.command_buffer)
    }

    /// Ends recording and submits the slot's commands to the graphics
    /// queue.
    ///
    /// The submission waits on "image available" at `wait_stage` (the
    /// first stage that touches the swapchain image), signals "render
    /// finished", and signals the slot fence on completion. Returns the
    /// submission's serial for cache bookkeeping.
    pub fn submit(&mut self, wait_stage: vk::PipelineStageFlags) -> FrameResult<u64> {
        // Transition first so a ring violation surfaces before any device
        // call touches the command buffer.
        let serial = self.ring.submitted()?;

        let slot = &self.slots[self.ring.current()];
        slot.command_buffer.end()?;

        self.device.submit(
            &[slot.command_buffer.handle()],
            &[(slot.image_available.handle(), wait_stage)],
            &[slot.render_finished.handle()],
            slot.fence.handle(),
        )?;

        Ok(serial)
    }

    /// Issues the present request for the current slot's image.
    ///
    /// On [`SurfaceStatus::OutOfDate`] or [`SurfaceStatus::Suboptimal`] the
    /// caller triggers a swapchain rebuild; the slot has already returned
    /// to idle and its submission is retired at reuse or drain.
    pub fn present(&mut self, swapchain: &Swapchain) -> FrameResult<SurfaceStatus> {
        self.ring.begin_present()?;

        let slot = &self.slots[self.ring.current()];
        let status = swapchain.present(
            self.device.present_queue(),
            self.image_index,
            slot.render_finished.handle(),
        )?;

        match status {
            SurfaceStatus::Optimal | SurfaceStatus::Suboptimal => self.ring.presented()?,
            SurfaceStatus::OutOfDate => self.ring.present_aborted()?,
        }

        Ok(status)
    }

    /// Waits until every in-flight submission has signaled its fence.
    ///
    /// Called before a swapchain rebuild (nothing may reference the old
    /// chain) and at shutdown (nothing may be destroyed while referenced by
    /// an unsignaled fence). Returns the completed serial for final cache
    /// retirement.
    pub fn drain(&mut self) -> FrameResult<u64> {
        let fences: Vec<vk::Fence> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(i, _)| self.ring.slot_serial(*i) > self.ring.completed_serial())
            .map(|(_, slot)| slot.fence.handle())
            .collect();

        if !fences.is_empty() {
            unsafe {
                self.device
                    .handle()
                    .wait_for_fences(&fences, true, u64::MAX)
                    .map_err(prism_rhi::RhiError::from)?;
            }
        }

        let highest = self.ring.next_serial() - 1;
        self.ring.observe_completed(highest);
        debug!("Drained; all submissions up to {} retired", highest);

        Ok(self.ring.completed_serial())
    }

    /// Replaces every slot's semaphores after a swapchain rebuild.
    ///
    /// An acquire whose present was aborted can leave a binary semaphore
    /// signaled with no consumer; fresh semaphores put every slot in a
    /// known state.
    pub fn reset_semaphores(&mut self) -> FrameResult<()> {
        if !self.ring.all_retired() {
            warn!("reset_semaphores called with frames in flight; draining first");
            self.drain()?;
        }

        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.image_available = Semaphore::new(self.device.clone())?;
            slot.render_finished = Semaphore::new(self.device.clone())?;
            debug!("Reset semaphores for slot {}", i);
        }

        Ok(())
    }

    /// Ring size.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_frames_in_flight_is_small() {
        assert!(MAX_FRAMES_IN_FLIGHT >= 1);
        assert!(MAX_FRAMES_IN_FLIGHT <= 3);
    }

    #[test]
    fn test_scheduler_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FrameScheduler>();
    }
}
