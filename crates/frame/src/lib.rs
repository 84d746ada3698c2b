//! Frame scheduling for the prism lifecycle manager.
//!
//! Coordinates per-frame synchronization across a small ring of in-flight
//! frames: acquire → record → submit → present, with the slot fence waited
//! by the *next* cycle reusing the slot. That deferred wait is what bounds
//! the number of frames in flight to the ring size and backpressures the
//! CPU against the GPU.
//!
//! The transition rules live in [`ring::FrameRing`], a pure model with no
//! Vulkan in it; [`scheduler::FrameScheduler`] drives the real device
//! through it.

mod error;
pub mod ring;
pub mod scheduler;

pub use error::{FrameError, FrameResult};
pub use ring::{FrameRing, RingError, SlotState};
pub use scheduler::{AcquireOutcome, FrameScheduler};

/// Number of frames that may be in flight at once.
///
/// Two slots let the CPU prepare frame N+1 while the GPU renders frame N;
/// more adds latency without throughput on a single graphics queue.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
