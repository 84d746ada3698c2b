//! Frame scheduler error types.

use thiserror::Error;

use crate::ring::RingError;

/// Errors produced while driving the frame lifecycle.
#[derive(Error, Debug)]
pub enum FrameError {
    /// An RHI call failed underneath the scheduler.
    #[error(transparent)]
    Rhi(#[from] prism_rhi::RhiError),

    /// The frame ring rejected a transition; indicates a driver bug in the
    /// calling code, not a device problem.
    #[error(transparent)]
    Ring(#[from] RingError),
}

/// Result type alias for frame operations.
pub type FrameResult<T> = std::result::Result<T, FrameError>;
