//! Cache error types.

use thiserror::Error;

/// Errors produced by the resource cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Device memory was exhausted while constructing a resource.
    ///
    /// Propagated to the caller for an application-level decision; the
    /// cache never retries allocation on its own.
    #[error("Allocation error: {0}")]
    Allocation(gpu_allocator::AllocationError),

    /// Resource construction failed below the allocator.
    #[error(transparent)]
    Rhi(prism_rhi::RhiError),

    /// A handle referred to a resource that no longer exists (destroyed or
    /// evicted).
    #[error("Stale resource handle (index {index}, generation {generation})")]
    StaleHandle {
        /// Handle index.
        index: u32,
        /// Handle generation.
        generation: u32,
    },
}

impl From<prism_rhi::RhiError> for CacheError {
    fn from(err: prism_rhi::RhiError) -> Self {
        // Keep allocation exhaustion distinguishable from other RHI
        // failures; callers treat it as fatal-but-reportable.
        match err {
            prism_rhi::RhiError::Allocation(e) => CacheError::Allocation(e),
            other => CacheError::Rhi(other),
        }
    }
}

/// Result type alias for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
