//! RHI error types.

use thiserror::Error;

/// Errors produced by the Vulkan abstraction layer.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Raw Vulkan API error
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] ash::vk::Result),

    /// Failed to load the Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// Device memory allocation failure
    #[error("Allocation error: {0}")]
    Allocation(#[from] gpu_allocator::AllocationError),

    /// No physical device satisfied the required capabilities
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Surface queries or surface-dependent setup failed
    #[error("Surface error: {0}")]
    Surface(String),

    /// The surface rejected the requested swapchain configuration
    #[error("Swapchain creation error: {0}")]
    SwapchainCreation(String),

    /// Shader module construction failed
    #[error("Shader error: {0}")]
    Shader(String),

    /// Pipeline construction failed
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// A handle or argument was invalid for the requested operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
