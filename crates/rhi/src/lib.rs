//! Vulkan abstraction layer for the prism lifecycle manager.
//!
//! Safe wrappers over `ash` for everything the frame scheduler and resource
//! cache touch:
//! - Instance and device bring-up
//! - Physical device selection
//! - Swapchain build/rebuild, acquisition, and presentation
//! - Synchronization primitives
//! - Command pools and buffers
//! - Buffers, images, shader modules, and pipelines

mod error;

pub mod buffer;
pub mod command;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that callers need at the seams.
pub use ash::vk;
