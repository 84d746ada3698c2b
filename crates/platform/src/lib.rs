//! Platform adapter for the prism lifecycle manager.
//!
//! This crate owns exactly one concern: turning a platform window into a
//! stable drawable surface the renderer can target. It knows nothing about
//! rendering.
//!
//! - Window creation via winit
//! - Vulkan surface creation (Wayland, X11, and the other winit backends)
//! - Extent queries for swapchain (re)builds

mod window;

pub use window::{Surface, Window, required_surface_extensions};

// Re-export winit types that callers need for the event loop.
pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
