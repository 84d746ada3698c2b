//! Foundation types for the prism GPU lifecycle manager.
//!
//! This crate provides what every other crate in the workspace leans on:
//! - Error types and result aliases
//! - Logging initialization
//! - Renderer configuration
//! - Frame timing utilities

mod config;
mod error;
mod logging;
mod timer;

pub use config::RendererConfig;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::FrameTimer;
