//! Top-level error types shared across the workspace.

use thiserror::Error;

/// Errors surfaced at the application boundary.
///
/// The rhi, frame, and cache crates define their own richer error types;
/// this one is what the platform layer and the binary speak.
#[derive(Error, Debug)]
pub enum Error {
    /// The platform could not produce a window or drawable surface.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Vulkan-related errors that crossed a crate boundary as text.
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// GPU resource creation or lookup errors.
    #[error("Resource error: {0}")]
    Resource(String),

    /// Configuration errors.
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything that indicates a bug rather than an environment problem.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the workspace's top-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
