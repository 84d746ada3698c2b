//! Renderer configuration.

use std::time::Duration;

/// Startup configuration for the lifecycle manager.
///
/// Everything here is decided once, before the device exists. Runtime
/// reconfiguration (resize, swapchain rebuilds) flows through the frame
/// scheduler instead.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial window width in physical pixels.
    pub width: u32,
    /// Initial window height in physical pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
    /// Enable Vulkan validation layers when available.
    pub enable_validation: bool,
    /// Prefer a low-latency present mode (MAILBOX) over plain vsync (FIFO).
    pub prefer_mailbox: bool,
    /// Upper bound on a single swapchain image acquisition.
    ///
    /// When this elapses the scheduler skips the frame instead of blocking
    /// the thread further (a minimized window can stall acquisition
    /// indefinitely on some compositors).
    pub acquire_timeout: Duration,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "prism".to_string(),
            enable_validation: cfg!(debug_assertions),
            prefer_mailbox: true,
            acquire_timeout: Duration::from_millis(100),
        }
    }
}

impl RendererConfig {
    /// Acquire timeout in nanoseconds, the unit Vulkan waits take.
    pub fn acquire_timeout_ns(&self) -> u64 {
        self.acquire_timeout.as_nanos().min(u64::MAX as u128) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_sane() {
        let config = RendererConfig::default();
        assert!(config.width > 0);
        assert!(config.height > 0);
        assert!(!config.acquire_timeout.is_zero());
    }

    #[test]
    fn test_acquire_timeout_ns() {
        let config = RendererConfig {
            acquire_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        assert_eq!(config.acquire_timeout_ns(), 100_000_000);
    }
}
