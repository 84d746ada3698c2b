//! Window and surface management using winit.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use prism_core::{Error, RendererConfig, Result};

/// RAII wrapper for a Vulkan surface.
///
/// Owns a `vk::SurfaceKHR` and the loader needed to destroy it. The surface
/// is destroyed when this struct is dropped; the Vulkan instance must
/// outlive it.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    /// The raw Vulkan surface handle.
    ///
    /// Valid only while this `Surface` is alive; do not store the handle
    /// past it.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// The surface extension loader, for capability/format/present-mode
    /// queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: the handle was created by ash_window::create_surface and
        // the loader comes from the same instance; this is the only place
        // the surface is destroyed.
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Surface destroyed");
    }
}

/// Wraps the platform window and hands out what surface creation needs.
pub struct Window {
    window: Arc<WinitWindow>,
}

impl Window {
    /// Create a new window from the renderer configuration.
    pub fn new(event_loop: &ActiveEventLoop, config: &RendererConfig) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Platform(e.to_string()))?;

        tracing::info!("Window created: {}x{}", config.width, config.height);

        Ok(Self {
            window: Arc::new(window),
        })
    }

    /// Reference to the underlying winit window.
    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    /// Current drawable extent in physical pixels.
    ///
    /// Queried before each swapchain (re)build. Reads the live window size
    /// rather than caching it, so a resize between events is still seen.
    pub fn current_extent(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    /// Whether the window currently has a zero-area drawable region.
    ///
    /// Minimized windows report a 0x0 extent; swapchains cannot be built
    /// for them and acquisition stalls, so the scheduler skips frames while
    /// this holds.
    pub fn is_minimized(&self) -> bool {
        let (width, height) = self.current_extent();
        width == 0 || height == 0
    }

    /// Request a redraw of the window.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Create a Vulkan surface for this window.
    ///
    /// Returns an RAII [`Surface`] that destroys itself on drop.
    ///
    /// # Errors
    /// Fails if the platform cannot hand out raw window/display handles or
    /// if the Vulkan surface call itself fails.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Platform(format!("no display handle: {e}")))?;

        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Platform(format!("no window handle: {e}")))?;

        // SAFETY: entry and instance are live, and the raw handles come
        // straight from the winit window. Destruction happens exactly once,
        // in Surface::drop.
        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Platform(format!("surface creation failed: {e}")))?
        };

        let loader = ash::khr::surface::Instance::new(entry, instance);

        tracing::info!("Vulkan surface created");

        Ok(Surface { handle, loader })
    }
}

/// Instance extensions required to create a surface on this platform.
///
/// On Linux this resolves to the Wayland or X11 surface extension depending
/// on what the window was actually created against; selection happens here,
/// once, not per frame.
///
/// The returned pointers are static strings owned by the Vulkan loader.
pub fn required_surface_extensions(
    display_handle: raw_window_handle::RawDisplayHandle,
) -> Result<Vec<*const std::ffi::c_char>> {
    let extensions = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|e| Error::Platform(format!("cannot enumerate surface extensions: {e}")))?;

    tracing::debug!(
        "Surface extensions: {:?}",
        extensions
            .iter()
            // SAFETY: ash_window guarantees valid, null-terminated static strings.
            .map(|&ext| unsafe { std::ffi::CStr::from_ptr(ext) })
            .collect::<Vec<_>>()
    );

    Ok(extensions.to_vec())
}
