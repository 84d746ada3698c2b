//! Demo orchestration: wires the window, device, swapchain, scheduler, and
//! cache into a running frame loop.
//!
//! Each frame clears the swapchain image and keeps a uniform buffer plus an
//! extent-sized offscreen image alive through the resource cache, so the
//! whole lifecycle — acquire, record, submit, present, deferred destruction,
//! rebuild on resize — is exercised by the binary.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::HasDisplayHandle;
use tracing::{debug, info, warn};

use prism_cache::{ResourceCache, ResourceDescriptor, ResourceHandle};
use prism_core::{FrameTimer, RendererConfig};
use prism_frame::{AcquireOutcome, FrameScheduler};
use prism_platform::{Surface, Window, required_surface_extensions};
use prism_rhi::buffer::BufferUsage;
use prism_rhi::command::CommandPool;
use prism_rhi::device::Device;
use prism_rhi::image::ImageUsage;
use prism_rhi::instance::Instance;
use prism_rhi::physical_device::select_physical_device;
use prism_rhi::swapchain::{SurfaceStatus, Swapchain};

/// Clear color for the demo frames.
const CLEAR_COLOR: [f32; 4] = [0.05, 0.07, 0.12, 1.0];

/// Owns every GPU-side object and drives the per-frame lifecycle.
///
/// Teardown order is explicit: scheduler drain first, then cache, frame
/// objects, swapchain, and surface, then the device, and the instance last.
pub struct Renderer {
    // ManuallyDrop fields are torn down by hand in Drop, in dependency
    // order; the instance must outlive the device, the device everything
    // else.
    instance: ManuallyDrop<Instance>,
    device: ManuallyDrop<Arc<Device>>,
    surface: ManuallyDrop<Surface>,
    swapchain: ManuallyDrop<Swapchain>,
    command_pool: ManuallyDrop<CommandPool>,
    scheduler: ManuallyDrop<FrameScheduler>,
    cache: ManuallyDrop<ResourceCache>,

    config: RendererConfig,
    timer: FrameTimer,

    /// Per-frame uniform data, cached for the whole run.
    frame_ubo: ResourceHandle,
    /// Extent-sized scratch target, evicted and rebuilt on resize.
    offscreen: ResourceHandle,
    offscreen_desc: ResourceDescriptor,

    /// The swapchain no longer matches the surface; rebuild before the
    /// next frame.
    swapchain_dirty: bool,
}

impl Renderer {
    /// Brings up the full stack against `window`.
    pub fn new(window: &Window, config: RendererConfig) -> Result<Self> {
        let display_handle = window
            .inner()
            .display_handle()
            .context("window has no display handle")?;
        let surface_extensions = required_surface_extensions(display_handle.as_raw())?;

        let instance = Instance::new(config.enable_validation, &surface_extensions)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info)?;

        let (width, height) = window.current_extent();
        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            width,
            height,
            config.prefer_mailbox,
        )?;

        let graphics_family = device
            .queue_families()
            .graphics_family
            .expect("selected device has a graphics family");
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;

        let scheduler =
            FrameScheduler::new(device.clone(), &command_pool, config.acquire_timeout_ns())?;

        let mut cache = ResourceCache::new(device.clone());

        let frame_ubo = cache.acquire(&ResourceDescriptor::Buffer {
            usage: BufferUsage::Uniform,
            size: 64,
        })?;

        let offscreen_desc = offscreen_descriptor(swapchain.extent());
        let offscreen = cache.acquire(&offscreen_desc)?;

        info!("Renderer initialized ({}x{})", width, height);

        Ok(Self {
            instance: ManuallyDrop::new(instance),
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            swapchain: ManuallyDrop::new(swapchain),
            command_pool: ManuallyDrop::new(command_pool),
            scheduler: ManuallyDrop::new(scheduler),
            cache: ManuallyDrop::new(cache),
            config,
            timer: FrameTimer::new(),
            frame_ubo,
            offscreen,
            offscreen_desc,
            swapchain_dirty: false,
        })
    }

    /// Flags the swapchain for rebuild; called from the resize event.
    pub fn resize(&mut self, width: u32, height: u32) {
        debug!("Resize to {}x{}, invalidating swapchain", width, height);
        self.swapchain_dirty = true;
    }

    /// Produces one frame, or skips it when the window cannot present.
    pub fn render_frame(&mut self, window: &Window) -> Result<()> {
        // A minimized window stalls acquisition indefinitely; produce
        // nothing instead of spinning.
        if window.is_minimized() {
            return Ok(());
        }

        if self.swapchain_dirty {
            self.rebuild_swapchain(window)?;
            if self.swapchain_dirty {
                // Still unusable (e.g. zero-area mid-resize); try later.
                return Ok(());
            }
        }

        // Backpressure point: the current slot's previous submission must
        // have retired. Whatever completed can now actually be freed.
        let completed = self.scheduler.wait_for_slot()?;
        self.cache.retire(completed);

        let image_index = match self.scheduler.acquire(&self.swapchain)? {
            AcquireOutcome::Ready {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    self.swapchain_dirty = true;
                }
                image_index
            }
            AcquireOutcome::Skipped => return Ok(()),
            AcquireOutcome::OutOfDate => {
                self.swapchain_dirty = true;
                return Ok(());
            }
        };

        // Update per-frame data before recording references it.
        let delta = self.timer.delta_secs();
        let elapsed = self.timer.elapsed().as_secs_f32();
        let extent = self.swapchain.extent();
        let ubo_data = frame_ubo_bytes(elapsed, delta, extent);
        if let Some(buffer) = self.cache.buffer(self.frame_ubo) {
            buffer.write(0, &ubo_data)?;
        }

        let cmd = self.scheduler.begin_recording()?;

        let image = self.swapchain.image(image_index as usize);
        cmd.transition_image(
            image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
        );
        cmd.clear_color_image(image, CLEAR_COLOR);
        cmd.transition_image(
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::empty(),
        );

        // The first touch of the swapchain image is the transfer clear.
        let serial = self.scheduler.submit(vk::PipelineStageFlags::TRANSFER)?;

        // Everything this submission referenced stays alive until its
        // fence is observed signaled.
        self.cache.mark_used(self.frame_ubo, serial)?;
        self.cache.mark_used(self.offscreen, serial)?;

        match self.scheduler.present(&self.swapchain)? {
            SurfaceStatus::Optimal => {}
            SurfaceStatus::Suboptimal | SurfaceStatus::OutOfDate => {
                self.swapchain_dirty = true;
            }
        }

        Ok(())
    }

    /// Rebuilds the swapchain for the current window extent.
    ///
    /// Drains in-flight frames first so nothing references the old chain,
    /// evicts extent-sized cache entries, and resets slot semaphores.
    fn rebuild_swapchain(&mut self, window: &Window) -> Result<()> {
        let (width, height) = window.current_extent();
        if width == 0 || height == 0 {
            // Leave the dirty flag set; a real extent will arrive.
            return Ok(());
        }

        // No frame may straddle the old and new chains.
        let completed = self.scheduler.drain()?;
        self.cache.retire(completed);

        // The offscreen target tracks the surface extent; rebuild it too.
        let old_desc = self.offscreen_desc.clone();
        self.cache.evict(|desc| *desc == old_desc);
        self.cache.retire(completed);

        self.swapchain
            .recreate(&self.instance, self.surface.handle(), width, height)?;
        self.scheduler.reset_semaphores()?;

        self.offscreen_desc = offscreen_descriptor(self.swapchain.extent());
        self.offscreen = self.cache.acquire(&self.offscreen_desc)?;

        self.swapchain_dirty = false;
        info!(
            "Swapchain rebuilt at {}x{}",
            self.swapchain.extent().width,
            self.swapchain.extent().height
        );
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Shutdown drain: every fence must be observed signaled before any
        // GPU object goes away.
        match self.scheduler.drain() {
            Ok(completed) => {
                self.cache.retire(completed);
            }
            Err(e) => warn!("Drain during shutdown failed: {:?}", e),
        }

        if let Err(e) = self.cache.release(self.frame_ubo) {
            warn!("Releasing frame UBO failed: {:?}", e);
        }
        if let Err(e) = self.cache.release(self.offscreen) {
            warn!("Releasing offscreen target failed: {:?}", e);
        }

        // SAFETY: each field is dropped exactly once, in dependency order;
        // none is used afterwards.
        unsafe {
            ManuallyDrop::drop(&mut self.cache);
            ManuallyDrop::drop(&mut self.scheduler);
            ManuallyDrop::drop(&mut self.command_pool);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.surface);
            // Last Arc: destroys the logical device.
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer shut down");
    }
}

fn offscreen_descriptor(extent: vk::Extent2D) -> ResourceDescriptor {
    ResourceDescriptor::Image {
        width: extent.width,
        height: extent.height,
        format: vk::Format::B8G8R8A8_SRGB,
        usage: ImageUsage::ColorAttachment,
    }
}

fn frame_ubo_bytes(elapsed: f32, delta: f32, extent: vk::Extent2D) -> Vec<u8> {
    let values = [
        elapsed,
        delta,
        extent.width as f32,
        extent.height as f32,
    ];
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_ubo_layout() {
        let bytes = frame_ubo_bytes(
            1.0,
            0.016,
            vk::Extent2D {
                width: 800,
                height: 600,
            },
        );
        assert_eq!(bytes.len(), 16);

        let elapsed = f32::from_ne_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(elapsed, 1.0);
        let width = f32::from_ne_bytes(bytes[8..12].try_into().unwrap());
        assert_eq!(width, 800.0);
    }
}
