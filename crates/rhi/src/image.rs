//! GPU image wrappers.
//!
//! 2D images with a single mip level, allocated GPU-only, with an attached
//! default view. Like buffers, images are created through the resource
//! cache and keyed by their descriptor.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Intended use of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageUsage {
    /// Render target for color output
    ColorAttachment,
    /// Depth/stencil target
    DepthAttachment,
    /// Sampled in shaders
    Sampled,
}

impl ImageUsage {
    /// Vulkan usage flags for this image kind.
    pub fn to_vk_usage(self) -> vk::ImageUsageFlags {
        match self {
            ImageUsage::ColorAttachment => {
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED
            }
            ImageUsage::DepthAttachment => vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            ImageUsage::Sampled => {
                vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST
            }
        }
    }

    /// The aspect the default view covers.
    pub fn aspect_mask(self) -> vk::ImageAspectFlags {
        match self {
            ImageUsage::DepthAttachment => vk::ImageAspectFlags::DEPTH,
            _ => vk::ImageAspectFlags::COLOR,
        }
    }

    /// Short name for logs and allocator tags.
    pub fn name(self) -> &'static str {
        match self {
            ImageUsage::ColorAttachment => "color attachment",
            ImageUsage::DepthAttachment => "depth attachment",
            ImageUsage::Sampled => "sampled",
        }
    }
}

/// A VkImage plus its allocation and default view.
///
/// Destruction order in drop: view, then image, then the allocation.
pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent2D,
    usage: ImageUsage,
}

impl Image {
    /// Creates a GPU-only 2D image and its default view.
    ///
    /// # Errors
    ///
    /// `RhiError::Allocation` when device memory is exhausted.
    pub fn new(
        device: Arc<Device>,
        width: u32,
        height: u32,
        format: vk::Format,
        usage: ImageUsage,
    ) -> RhiResult<Self> {
        if width == 0 || height == 0 {
            return Err(RhiError::InvalidArgument(format!(
                "image extent must be nonzero, got {width}x{height}"
            )));
        }

        let extent = vk::Extent2D { width, height };

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage.to_vk_usage())
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = {
            let mut allocator = device
                .allocator()
                .lock()
                .expect("allocator mutex poisoned");
            match allocator.allocate(&AllocationCreateDesc {
                name: usage.name(),
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    unsafe { device.handle().destroy_image(image, None) };
                    return Err(e.into());
                }
            }
        };

        unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(usage.aspect_mask())
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = unsafe { device.handle().create_image_view(&view_info, None)? };

        debug!(
            "Created {} image: {}x{} {:?}",
            usage.name(),
            width,
            height,
            format
        );

        Ok(Self {
            device,
            image,
            view,
            allocation: Some(allocation),
            format,
            extent,
            usage,
        })
    }

    /// Returns the Vulkan image handle.
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Returns the default image view.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the image extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the image usage kind.
    #[inline]
    pub fn usage(&self) -> ImageUsage {
        self.usage
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self
                .device
                .allocator()
                .lock()
                .expect("allocator mutex poisoned");
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free image allocation: {:?}", e);
            }
        }

        debug!("Destroyed {} image", self.usage.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_flags() {
        assert!(
            ImageUsage::ColorAttachment
                .to_vk_usage()
                .contains(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        );
        assert!(
            ImageUsage::DepthAttachment
                .to_vk_usage()
                .contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        );
    }

    #[test]
    fn test_aspect_masks() {
        assert_eq!(
            ImageUsage::DepthAttachment.aspect_mask(),
            vk::ImageAspectFlags::DEPTH
        );
        assert_eq!(
            ImageUsage::Sampled.aspect_mask(),
            vk::ImageAspectFlags::COLOR
        );
    }
}
