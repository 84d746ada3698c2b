//! Logical resource descriptors.
//!
//! A descriptor is the cache key: two acquires with equal descriptors get
//! the same GPU resource back. Shader binaries are carried as shared byte
//! slices and compared by content, so reloading the same SPIR-V from a
//! collaborator still memoizes.

use std::sync::Arc;

use ash::vk;

use prism_rhi::buffer::BufferUsage;
use prism_rhi::image::ImageUsage;

/// Logical description of a GPU resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceDescriptor {
    /// A buffer of `size` bytes for `usage`.
    Buffer {
        /// Buffer kind.
        usage: BufferUsage,
        /// Size in bytes.
        size: u64,
    },
    /// A 2D image.
    Image {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// Pixel format.
        format: vk::Format,
        /// Image kind.
        usage: ImageUsage,
    },
    /// A graphics pipeline built from precompiled SPIR-V.
    Pipeline {
        /// Vertex stage SPIR-V binary.
        vertex_spirv: Arc<[u8]>,
        /// Fragment stage SPIR-V binary.
        fragment_spirv: Arc<[u8]>,
        /// Color attachment format the pipeline renders to.
        color_format: vk::Format,
        /// Bytes of push-constant space; 0 for none.
        push_constant_size: u32,
    },
}

impl ResourceDescriptor {
    /// Short name of the resource kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceDescriptor::Buffer { .. } => "buffer",
            ResourceDescriptor::Image { .. } => "image",
            ResourceDescriptor::Pipeline { .. } => "pipeline",
        }
    }

    /// Whether this descriptor's resource depends on the surface extent.
    ///
    /// Extent-sized images are the usual eviction target on resize.
    pub fn is_extent_sized(&self, width: u32, height: u32) -> bool {
        matches!(
            self,
            ResourceDescriptor::Image {
                width: w,
                height: h,
                ..
            } if *w == width && *h == height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_descriptors_are_equal() {
        let a = ResourceDescriptor::Buffer {
            usage: BufferUsage::Uniform,
            size: 256,
        };
        let b = ResourceDescriptor::Buffer {
            usage: BufferUsage::Uniform,
            size: 256,
        };
        assert_eq!(a, b);

        let c = ResourceDescriptor::Buffer {
            usage: BufferUsage::Uniform,
            size: 512,
        };
        assert_ne!(a, c);
    }

    #[test]
    fn test_pipeline_descriptors_compare_spirv_by_content() {
        let spirv_a: Arc<[u8]> = Arc::from(&[1u8, 2, 3, 4][..]);
        let spirv_b: Arc<[u8]> = Arc::from(&[1u8, 2, 3, 4][..]);

        let a = ResourceDescriptor::Pipeline {
            vertex_spirv: spirv_a.clone(),
            fragment_spirv: spirv_a,
            color_format: vk::Format::B8G8R8A8_SRGB,
            push_constant_size: 0,
        };
        let b = ResourceDescriptor::Pipeline {
            vertex_spirv: spirv_b.clone(),
            fragment_spirv: spirv_b,
            color_format: vk::Format::B8G8R8A8_SRGB,
            push_constant_size: 0,
        };

        // Distinct Arcs, same bytes: still the same cache key.
        assert_eq!(a, b);
    }

    #[test]
    fn test_extent_sized_matches_images_only() {
        let image = ResourceDescriptor::Image {
            width: 800,
            height: 600,
            format: vk::Format::B8G8R8A8_SRGB,
            usage: ImageUsage::ColorAttachment,
        };
        assert!(image.is_extent_sized(800, 600));
        assert!(!image.is_extent_sized(1024, 768));

        let buffer = ResourceDescriptor::Buffer {
            usage: BufferUsage::Vertex,
            size: 64,
        };
        assert!(!buffer.is_extent_sized(800, 600));
    }
}
