//! GPU-backed resource cache.
//!
//! Binds the [`CacheLedger`](crate::ledger::CacheLedger) bookkeeping to
//! real resource construction: descriptors become buffers, images, or
//! pipelines built through the rhi crate. The cache owns every resource it
//! creates; callers only ever hold [`ResourceHandle`]s.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use prism_rhi::buffer::Buffer;
use prism_rhi::device::Device;
use prism_rhi::image::Image;
use prism_rhi::pipeline::{GraphicsPipelineDesc, Pipeline};
use prism_rhi::shader::{ShaderModule, ShaderStage};

use crate::descriptor::ResourceDescriptor;
use crate::error::CacheResult;
use crate::ledger::{CacheLedger, ResourceHandle};

/// A cached GPU resource.
pub enum GpuResource {
    /// A buffer.
    Buffer(Buffer),
    /// An image with its default view.
    Image(Image),
    /// A graphics pipeline.
    Pipeline(Pipeline),
}

/// Descriptor-keyed cache of GPU resources with frame-aware lifetimes.
///
/// Driven from the rendering thread; loader threads hand work over through
/// [`SharedResourceCache`].
pub struct ResourceCache {
    device: Arc<Device>,
    ledger: CacheLedger<ResourceDescriptor, GpuResource>,
}

/// Mutex-guarded cache handle for cross-thread handoff.
///
/// Auxiliary loading threads lock, acquire or release, and unlock; the
/// rendering thread does the same around recording. No other locking is
/// involved.
pub type SharedResourceCache = Arc<Mutex<ResourceCache>>;

impl ResourceCache {
    /// Creates an empty cache for `device`.
    pub fn new(device: Arc<Device>) -> Self {
        info!("Resource cache created");
        Self {
            device,
            ledger: CacheLedger::new(),
        }
    }

    /// Wraps a new cache for cross-thread handoff.
    pub fn new_shared(device: Arc<Device>) -> SharedResourceCache {
        Arc::new(Mutex::new(Self::new(device)))
    }

    /// Returns the handle for `descriptor`, building the resource on first
    /// use.
    ///
    /// Identical descriptors return the identical handle until the entry
    /// is evicted or fully destroyed. Each call takes a user reference;
    /// pair it with [`release`](Self::release).
    ///
    /// # Errors
    ///
    /// [`CacheError::Allocation`](crate::CacheError::Allocation) when
    /// device memory is exhausted — propagated, never retried here.
    pub fn acquire(&mut self, descriptor: &ResourceDescriptor) -> CacheResult<ResourceHandle> {
        if let Some(handle) = self.ledger.acquire_existing(descriptor) {
            return Ok(handle);
        }

        let resource = self.build(descriptor)?;
        let handle = self.ledger.insert(descriptor.clone(), resource);
        debug!(
            "Built {} for descriptor (handle {}g{})",
            descriptor.kind(),
            handle.index(),
            handle.generation()
        );
        Ok(handle)
    }

    /// Drops one user reference on `handle`.
    ///
    /// At zero references and no in-flight use, the resource is destroyed
    /// at the next completed frame boundary, never mid-flight.
    pub fn release(&mut self, handle: ResourceHandle) -> CacheResult<()> {
        self.ledger.release(handle)
    }

    /// Marks every resource whose descriptor matches `predicate` for
    /// destruction, deferred past in-flight frames.
    ///
    /// The usual caller is the resize path, evicting extent-sized images.
    /// Returns the number of resources marked.
    pub fn evict<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&ResourceDescriptor) -> bool,
    {
        let marked = self.ledger.evict(predicate);
        if marked > 0 {
            info!("Evicted {} cache entries (destruction deferred)", marked);
        }
        marked
    }

    /// Records that the submission stamped `serial` references `handle`.
    ///
    /// Call once per referenced resource while recording; the scheduler's
    /// serial from `submit` identifies the submission.
    pub fn mark_used(&mut self, handle: ResourceHandle, serial: u64) -> CacheResult<()> {
        self.ledger.mark_used(handle, serial)
    }

    /// Retires in-flight references for all submissions up to
    /// `completed_serial` and destroys what became unreferenced.
    ///
    /// Wire this to the scheduler: the serial returned by `wait_for_slot`
    /// or `drain` is exactly what belongs here. Returns the number of
    /// resources destroyed.
    pub fn retire(&mut self, completed_serial: u64) -> usize {
        // Dropping the payloads frees the GPU objects via their Drop impls.
        let destroyed = self.ledger.retire(completed_serial);
        destroyed.len()
    }

    /// The buffer behind `handle`, when it is alive and a buffer.
    pub fn buffer(&self, handle: ResourceHandle) -> Option<&Buffer> {
        match self.ledger.get(handle)? {
            GpuResource::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    /// The image behind `handle`, when it is alive and an image.
    pub fn image(&self, handle: ResourceHandle) -> Option<&Image> {
        match self.ledger.get(handle)? {
            GpuResource::Image(image) => Some(image),
            _ => None,
        }
    }

    /// The pipeline behind `handle`, when it is alive and a pipeline.
    pub fn pipeline(&self, handle: ResourceHandle) -> Option<&Pipeline> {
        match self.ledger.get(handle)? {
            GpuResource::Pipeline(pipeline) => Some(pipeline),
            _ => None,
        }
    }

    /// Number of live cache entries, zombies included.
    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    fn build(&self, descriptor: &ResourceDescriptor) -> CacheResult<GpuResource> {
        match descriptor {
            ResourceDescriptor::Buffer { usage, size } => {
                let buffer = Buffer::new(self.device.clone(), *usage, *size)?;
                Ok(GpuResource::Buffer(buffer))
            }
            ResourceDescriptor::Image {
                width,
                height,
                format,
                usage,
            } => {
                let image = Image::new(self.device.clone(), *width, *height, *format, *usage)?;
                Ok(GpuResource::Image(image))
            }
            ResourceDescriptor::Pipeline {
                vertex_spirv,
                fragment_spirv,
                color_format,
                push_constant_size,
            } => {
                let vertex = ShaderModule::from_spirv(
                    self.device.clone(),
                    vertex_spirv,
                    ShaderStage::Vertex,
                    "main",
                )?;
                let fragment = ShaderModule::from_spirv(
                    self.device.clone(),
                    fragment_spirv,
                    ShaderStage::Fragment,
                    "main",
                )?;

                let desc = GraphicsPipelineDesc {
                    color_format: *color_format,
                    push_constant_size: *push_constant_size,
                    ..GraphicsPipelineDesc::default()
                };

                // The modules are only needed during pipeline construction
                // and drop here.
                let pipeline =
                    Pipeline::new_graphics(self.device.clone(), &vertex, &fragment, &desc)?;
                Ok(GpuResource::Pipeline(pipeline))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ResourceCache>();
    }
}
