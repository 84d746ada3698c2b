//! Graphics pipeline construction.
//!
//! Pipelines target dynamic rendering (no render pass objects) and use
//! dynamic viewport/scissor state so they survive swapchain rebuilds
//! without recompilation. Vertex input is left empty; geometry is expected
//! to come from vertex-index pulls or generated in the vertex stage.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::ShaderModule;

/// Parameters for building a graphics pipeline.
#[derive(Clone, Copy, Debug)]
pub struct GraphicsPipelineDesc {
    /// Format of the color attachment the pipeline renders to.
    pub color_format: vk::Format,
    /// Primitive topology.
    pub topology: vk::PrimitiveTopology,
    /// Face culling mode.
    pub cull_mode: vk::CullModeFlags,
    /// Bytes of push-constant space visible to both stages; 0 for none.
    pub push_constant_size: u32,
}

impl Default for GraphicsPipelineDesc {
    fn default() -> Self {
        Self {
            color_format: vk::Format::B8G8R8A8_SRGB,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::BACK,
            push_constant_size: 0,
        }
    }
}

/// A graphics pipeline and the layout it owns.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl Pipeline {
    /// Builds a graphics pipeline from a vertex and a fragment module.
    ///
    /// # Errors
    ///
    /// Returns `RhiError::Pipeline` when the driver rejects the pipeline
    /// state.
    pub fn new_graphics(
        device: Arc<Device>,
        vertex: &ShaderModule,
        fragment: &ShaderModule,
        desc: &GraphicsPipelineDesc,
    ) -> RhiResult<Self> {
        let layout = create_layout(&device, desc.push_constant_size)?;

        let stages = [vertex.stage_create_info(), fragment.stage_create_info()];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();

        let input_assembly =
            vk::PipelineInputAssemblyStateCreateInfo::default().topology(desc.topology);

        // Dynamic viewport/scissor: counts here, values at record time.
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(desc.cull_mode)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false);
        let attachments = [color_blend_attachment];
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [desc.color_format];
        let mut rendering_info =
            vk::PipelineRenderingCreateInfo::default().color_attachment_formats(&color_formats);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| RhiError::Pipeline(format!("pipeline creation failed: {e:?}")))?
        };

        info!("Graphics pipeline created ({:?})", desc.color_format);

        Ok(Self {
            device,
            pipeline: pipelines[0],
            layout,
        })
    }

    /// Returns the Vulkan pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Returns the pipeline layout handle.
    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Graphics pipeline destroyed");
    }
}

fn create_layout(device: &Arc<Device>, push_constant_size: u32) -> RhiResult<vk::PipelineLayout> {
    let push_constant_ranges = [vk::PushConstantRange::default()
        .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
        .offset(0)
        .size(push_constant_size)];

    let create_info = if push_constant_size > 0 {
        vk::PipelineLayoutCreateInfo::default().push_constant_ranges(&push_constant_ranges)
    } else {
        vk::PipelineLayoutCreateInfo::default()
    };

    let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_desc() {
        let desc = GraphicsPipelineDesc::default();
        assert_eq!(desc.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(desc.push_constant_size, 0);
    }
}
