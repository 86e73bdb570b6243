use std::path::PathBuf;
use std::sync::Arc;

use ash::vk;

use crate::vulkan::shader::ShaderModule;
use crate::{RendererError, Result};

/// Pipeline layout assembled from descriptor set layouts and push
/// constant ranges.
pub struct PipelineLayout {
    device: Arc<ash::Device>,
    handle: vk::PipelineLayout,
}

impl PipelineLayout {
    pub fn builder(device: Arc<ash::Device>) -> PipelineLayoutBuilder {
        PipelineLayoutBuilder {
            device,
            set_layouts: Vec::new(),
            push_constants: Vec::new(),
        }
    }

    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline_layout(self.handle, None);
        }
    }
}

pub struct PipelineLayoutBuilder {
    device: Arc<ash::Device>,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    push_constants: Vec<vk::PushConstantRange>,
}

impl PipelineLayoutBuilder {
    pub fn add_set_layout(mut self, layout: vk::DescriptorSetLayout) -> Self {
        self.set_layouts.push(layout);
        self
    }

    pub fn add_push_constant(mut self, range: vk::PushConstantRange) -> Self {
        self.push_constants.push(range);
        self
    }

    pub fn build(self) -> Result<PipelineLayout> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&self.set_layouts)
            .push_constant_ranges(&self.push_constants);

        let handle = unsafe {
            self.device
                .create_pipeline_layout(&create_info, None)
                .map_err(|e| {
                    RendererError::DeviceInitFailed(format!(
                        "Failed to create pipeline layout: {e:?}"
                    ))
                })?
        };

        Ok(PipelineLayout {
            device: self.device,
            handle,
        })
    }
}

/// Vertex input state for one pipeline style.
#[derive(Clone, Default)]
pub struct VertexInput {
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

/// Immutable graphics pipeline state object.
pub struct Pipeline {
    device: Arc<ash::Device>,
    handle: vk::Pipeline,
}

impl Pipeline {
    pub fn builder(device: Arc<ash::Device>) -> PipelineBuilder {
        PipelineBuilder {
            device,
            layout: vk::PipelineLayout::null(),
            render_pass: vk::RenderPass::null(),
            vertex_input: VertexInput::default(),
            shader_paths: Vec::new(),
            cull_mode: vk::CullModeFlags::BACK,
            depth_test: true,
            depth_write: true,
        }
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.handle, None);
        }
    }
}

pub struct PipelineBuilder {
    device: Arc<ash::Device>,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    vertex_input: VertexInput,
    shader_paths: Vec<(PathBuf, vk::ShaderStageFlags)>,
    cull_mode: vk::CullModeFlags,
    depth_test: bool,
    depth_write: bool,
}

impl PipelineBuilder {
    pub fn with_layout(mut self, layout: vk::PipelineLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_render_pass(mut self, render_pass: vk::RenderPass) -> Self {
        self.render_pass = render_pass;
        self
    }

    pub fn with_vertex_input(mut self, vertex_input: VertexInput) -> Self {
        self.vertex_input = vertex_input;
        self
    }

    pub fn with_cull_mode(mut self, cull_mode: vk::CullModeFlags) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    pub fn with_depth(mut self, test: bool, write: bool) -> Self {
        self.depth_test = test;
        self.depth_write = write;
        self
    }

    pub fn add_shader(mut self, path: impl Into<PathBuf>, stage: vk::ShaderStageFlags) -> Self {
        self.shader_paths.push((path.into(), stage));
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        if self.layout == vk::PipelineLayout::null() {
            return Err(RendererError::VulkanError(
                "Graphics pipeline requires a layout".into(),
            ));
        }
        if self.render_pass == vk::RenderPass::null() {
            return Err(RendererError::VulkanError(
                "Graphics pipeline requires a render pass".into(),
            ));
        }

        let mut modules = Vec::with_capacity(self.shader_paths.len());
        for (path, stage) in &self.shader_paths {
            modules.push(ShaderModule::from_file(
                Arc::clone(&self.device),
                path,
                *stage,
            )?);
        }
        let stages: Vec<vk::PipelineShaderStageCreateInfo> =
            modules.iter().map(|m| m.stage_info()).collect();

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_input.bindings)
            .vertex_attribute_descriptions(&self.vertex_input.attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_write)
            .depth_compare_op(vk::CompareOp::LESS);

        let blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false);
        let blend_attachments = [blend_attachment];
        let color_blending =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(self.layout)
            .render_pass(self.render_pass)
            .subpass(0);

        let handle = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| {
                    RendererError::DeviceInitFailed(format!(
                        "Failed to create graphics pipeline: {e:?}"
                    ))
                })?[0]
        };

        // Shader modules are no longer needed once the pipeline exists.
        drop(modules);

        Ok(Pipeline {
            device: self.device,
            handle,
        })
    }
}

/// Compute pipeline for the one-time environment conversion. Destroyed
/// right after its single dispatch.
pub struct ComputePipeline {
    device: Arc<ash::Device>,
    handle: vk::Pipeline,
}

impl ComputePipeline {
    pub fn new(
        device: Arc<ash::Device>,
        layout: vk::PipelineLayout,
        shader_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let module = ShaderModule::from_file(
            Arc::clone(&device),
            &shader_path.into(),
            vk::ShaderStageFlags::COMPUTE,
        )?;

        let create_info = vk::ComputePipelineCreateInfo::default()
            .stage(module.stage_info())
            .layout(layout);

        let handle = unsafe {
            device
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| {
                    RendererError::DeviceInitFailed(format!(
                        "Failed to create compute pipeline: {e:?}"
                    ))
                })?[0]
        };

        Ok(Self { device, handle })
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }
}

impl Drop for ComputePipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.handle, None);
        }
    }
}
