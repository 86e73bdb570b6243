use std::sync::Arc;

use ash::vk;

use crate::{RendererError, Result};

/// Single-subpass render pass over a cleared color attachment (stored
/// and presented) and a cleared depth attachment (discarded after the
/// pass). The external dependency orders this frame's attachment writes
/// after any earlier work still touching the same swapchain image.
pub struct RenderPass {
    device: Arc<ash::Device>,
    handle: vk::RenderPass,
}

impl RenderPass {
    pub fn builder(device: Arc<ash::Device>) -> RenderPassBuilder {
        RenderPassBuilder {
            device,
            color_format: None,
            depth_format: None,
        }
    }

    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.handle, None);
        }
    }
}

pub struct RenderPassBuilder {
    device: Arc<ash::Device>,
    color_format: Option<vk::Format>,
    depth_format: Option<vk::Format>,
}

impl RenderPassBuilder {
    pub fn with_swapchain_color(mut self, format: vk::Format) -> Self {
        self.color_format = Some(format);
        self
    }

    pub fn with_depth_attachment(mut self, format: vk::Format) -> Self {
        self.depth_format = Some(format);
        self
    }

    pub fn build(self) -> Result<RenderPass> {
        let color_format = self.color_format.ok_or_else(|| {
            RendererError::VulkanError("Render pass requires a color format".into())
        })?;
        let depth_format = self.depth_format.ok_or_else(|| {
            RendererError::VulkanError("Render pass requires a depth format".into())
        })?;

        let color_attachment = vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        let depth_attachment = vk::AttachmentDescription::default()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let color_refs = [color_ref];
        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref);

        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            src_access_mask: vk::AccessFlags::empty(),
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dependency_flags: vk::DependencyFlags::empty(),
        };

        let attachments = [color_attachment, depth_attachment];
        let subpasses = [subpass];
        let dependencies = [dependency];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let handle = unsafe {
            self.device
                .create_render_pass(&create_info, None)
                .map_err(|e| {
                    RendererError::DeviceInitFailed(format!("Failed to create render pass: {e:?}"))
                })?
        };

        Ok(RenderPass {
            device: self.device,
            handle,
        })
    }
}
