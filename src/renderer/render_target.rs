use std::sync::Arc;

use ash::vk;
use log::info;

use crate::renderer::depth_buffer::DepthBuffer;
use crate::vulkan::{Allocator, Framebuffer, RenderPass, SwapchainWrapper, VulkanDevice};
use crate::{RendererError, Result};

/// The render pass and its attachments: one framebuffer per swapchain
/// image, all sharing a single depth view. The render pass itself is
/// created once; depth image and framebuffers follow the swapchain
/// through every rebuild.
pub struct RenderTargetSet {
    render_pass: RenderPass,
    depth: Option<DepthBuffer>,
    framebuffers: Vec<Framebuffer>,
    extent: vk::Extent2D,
}

impl RenderTargetSet {
    pub fn new(
        device: &VulkanDevice,
        allocator: &Arc<Allocator>,
        swapchain: &SwapchainWrapper,
    ) -> Result<Self> {
        let depth_format = device.find_depth_format()?;
        let render_pass = RenderPass::builder(Arc::clone(&device.device))
            .with_swapchain_color(swapchain.format)
            .with_depth_attachment(depth_format)
            .build()?;

        let mut targets = Self {
            render_pass,
            depth: None,
            framebuffers: Vec::new(),
            extent: vk::Extent2D::default(),
        };
        targets.rebuild(device, allocator, swapchain)?;
        Ok(targets)
    }

    /// Tear down everything that references swapchain image views. Must
    /// run before the swapchain itself is destroyed; the caller idles
    /// the device first.
    pub fn release_swapchain_dependents(&mut self) {
        self.framebuffers.clear();
        self.depth = None;
    }

    /// Recreate the depth buffer and framebuffers against a (new)
    /// swapchain. Invoking this twice for the same swapchain produces
    /// attachments of the same extent both times.
    pub fn rebuild(
        &mut self,
        device: &VulkanDevice,
        allocator: &Arc<Allocator>,
        swapchain: &SwapchainWrapper,
    ) -> Result<()> {
        self.release_swapchain_dependents();

        let depth = DepthBuffer::new(device, allocator, swapchain.extent)?;

        let mut framebuffers = Vec::with_capacity(swapchain.image_views.len());
        for &image_view in &swapchain.image_views {
            let attachments = [image_view, depth.view()];
            framebuffers.push(Framebuffer::new(
                Arc::clone(&device.device),
                self.render_pass.handle(),
                &attachments,
                swapchain.extent,
            )?);
        }

        info!(
            "Built {} framebuffers at {}x{}",
            framebuffers.len(),
            swapchain.extent.width,
            swapchain.extent.height
        );

        self.depth = Some(depth);
        self.framebuffers = framebuffers;
        self.extent = swapchain.extent;
        Ok(())
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    pub fn framebuffer(&self, image_index: usize) -> Result<vk::Framebuffer> {
        self.framebuffers
            .get(image_index)
            .map(|fb| fb.handle())
            .ok_or_else(|| {
                RendererError::VulkanError(format!("Framebuffer index {image_index} out of range"))
            })
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}
