use std::sync::Arc;

use ash::vk;

use crate::{RendererError, Result};

/// One framebuffer per swapchain image, combining that image's view
/// with the shared depth view.
pub struct Framebuffer {
    device: Arc<ash::Device>,
    handle: vk::Framebuffer,
}

impl Framebuffer {
    pub fn new(
        device: Arc<ash::Device>,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let handle = unsafe {
            device.create_framebuffer(&create_info, None).map_err(|e| {
                RendererError::VulkanError(format!("Failed to create framebuffer: {e:?}"))
            })?
        };

        Ok(Self { device, handle })
    }

    pub fn handle(&self) -> vk::Framebuffer {
        self.handle
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.handle, None);
        }
    }
}
