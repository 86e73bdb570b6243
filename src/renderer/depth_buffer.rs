use std::sync::Arc;

use ash::vk;

use crate::vulkan::{Allocator, VulkanDevice};
use crate::Result;

/// The depth attachment shared by every framebuffer. Only one frame
/// renders to it at a time and it is fully cleared each frame, so a
/// single image is enough. Rebuilt together with the swapchain.
pub struct DepthBuffer {
    device: Arc<ash::Device>,
    allocator: Arc<Allocator>,
    image: vk::Image,
    allocation: vk_mem::Allocation,
    view: vk::ImageView,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl DepthBuffer {
    pub fn new(
        device: &VulkanDevice,
        allocator: &Arc<Allocator>,
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let format = device.find_depth_format()?;

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        unsafe {
            let (image, mut allocation) =
                allocator.create_image(&image_info, vk_mem::MemoryUsage::AutoPreferDevice)?;

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::DEPTH,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = match device.device.create_image_view(&view_info, None) {
                Ok(view) => view,
                Err(e) => {
                    allocator.destroy_image(image, &mut allocation);
                    return Err(e.into());
                }
            };

            Ok(Self {
                device: Arc::clone(&device.device),
                allocator: Arc::clone(allocator),
                image,
                allocation,
                view,
                format,
                extent,
            })
        }
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.allocator
                .destroy_image(self.image, &mut self.allocation);
        }
    }
}
