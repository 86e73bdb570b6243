use std::sync::Arc;

use ash::khr::swapchain;
use ash::vk;
use log::info;

use crate::vulkan::device::VulkanDevice;
use crate::{RendererError, Result};

/// Picks the presentation extent from the surface capabilities. When the
/// surface reports a fixed extent we must use it; otherwise the desired
/// extent is clamped into the supported range. Calling this twice with
/// the same inputs yields the same extent, which is what makes swapchain
/// rebuilds idempotent.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, desired: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: desired
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: desired
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// At least one more image than the driver minimum, capped by the
/// driver maximum (0 means unbounded).
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = caps.min_image_count + 1;
    if caps.max_image_count > 0 && count > caps.max_image_count {
        count = caps.max_image_count;
    }
    count
}

fn choose_format(formats: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
        .ok_or_else(|| RendererError::DeviceInitFailed("No surface formats available".into()))
}

fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Owns the presentable images and their views. Created at startup and
/// on every resize; a stale wrapper is fully dropped (device idle) before
/// its replacement is built.
pub struct SwapchainWrapper {
    device: Arc<ash::Device>,
    loader: swapchain::Device,
    swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl SwapchainWrapper {
    pub fn new(device: &VulkanDevice, desired_extent: vk::Extent2D) -> Result<Self> {
        unsafe {
            let instance = &device.instance;
            let surface_loader = instance.surface_loader();
            let surface = instance.surface();

            let caps = surface_loader
                .get_physical_device_surface_capabilities(device.physical_device, surface)?;
            let formats = surface_loader
                .get_physical_device_surface_formats(device.physical_device, surface)?;
            let present_modes = surface_loader
                .get_physical_device_surface_present_modes(device.physical_device, surface)?;

            let surface_format = choose_format(&formats)?;
            let present_mode = choose_present_mode(&present_modes);
            let extent = choose_extent(&caps, desired_extent);
            let image_count = choose_image_count(&caps);

            let queue_families = [
                device.queue_families.graphics,
                device.queue_families.present,
            ];
            let mut create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(surface)
                .min_image_count(image_count)
                .image_format(surface_format.format)
                .image_color_space(surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .pre_transform(caps.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(present_mode)
                .clipped(true);

            create_info = if queue_families[0] != queue_families[1] {
                create_info
                    .image_sharing_mode(vk::SharingMode::CONCURRENT)
                    .queue_family_indices(&queue_families)
            } else {
                create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            };

            let loader = swapchain::Device::new(instance.instance(), &device.device);
            let handle = loader.create_swapchain(&create_info, None).map_err(|e| {
                RendererError::DeviceInitFailed(format!("Failed to create swapchain: {e:?}"))
            })?;

            let images = loader.get_swapchain_images(handle)?;

            let mut image_views = Vec::with_capacity(images.len());
            for &image in &images {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface_format.format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                image_views.push(device.device.create_image_view(&view_info, None)?);
            }

            info!(
                "Created swapchain: {}x{}, {} images, {:?}, {:?}",
                extent.width,
                extent.height,
                images.len(),
                surface_format.format,
                present_mode
            );

            Ok(Self {
                device: Arc::clone(&device.device),
                loader,
                swapchain: handle,
                images,
                image_views,
                format: surface_format.format,
                extent,
            })
        }
    }

    /// Acquire the next presentable image, signalling `semaphore` once it
    /// is usable. Returns the image index and whether the swapchain is
    /// suboptimal for the surface.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool)> {
        unsafe {
            let result = self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            );
            match result {
                Ok((index, suboptimal)) => Ok((index, suboptimal)),
                Err(e) => Err(e.into()),
            }
        }
    }

    /// Queue the image for presentation once `wait_semaphore` fires.
    /// Returns whether the swapchain is suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe {
            match self.loader.queue_present(queue, &present_info) {
                Ok(suboptimal) => Ok(suboptimal),
                Err(e) => Err(e.into()),
            }
        }
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for SwapchainWrapper {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: (u32, u32), max: (u32, u32), current: Option<(u32, u32)>) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: match current {
                Some((w, h)) => vk::Extent2D {
                    width: w,
                    height: h,
                },
                None => vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn extent_uses_fixed_surface_extent_when_reported() {
        let caps = caps((1, 1), (4096, 4096), Some((1280, 720)));
        let desired = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let extent = choose_extent(&caps, desired);
        assert_eq!((extent.width, extent.height), (1280, 720));
    }

    #[test]
    fn extent_clamps_desired_into_supported_range() {
        let caps = caps((100, 100), (1920, 1080), None);
        let extent = choose_extent(
            &caps,
            vk::Extent2D {
                width: 4000,
                height: 50,
            },
        );
        assert_eq!((extent.width, extent.height), (1920, 100));
    }

    #[test]
    fn extent_selection_is_idempotent_without_resize() {
        let caps = caps((1, 1), (4096, 4096), None);
        let desired = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let first = choose_extent(&caps, desired);
        let second = choose_extent(&caps, first);
        assert_eq!((first.width, first.height), (second.width, second.height));
    }

    #[test]
    fn image_count_exceeds_driver_minimum() {
        let caps = caps((1, 1), (4096, 4096), None);
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn image_count_respects_driver_maximum() {
        let mut caps = caps((1, 1), (4096, 4096), None);
        caps.min_image_count = 3;
        caps.max_image_count = 3;
        assert_eq!(choose_image_count(&caps), 3);
    }
}
