use ash::vk;
use vk_mem::Alloc;

use crate::vulkan::device::VulkanDevice;
use crate::{RendererError, Result};

/// Thin wrapper over the VMA allocator. Owners of allocations keep an
/// `Arc<Allocator>` so the allocator itself cannot be dropped while any
/// buffer or image is alive.
pub struct Allocator {
    inner: vk_mem::Allocator,
}

impl Allocator {
    pub fn new(device: &VulkanDevice) -> Result<Self> {
        let create_info = vk_mem::AllocatorCreateInfo::new(
            device.instance.instance(),
            &device.device,
            device.physical_device,
        );

        let inner = unsafe { vk_mem::Allocator::new(create_info) }.map_err(|e| {
            RendererError::DeviceInitFailed(format!("Failed to create allocator: {e:?}"))
        })?;

        Ok(Self { inner })
    }

    /// Device-local image allocation.
    pub unsafe fn create_image(
        &self,
        info: &vk::ImageCreateInfo,
        usage: vk_mem::MemoryUsage,
    ) -> Result<(vk::Image, vk_mem::Allocation)> {
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage,
            ..Default::default()
        };
        let (image, allocation) = self
            .inner
            .create_image(info, &alloc_info)
            .map_err(|e| RendererError::VulkanError(format!("Failed to create image: {e:?}")))?;
        Ok((image, allocation))
    }

    pub unsafe fn destroy_image(&self, image: vk::Image, allocation: &mut vk_mem::Allocation) {
        self.inner.destroy_image(image, allocation);
    }

    /// Device-local buffer allocation.
    pub unsafe fn create_buffer(
        &self,
        info: &vk::BufferCreateInfo,
        usage: vk_mem::MemoryUsage,
    ) -> Result<(vk::Buffer, vk_mem::Allocation)> {
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage,
            ..Default::default()
        };
        let (buffer, allocation) = self
            .inner
            .create_buffer(info, &alloc_info)
            .map_err(|e| RendererError::VulkanError(format!("Failed to create buffer: {e:?}")))?;
        Ok((buffer, allocation))
    }

    /// Host-visible buffer, persistently mapped for its whole lifetime.
    /// Returns the mapped pointer alongside the handles.
    pub unsafe fn create_mapped_buffer(
        &self,
        info: &vk::BufferCreateInfo,
    ) -> Result<(vk::Buffer, vk_mem::Allocation, *mut u8)> {
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::Auto,
            flags: vk_mem::AllocationCreateFlags::MAPPED
                | vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
            ..Default::default()
        };
        let (buffer, allocation) = self
            .inner
            .create_buffer(info, &alloc_info)
            .map_err(|e| {
                RendererError::VulkanError(format!("Failed to create mapped buffer: {e:?}"))
            })?;

        let mapped = self.inner.get_allocation_info(&allocation).mapped_data;
        if mapped.is_null() {
            return Err(RendererError::VulkanError(
                "Mapped buffer allocation returned a null mapping".into(),
            ));
        }

        Ok((buffer, allocation, mapped.cast()))
    }

    pub unsafe fn destroy_buffer(&self, buffer: vk::Buffer, allocation: &mut vk_mem::Allocation) {
        self.inner.destroy_buffer(buffer, allocation);
    }
}
