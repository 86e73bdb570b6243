use std::sync::Arc;

use ash::vk;

use crate::{RendererError, Result};

/// Command pool for the graphics queue family. Outlives every command
/// buffer allocated from it; per-frame buffers are individually
/// resettable.
pub struct CommandPool {
    device: Arc<ash::Device>,
    pool: vk::CommandPool,
}

impl CommandPool {
    pub fn new(device: Arc<ash::Device>, queue_family: u32) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family);

        let pool = unsafe {
            device.create_command_pool(&create_info, None).map_err(|e| {
                RendererError::DeviceInitFailed(format!("Failed to create command pool: {e:?}"))
            })?
        };

        Ok(Self { device, pool })
    }

    pub fn allocate_primary(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| {
                    RendererError::VulkanError(format!("Failed to allocate command buffers: {e:?}"))
                })
        }
    }

    /// Begin a throwaway command buffer for a one-time transfer or
    /// transition batch.
    pub fn begin_one_time(&self) -> Result<vk::CommandBuffer> {
        let buffer = self.allocate_primary(1)?[0];

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device.begin_command_buffer(buffer, &begin_info)?;
        }
        Ok(buffer)
    }

    /// End, submit, and wait out a one-time command buffer, then free it.
    pub fn submit_one_time(&self, buffer: vk::CommandBuffer, queue: vk::Queue) -> Result<()> {
        unsafe {
            self.device.end_command_buffer(buffer)?;

            let buffers = [buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&buffers);
            let result = self
                .device
                .queue_submit(queue, &[submit_info], vk::Fence::null())
                .and_then(|_| self.device.queue_wait_idle(queue));

            self.device.free_command_buffers(self.pool, &buffers);
            result?;
        }
        Ok(())
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
