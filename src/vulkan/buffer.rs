use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;

use crate::vulkan::allocator::Allocator;
use crate::vulkan::command::CommandPool;
use crate::Result;

/// GPU buffer with scoped ownership of its allocation.
pub struct GpuBuffer {
    allocator: Arc<Allocator>,
    buffer: vk::Buffer,
    allocation: vk_mem::Allocation,
    size: vk::DeviceSize,
}

impl GpuBuffer {
    /// Device-local buffer filled through a staging copy. Used for the
    /// vertex and index data the scene collaborator uploads.
    pub fn device_local_with_data<T: Pod>(
        device: &ash::Device,
        allocator: &Arc<Allocator>,
        command_pool: &CommandPool,
        queue: vk::Queue,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> Result<Self> {
        let size = std::mem::size_of_val(data) as vk::DeviceSize;

        unsafe {
            let staging_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(vk::BufferUsageFlags::TRANSFER_SRC)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let (staging_buffer, mut staging_allocation, mapped) =
                allocator.create_mapped_buffer(&staging_info)?;

            std::ptr::copy_nonoverlapping(
                bytemuck::cast_slice::<T, u8>(data).as_ptr(),
                mapped,
                size as usize,
            );

            let buffer_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(usage | vk::BufferUsageFlags::TRANSFER_DST)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let created =
                allocator.create_buffer(&buffer_info, vk_mem::MemoryUsage::AutoPreferDevice);
            let (buffer, allocation) = match created {
                Ok(pair) => pair,
                Err(e) => {
                    allocator.destroy_buffer(staging_buffer, &mut staging_allocation);
                    return Err(e);
                }
            };

            let copy_result = (|| -> Result<()> {
                let cmd = command_pool.begin_one_time()?;
                let region = vk::BufferCopy {
                    src_offset: 0,
                    dst_offset: 0,
                    size,
                };
                device.cmd_copy_buffer(cmd, staging_buffer, buffer, &[region]);
                command_pool.submit_one_time(cmd, queue)
            })();

            allocator.destroy_buffer(staging_buffer, &mut staging_allocation);

            match copy_result {
                Ok(()) => Ok(Self {
                    allocator: Arc::clone(allocator),
                    buffer,
                    allocation,
                    size,
                }),
                Err(e) => {
                    let mut allocation = allocation;
                    allocator.destroy_buffer(buffer, &mut allocation);
                    Err(e)
                }
            }
        }
    }

    /// Host-visible, persistently mapped buffer. Returns the mapped
    /// pointer alongside the buffer.
    pub fn host_visible(
        allocator: &Arc<Allocator>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> Result<(Self, *mut u8)> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let (buffer, allocation, mapped) =
            unsafe { allocator.create_mapped_buffer(&buffer_info)? };

        Ok((
            Self {
                allocator: Arc::clone(allocator),
                buffer,
                allocation,
                size,
            },
            mapped,
        ))
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            self.allocator
                .destroy_buffer(self.buffer, &mut self.allocation);
        }
    }
}
