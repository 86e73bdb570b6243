use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::vulkan::{Allocator, GpuBuffer};
use crate::Result;

/// Per-frame matrix block. The model matrix stays identity at this
/// layer; per-object transforms belong to the draw data, not the camera
/// uniform.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraMatrices {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl Default for CameraMatrices {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        }
    }
}

impl CameraMatrices {
    pub const SIZE: vk::DeviceSize = std::mem::size_of::<CameraMatrices>() as vk::DeviceSize;
}

/// Host-visible camera uniform buffer, one per frame slot, persistently
/// mapped. Writes are only allowed after the owning slot's fence wait,
/// which keeps them out of the GPU's read window.
pub struct UniformBuffer {
    buffer: GpuBuffer,
    mapped: *mut CameraMatrices,
}

impl UniformBuffer {
    pub fn new(allocator: &Arc<Allocator>) -> Result<Self> {
        let (buffer, mapped) = GpuBuffer::host_visible(
            allocator,
            CameraMatrices::SIZE,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;

        let mut uniform = Self {
            buffer,
            mapped: mapped.cast(),
        };
        uniform.write(&CameraMatrices::default());
        Ok(uniform)
    }

    pub fn write(&mut self, matrices: &CameraMatrices) {
        unsafe {
            std::ptr::write(self.mapped, *matrices);
        }
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }
}
