use std::sync::Arc;

use ash::vk;

use crate::{RendererError, Result};

/// Descriptor pool capacity required by one frame slot of a loaded
/// scene: five image samplers per material plus two for the skybox and
/// environment stages, and one uniform buffer per mesh plus fixed
/// overhead for the camera/skybox/global bindings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSizes {
    pub combined_image_samplers: u32,
    pub uniform_buffers: u32,
    pub max_sets: u32,
}

/// Pool sizing for a scene with `material_count` materials and
/// `mesh_count` meshes carrying geometry. Under-provisioning makes set
/// allocation fail, which is fatal at setup time.
pub fn scene_pool_sizes(material_count: u32, mesh_count: u32) -> PoolSizes {
    PoolSizes {
        combined_image_samplers: 5 * material_count + 2,
        uniform_buffers: 4 + mesh_count,
        max_sets: 2 + material_count + mesh_count,
    }
}

impl PoolSizes {
    pub fn scaled(self, slots: u32) -> PoolSizes {
        PoolSizes {
            combined_image_samplers: self.combined_image_samplers * slots,
            uniform_buffers: self.uniform_buffers * slots,
            max_sets: self.max_sets * slots,
        }
    }
}

/// RAII descriptor set layout built binding-by-binding.
pub struct DescriptorSetLayout {
    device: Arc<ash::Device>,
    handle: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.handle, None);
        }
    }
}

#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<(u32, vk::DescriptorType, vk::ShaderStageFlags, u32)>,
}

impl DescriptorSetLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        count: u32,
    ) -> Self {
        self.bindings
            .push((binding, descriptor_type, stage_flags, count));
        self
    }

    pub fn build(self, device: Arc<ash::Device>) -> Result<DescriptorSetLayout> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = self
            .bindings
            .iter()
            .map(|&(binding, descriptor_type, stage_flags, count)| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding)
                    .descriptor_type(descriptor_type)
                    .descriptor_count(count)
                    .stage_flags(stage_flags)
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        let handle = unsafe {
            device
                .create_descriptor_set_layout(&create_info, None)
                .map_err(|e| {
                    RendererError::DeviceInitFailed(format!(
                        "Failed to create descriptor set layout: {e:?}"
                    ))
                })?
        };

        Ok(DescriptorSetLayout { device, handle })
    }
}

/// Fixed-capacity descriptor pool. Sets allocated from it live until the
/// pool is dropped; there is no per-set free path because all sets are
/// written once at setup.
pub struct DescriptorPool {
    device: Arc<ash::Device>,
    handle: vk::DescriptorPool,
}

impl DescriptorPool {
    pub fn new(device: Arc<ash::Device>, sizes: PoolSizes) -> Result<Self> {
        Self::with_sizes(
            device,
            &[
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    descriptor_count: sizes.combined_image_samplers,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: sizes.uniform_buffers,
                },
            ],
            sizes.max_sets,
        )
    }

    pub fn with_sizes(
        device: Arc<ash::Device>,
        sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
    ) -> Result<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(sizes)
            .max_sets(max_sets);

        let handle = unsafe {
            device
                .create_descriptor_pool(&create_info, None)
                .map_err(|e| {
                    RendererError::DeviceInitFailed(format!(
                        "Failed to create descriptor pool: {e:?}"
                    ))
                })?
        };

        Ok(Self { device, handle })
    }

    pub fn allocate(&self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.handle)
            .set_layouts(&layouts);

        let sets = unsafe {
            self.device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(|e| {
                    RendererError::DeviceInitFailed(format!(
                        "Failed to allocate descriptor set (pool under-provisioned?): {e:?}"
                    ))
                })?
        };
        Ok(sets[0])
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.handle, None);
        }
    }
}

/// Point a uniform-buffer binding of `set` at `buffer`.
pub fn write_uniform_buffer(
    device: &ash::Device,
    set: vk::DescriptorSet,
    binding: u32,
    buffer: vk::Buffer,
    range: vk::DeviceSize,
) {
    let buffer_info = vk::DescriptorBufferInfo {
        buffer,
        offset: 0,
        range,
    };
    let buffer_infos = [buffer_info];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .buffer_info(&buffer_infos);

    unsafe {
        device.update_descriptor_sets(&[write], &[]);
    }
}

/// Point an image binding of `set` at a sampled image.
pub fn write_combined_image(
    device: &ash::Device,
    set: vk::DescriptorSet,
    binding: u32,
    image_info: vk::DescriptorImageInfo,
) {
    let image_infos = [image_info];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(&image_infos);

    unsafe {
        device.update_descriptor_sets(&[write], &[]);
    }
}

/// Point a storage-image binding of `set` at an image in general layout.
pub fn write_storage_image(
    device: &ash::Device,
    set: vk::DescriptorSet,
    binding: u32,
    view: vk::ImageView,
) {
    let image_info = vk::DescriptorImageInfo {
        sampler: vk::Sampler::null(),
        image_view: view,
        image_layout: vk::ImageLayout::GENERAL,
    };
    let image_infos = [image_info];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
        .image_info(&image_infos);

    unsafe {
        device.update_descriptor_sets(&[write], &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_sizes_follow_scene_counts() {
        for materials in [0u32, 1, 10, 100] {
            for meshes in [0u32, 1, 7, 42] {
                let sizes = scene_pool_sizes(materials, meshes);
                assert_eq!(sizes.combined_image_samplers, 5 * materials + 2);
                assert_eq!(sizes.uniform_buffers, 4 + meshes);
                assert_eq!(sizes.max_sets, 2 + materials + meshes);
            }
        }
    }

    #[test]
    fn pool_sizes_cover_per_material_demand() {
        // Each material set consumes 5 samplers and 1 uniform buffer;
        // the skybox set consumes 1 sampler and 1 uniform buffer.
        for materials in [0u32, 1, 10, 100] {
            let sizes = scene_pool_sizes(materials, materials);
            assert!(sizes.combined_image_samplers >= 5 * materials + 1);
            assert!(sizes.uniform_buffers >= materials + 1);
            assert!(sizes.max_sets >= materials + 1);
        }
    }

    #[test]
    fn scaling_multiplies_every_capacity() {
        let sizes = scene_pool_sizes(3, 2).scaled(2);
        assert_eq!(sizes.combined_image_samplers, 2 * (5 * 3 + 2));
        assert_eq!(sizes.uniform_buffers, 2 * (4 + 2));
        assert_eq!(sizes.max_sets, 2 * (2 + 3 + 2));
    }
}
