use std::sync::Arc;

use ash::vk;
use log::info;

use crate::config::{EnvironmentConfig, ShaderPaths, ENV_WORKGROUP_SIZE};
use crate::renderer::texture::{mip_extent, mip_level_count, Texture, TextureSpec};
use crate::vulkan::{
    descriptor, Allocator, CommandPool, ComputePipeline, DescriptorPool, DescriptorSetLayoutBuilder,
    ImageBarrier, PipelineLayout, VulkanDevice,
};
use crate::Result;

/// Number of blit iterations needed to fill a full mip chain: one per
/// level below the base.
pub fn blit_iterations(mip_levels: u32) -> u32 {
    mip_levels.saturating_sub(1)
}

/// The prefiltered environment cubemap, produced once at setup and
/// read-only afterwards.
pub struct EnvironmentMap {
    pub cubemap: Texture,
}

impl EnvironmentMap {
    /// One-time conversion of an equirectangular HDR image into a
    /// mip-mapped cubemap.
    ///
    /// The pipeline is: load the HDR source as a sampled texture, run the
    /// equirect-to-cube compute shader into mip 0 of the cubemap, then
    /// fill the mip chain by blitting each level from the one above it.
    /// Every layout transition is scoped to exactly the mip/layer range
    /// the next access touches. The compute pipeline and its descriptor
    /// machinery are torn down before this function returns.
    pub fn prefilter_from_equirect(
        device: &VulkanDevice,
        allocator: &Arc<Allocator>,
        command_pool: &CommandPool,
        shaders: &ShaderPaths,
        config: &EnvironmentConfig,
    ) -> Result<Self> {
        config.validate()?;
        let size = config.face_size;
        let levels = mip_level_count(size);

        let equirect = Texture::from_file(
            device,
            allocator,
            command_pool,
            &config.hdr_path,
            vk::Format::R32G32B32A32_SFLOAT,
        )?;

        let mut cubemap = Texture::from_spec(
            device,
            allocator,
            TextureSpec {
                width: size,
                height: size,
                layers: 6,
                format: vk::Format::R16G16B16A16_SFLOAT,
                mip_levels: 0,
                usage: vk::ImageUsageFlags::STORAGE
                    | vk::ImageUsageFlags::SAMPLED
                    | vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST,
            },
        )?;

        // The dispatch writes through a mip-0-only 2D-array view; the
        // texture's own cube view spans the whole mip chain.
        let storage_view = cubemap.storage_view(0)?;

        let set_layout = DescriptorSetLayoutBuilder::new()
            .add_binding(
                0,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::COMPUTE,
                1,
            )
            .add_binding(
                1,
                vk::DescriptorType::STORAGE_IMAGE,
                vk::ShaderStageFlags::COMPUTE,
                1,
            )
            .build(Arc::clone(&device.device))?;

        let pool = DescriptorPool::with_sizes(
            Arc::clone(&device.device),
            &[
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    descriptor_count: 1,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::STORAGE_IMAGE,
                    descriptor_count: 1,
                },
            ],
            1,
        )?;
        let descriptor_set = pool.allocate(set_layout.handle())?;

        descriptor::write_combined_image(&device.device, descriptor_set, 0, equirect.descriptor());
        descriptor::write_storage_image(&device.device, descriptor_set, 1, storage_view.handle());

        let pipeline_layout = PipelineLayout::builder(Arc::clone(&device.device))
            .add_set_layout(set_layout.handle())
            .build()?;
        let pipeline = ComputePipeline::new(
            Arc::clone(&device.device),
            pipeline_layout.handle(),
            &shaders.equirect_to_cube,
        )?;

        let cmd = command_pool.begin_one_time()?;
        let dev = &device.device;

        // Mip 0 of all six faces becomes writable storage.
        ImageBarrier::new(
            cubemap.image(),
            vk::AccessFlags::empty(),
            vk::AccessFlags::SHADER_WRITE,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::GENERAL,
        )
        .mip_levels(0, 1)
        .array_layers(0, 6)
        .record(
            dev,
            cmd,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::COMPUTE_SHADER,
        );

        unsafe {
            dev.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, pipeline.handle());
            dev.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::COMPUTE,
                pipeline_layout.handle(),
                0,
                &[descriptor_set],
                &[],
            );
            dev.cmd_dispatch(cmd, size / ENV_WORKGROUP_SIZE, size / ENV_WORKGROUP_SIZE, 6);
        }

        // The compute result becomes the blit source for the mip chain.
        ImageBarrier::new(
            cubemap.image(),
            vk::AccessFlags::SHADER_WRITE,
            vk::AccessFlags::TRANSFER_READ,
            vk::ImageLayout::GENERAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        )
        .mip_levels(0, 1)
        .array_layers(0, 6)
        .record(
            dev,
            cmd,
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::PipelineStageFlags::TRANSFER,
        );

        for level in 1..levels {
            let src_extent = mip_extent(size, level - 1) as i32;
            let dst_extent = mip_extent(size, level) as i32;

            ImageBarrier::new(
                cubemap.image(),
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            )
            .mip_levels(level, 1)
            .array_layers(0, 6)
            .record(
                dev,
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::TRANSFER,
            );

            let region = vk::ImageBlit {
                src_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: level - 1,
                    base_array_layer: 0,
                    layer_count: 6,
                },
                src_offsets: [
                    vk::Offset3D::default(),
                    vk::Offset3D {
                        x: src_extent,
                        y: src_extent,
                        z: 1,
                    },
                ],
                dst_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: level,
                    base_array_layer: 0,
                    layer_count: 6,
                },
                dst_offsets: [
                    vk::Offset3D::default(),
                    vk::Offset3D {
                        x: dst_extent,
                        y: dst_extent,
                        z: 1,
                    },
                ],
            };

            unsafe {
                dev.cmd_blit_image(
                    cmd,
                    cubemap.image(),
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    cubemap.image(),
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                    vk::Filter::LINEAR,
                );
            }

            // This level feeds the next iteration's blit.
            ImageBarrier::new(
                cubemap.image(),
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::TRANSFER_READ,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            )
            .mip_levels(level, 1)
            .array_layers(0, 6)
            .record(
                dev,
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::TRANSFER,
            );
        }

        // Whole chain becomes sampleable.
        ImageBarrier::new(
            cubemap.image(),
            vk::AccessFlags::TRANSFER_READ,
            vk::AccessFlags::SHADER_READ,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .mip_levels(0, levels)
        .array_layers(0, 6)
        .record(
            dev,
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        );

        command_pool.submit_one_time(cmd, device.graphics_queue)?;
        cubemap.layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;

        info!(
            "Prefiltered environment cubemap: {size}x{size}, {levels} mip levels ({} blits)",
            blit_iterations(levels)
        );

        Ok(Self { cubemap })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::texture::{mip_extent, mip_level_count};

    #[test]
    fn blit_loop_runs_once_per_level_below_base() {
        assert_eq!(blit_iterations(mip_level_count(1024)), 10);
        assert_eq!(blit_iterations(mip_level_count(32)), 5);
        assert_eq!(blit_iterations(1), 0);
    }

    #[test]
    fn mip_chain_extents_halve_to_one_texel() {
        let size = 1024;
        let levels = mip_level_count(size);
        for level in 0..levels {
            assert_eq!(mip_extent(size, level), size / (1 << level));
        }
        assert_eq!(mip_extent(size, levels - 1), 1);
    }
}
