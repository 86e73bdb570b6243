use ash::vk;

/// Image layout transition scoped to an explicit mip/layer range.
///
/// The subresource range must cover exactly what the next access
/// touches: a range that is too narrow is a data race, one that is too
/// coarse merely stalls. Defaults to every mip level and array layer;
/// narrow it with [`mip_levels`](Self::mip_levels) and
/// [`array_layers`](Self::array_layers).
#[derive(Clone, Copy)]
pub struct ImageBarrier {
    barrier: BarrierDesc,
}

#[derive(Clone, Copy)]
struct BarrierDesc {
    image: vk::Image,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    aspect_mask: vk::ImageAspectFlags,
    base_mip_level: u32,
    level_count: u32,
    base_array_layer: u32,
    layer_count: u32,
}

impl ImageBarrier {
    pub fn new(
        image: vk::Image,
        src_access: vk::AccessFlags,
        dst_access: vk::AccessFlags,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> Self {
        Self {
            barrier: BarrierDesc {
                image,
                src_access,
                dst_access,
                old_layout,
                new_layout,
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            },
        }
    }

    pub fn aspect_mask(mut self, aspect_mask: vk::ImageAspectFlags) -> Self {
        self.barrier.aspect_mask = aspect_mask;
        self
    }

    pub fn mip_levels(mut self, base: u32, count: u32) -> Self {
        self.barrier.base_mip_level = base;
        self.barrier.level_count = count;
        self
    }

    pub fn array_layers(mut self, base: u32, count: u32) -> Self {
        self.barrier.base_array_layer = base;
        self.barrier.layer_count = count;
        self
    }

    /// Record the barrier between `src_stage` and `dst_stage`.
    pub fn record(
        self,
        device: &ash::Device,
        command_buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
    ) {
        let desc = self.barrier;
        let barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(desc.src_access)
            .dst_access_mask(desc.dst_access)
            .old_layout(desc.old_layout)
            .new_layout(desc.new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(desc.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: desc.aspect_mask,
                base_mip_level: desc.base_mip_level,
                level_count: desc.level_count,
                base_array_layer: desc.base_array_layer,
                layer_count: desc.layer_count,
            });

        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }
}
