use ash::vk;

use crate::renderer::scene::PrimitiveDraw;
use crate::Result;

/// Context handed to each draw pass while the render pass is open.
pub struct RecordContext<'a> {
    pub device: &'a ash::Device,
    pub command_buffer: vk::CommandBuffer,
    /// Frame slot currently being recorded; selects the per-slot
    /// descriptor sets.
    pub frame_index: usize,
}

/// One self-contained unit of the frame: a pipeline, its resource
/// bindings, and the draws it issues. The recorder runs an ordered list
/// of these, so adding or reordering passes never touches its control
/// flow.
pub trait DrawPass {
    fn record(&self, ctx: &RecordContext<'_>) -> Result<()>;
}

/// Fullscreen sky drawn first, before the PBR geometry.
pub struct SkyboxPass {
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    /// One descriptor set per frame slot (camera UBO + environment cube).
    pub descriptor_sets: Vec<vk::DescriptorSet>,
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub index_count: u32,
}

impl DrawPass for SkyboxPass {
    fn record(&self, ctx: &RecordContext<'_>) -> Result<()> {
        let cmd = ctx.command_buffer;
        unsafe {
            ctx.device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
            ctx.device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[self.descriptor_sets[ctx.frame_index]],
                &[],
            );
            ctx.device
                .cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer], &[0]);
            ctx.device
                .cmd_bind_index_buffer(cmd, self.index_buffer, 0, vk::IndexType::UINT32);
            ctx.device.cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
        }
        Ok(())
    }
}

/// The PBR geometry pass. Draws were flattened from the scene graph up
/// front (node before children, children in list order), so recording is
/// a straight loop binding each primitive's material set.
pub struct ScenePass {
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    /// Descriptor sets indexed `[frame slot][material]`.
    pub material_sets: Vec<Vec<vk::DescriptorSet>>,
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub draws: Vec<PrimitiveDraw>,
}

impl DrawPass for ScenePass {
    fn record(&self, ctx: &RecordContext<'_>) -> Result<()> {
        let cmd = ctx.command_buffer;
        let sets = &self.material_sets[ctx.frame_index];

        unsafe {
            ctx.device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
            ctx.device
                .cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer], &[0]);
            ctx.device
                .cmd_bind_index_buffer(cmd, self.index_buffer, 0, vk::IndexType::UINT32);

            for draw in &self.draws {
                ctx.device.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.pipeline_layout,
                    0,
                    &[sets[draw.material_index]],
                    &[],
                );
                ctx.device
                    .cmd_draw_indexed(cmd, draw.index_count, 1, draw.first_index, 0, 0);
            }
        }
        Ok(())
    }
}
