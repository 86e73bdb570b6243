use std::sync::Arc;

use ash::vk;
use glam::Mat4;
use log::{debug, info};

use crate::config::RendererConfig;
use crate::renderer::draw_pass::{DrawPass, RecordContext, ScenePass, SkyboxPass};
use crate::renderer::environment::EnvironmentMap;
use crate::renderer::frame::FrameSlots;
use crate::renderer::render_target::RenderTargetSet;
use crate::renderer::scene::{Scene, Vertex};
use crate::renderer::uniform::CameraMatrices;
use crate::vulkan::{
    descriptor, scene_pool_sizes, Allocator, CommandPool, DescriptorPool, DescriptorSetLayout,
    DescriptorSetLayoutBuilder, GpuBuffer, Pipeline, PipelineLayout, SurfaceProvider,
    SwapchainWrapper, VulkanDevice, VulkanInstance,
};
use crate::{RendererError, Result};

/// A zero-sized framebuffer (minimized window) cannot back a swapchain;
/// the rebuild stays deferred and frames are skipped until a usable
/// extent arrives.
pub fn rebuild_blocked(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

/// Cube drawn by the skybox pass.
struct SkyboxMesh {
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    index_count: u32,
}

impl SkyboxMesh {
    fn unit_cube(
        device: &VulkanDevice,
        allocator: &Arc<Allocator>,
        command_pool: &CommandPool,
    ) -> Result<Self> {
        let corners = [
            [-1.0f32, -1.0, -1.0],
            [1.0, -1.0, -1.0],
            [1.0, 1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [1.0, -1.0, 1.0],
            [1.0, 1.0, 1.0],
            [-1.0, 1.0, 1.0],
        ];
        let vertices: Vec<Vertex> = corners
            .iter()
            .map(|&position| Vertex {
                position,
                ..Vertex::default()
            })
            .collect();

        #[rustfmt::skip]
        let indices: [u32; 36] = [
            0, 1, 2, 2, 3, 0, // -Z
            5, 4, 7, 7, 6, 5, // +Z
            4, 0, 3, 3, 7, 4, // -X
            1, 5, 6, 6, 2, 1, // +X
            4, 5, 1, 1, 0, 4, // -Y
            3, 2, 6, 6, 7, 3, // +Y
        ];

        let vertex_buffer = GpuBuffer::device_local_with_data(
            &device.device,
            allocator,
            command_pool,
            device.graphics_queue,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            &vertices,
        )?;
        let index_buffer = GpuBuffer::device_local_with_data(
            &device.device,
            allocator,
            command_pool,
            device.graphics_queue,
            vk::BufferUsageFlags::INDEX_BUFFER,
            &indices,
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }
}

/// The renderer: device setup, swapchain and frame pacing, the two-pass
/// draw loop, and the one-time environment prefilter.
///
/// Field order is drop order: draw passes and scene resources go first,
/// the allocator after everything allocated from it, the device last.
pub struct Renderer {
    draw_passes: Vec<Box<dyn DrawPass>>,
    scene: Option<Scene>,
    skybox_mesh: Option<SkyboxMesh>,
    descriptor_pool: Option<DescriptorPool>,
    scene_pipeline: Pipeline,
    skybox_pipeline: Pipeline,
    scene_pipeline_layout: PipelineLayout,
    skybox_pipeline_layout: PipelineLayout,
    scene_set_layout: DescriptorSetLayout,
    skybox_set_layout: DescriptorSetLayout,
    environment: EnvironmentMap,
    frames: FrameSlots,
    targets: RenderTargetSet,
    swapchain: Option<SwapchainWrapper>,
    command_pool: CommandPool,
    allocator: Arc<Allocator>,
    device: VulkanDevice,
    resize_pending: bool,
    pending_extent: vk::Extent2D,
}

impl Renderer {
    pub fn new<S: SurfaceProvider>(provider: &S, config: RendererConfig) -> Result<Self> {
        config.validate()?;
        info!("Initializing PBR renderer...");

        let instance = Arc::new(VulkanInstance::new(provider, &config)?);
        let device = VulkanDevice::new(instance, &config)?;
        let allocator = Arc::new(Allocator::new(&device)?);
        let command_pool = CommandPool::new(
            Arc::clone(&device.device),
            device.queue_families.graphics,
        )?;

        let swapchain = SwapchainWrapper::new(&device, provider.extent())?;
        let targets = RenderTargetSet::new(&device, &allocator, &swapchain)?;
        let frames = FrameSlots::new(&device, &allocator, &command_pool, config.frames_in_flight)?;

        let scene_set_layout = DescriptorSetLayoutBuilder::new()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .add_binding(
                1,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .add_binding(
                2,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .add_binding(
                3,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .add_binding(
                4,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .add_binding(
                5,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .build(Arc::clone(&device.device))?;

        let skybox_set_layout = DescriptorSetLayoutBuilder::new()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX,
                1,
            )
            .add_binding(
                1,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .build(Arc::clone(&device.device))?;

        let scene_pipeline_layout = PipelineLayout::builder(Arc::clone(&device.device))
            .add_set_layout(scene_set_layout.handle())
            .build()?;
        let skybox_pipeline_layout = PipelineLayout::builder(Arc::clone(&device.device))
            .add_set_layout(skybox_set_layout.handle())
            .build()?;

        let scene_pipeline = Pipeline::builder(Arc::clone(&device.device))
            .with_layout(scene_pipeline_layout.handle())
            .with_render_pass(targets.render_pass())
            .with_vertex_input(Vertex::scene_input())
            .with_cull_mode(vk::CullModeFlags::BACK)
            .with_depth(true, true)
            .add_shader(&config.shaders.scene_vertex, vk::ShaderStageFlags::VERTEX)
            .add_shader(&config.shaders.scene_fragment, vk::ShaderStageFlags::FRAGMENT)
            .build()?;

        // The sky is drawn first and must neither write nor test depth;
        // the cube is seen from the inside, so no face culling either.
        let skybox_pipeline = Pipeline::builder(Arc::clone(&device.device))
            .with_layout(skybox_pipeline_layout.handle())
            .with_render_pass(targets.render_pass())
            .with_vertex_input(Vertex::skybox_input())
            .with_cull_mode(vk::CullModeFlags::NONE)
            .with_depth(false, false)
            .add_shader(&config.shaders.skybox_vertex, vk::ShaderStageFlags::VERTEX)
            .add_shader(&config.shaders.skybox_fragment, vk::ShaderStageFlags::FRAGMENT)
            .build()?;

        let environment = EnvironmentMap::prefilter_from_equirect(
            &device,
            &allocator,
            &command_pool,
            &config.shaders,
            &config.environment,
        )?;

        let pending_extent = swapchain.extent;

        info!("PBR renderer initialized");

        Ok(Self {
            draw_passes: Vec::new(),
            scene: None,
            skybox_mesh: None,
            descriptor_pool: None,
            scene_pipeline,
            skybox_pipeline,
            scene_pipeline_layout,
            skybox_pipeline_layout,
            scene_set_layout,
            skybox_set_layout,
            environment,
            frames,
            targets,
            swapchain: Some(swapchain),
            command_pool,
            allocator,
            device,
            resize_pending: false,
            pending_extent,
        })
    }

    /// GPU context for the scene and texture collaborators.
    pub fn device(&self) -> &VulkanDevice {
        &self.device
    }

    pub fn allocator(&self) -> &Arc<Allocator> {
        &self.allocator
    }

    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.targets.extent()
    }

    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.targets.extent();
        extent.width as f32 / extent.height.max(1) as f32
    }

    /// Install the loaded scene: size the descriptor pool from the
    /// actual material and mesh counts, write one set per material per
    /// frame slot, and build the ordered draw pass list (skybox first,
    /// then the PBR scene).
    pub fn install_scene(&mut self, scene: Scene) -> Result<()> {
        // The old pass list may still be referenced by submitted work.
        self.frames.wait_all()?;
        self.draw_passes.clear();

        let material_count = scene.materials.len() as u32;
        let mesh_count = scene.mesh_node_count();
        let slots = self.frames.len() as u32;
        let sizes = scene_pool_sizes(material_count, mesh_count).scaled(slots);
        let pool = DescriptorPool::new(Arc::clone(&self.device.device), sizes)?;

        let draws = scene.flatten_draws()?;

        if self.skybox_mesh.is_none() {
            self.skybox_mesh = Some(SkyboxMesh::unit_cube(
                &self.device,
                &self.allocator,
                &self.command_pool,
            )?);
        }

        let dev = &self.device.device;
        let mut skybox_sets = Vec::with_capacity(self.frames.len());
        let mut material_sets = Vec::with_capacity(self.frames.len());

        for slot in 0..self.frames.len() {
            let ubo = self.frames.get(slot).uniform.handle();

            let skybox_set = pool.allocate(self.skybox_set_layout.handle())?;
            descriptor::write_uniform_buffer(dev, skybox_set, 0, ubo, CameraMatrices::SIZE);
            descriptor::write_combined_image(
                dev,
                skybox_set,
                1,
                self.environment.cubemap.descriptor(),
            );
            skybox_sets.push(skybox_set);

            let mut sets = Vec::with_capacity(scene.materials.len());
            for material in &scene.materials {
                let set = pool.allocate(self.scene_set_layout.handle())?;
                descriptor::write_uniform_buffer(dev, set, 0, ubo, CameraMatrices::SIZE);
                for (index, image_info) in material.texture_descriptors().into_iter().enumerate() {
                    descriptor::write_combined_image(dev, set, 1 + index as u32, image_info);
                }
                sets.push(set);
            }
            material_sets.push(sets);
        }

        let skybox_mesh = self
            .skybox_mesh
            .as_ref()
            .ok_or_else(|| RendererError::VulkanError("Skybox mesh missing".into()))?;

        self.draw_passes.push(Box::new(SkyboxPass {
            pipeline: self.skybox_pipeline.handle(),
            pipeline_layout: self.skybox_pipeline_layout.handle(),
            descriptor_sets: skybox_sets,
            vertex_buffer: skybox_mesh.vertex_buffer.handle(),
            index_buffer: skybox_mesh.index_buffer.handle(),
            index_count: skybox_mesh.index_count,
        }));
        self.draw_passes.push(Box::new(ScenePass {
            pipeline: self.scene_pipeline.handle(),
            pipeline_layout: self.scene_pipeline_layout.handle(),
            material_sets,
            vertex_buffer: scene.vertex_buffer.handle(),
            index_buffer: scene.index_buffer.handle(),
            draws,
        }));

        info!(
            "Scene installed: {material_count} materials, {mesh_count} meshes with geometry"
        );

        self.descriptor_pool = Some(pool);
        self.scene = Some(scene);
        Ok(())
    }

    /// Resize notification from the windowing collaborator. The rebuild
    /// itself happens lazily at the top of the next frame.
    pub fn notify_resize(&mut self, width: u32, height: u32) {
        self.pending_extent = vk::Extent2D { width, height };
        self.resize_pending = true;
    }

    /// Execute one frame attempt. Recoverable swapchain conditions skip
    /// the frame; any other failure is terminal. The frame slot rotates
    /// on every outcome so the round-robin never sticks.
    pub fn draw_frame(&mut self, view: Mat4, proj: Mat4) -> Result<()> {
        let result = self.draw_frame_inner(view, proj);
        self.frames.advance();
        result
    }

    fn draw_frame_inner(&mut self, view: Mat4, proj: Mat4) -> Result<()> {
        let frame_index = self.frames.current_index();

        // 1. Bound CPU run-ahead: the slot's previous submission must
        //    have retired before any of its resources are reused.
        self.frames.current().sync.wait()?;

        // 2. A flagged resize rebuilds swapchain-dependent state and
        //    skips this frame; acquiring against a stale swapchain would
        //    be wasted work.
        if self.resize_pending {
            self.rebuild_swapchain()?;
            return Ok(());
        }

        // 3. Acquire the presentable image.
        let image_available = self.frames.current().sync.image_available;
        let acquired = match self.swapchain.as_ref() {
            Some(swapchain) => swapchain.acquire_next_image(image_available),
            None => {
                return Err(RendererError::VulkanError(
                    "Swapchain missing outside a rebuild".into(),
                ))
            }
        };
        let (image_index, suboptimal) = match acquired {
            Ok(pair) => pair,
            Err(RendererError::SwapchainOutOfDate) => {
                self.resize_pending = true;
                self.rebuild_swapchain()?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if suboptimal {
            debug!("Swapchain suboptimal at acquire; continuing degraded");
        }

        // 4. Camera data for this slot. Safe to write now: step 1
        //    guarantees the GPU is done reading this slot's buffer.
        self.frames.current_mut().uniform.write(&CameraMatrices {
            model: Mat4::IDENTITY,
            view,
            proj,
        });

        // 5. Re-record the slot's command buffer.
        let slot = self.frames.current();
        slot.sync.reset_fence()?;
        let cmd = slot.command_buffer;
        unsafe {
            self.device
                .device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
        }
        self.record_command_buffer(cmd, image_index as usize, frame_index)?;

        // 6. Submit: color output waits for the acquired image, the
        //    fence and semaphore fire on completion.
        let slot = self.frames.current();
        let wait_semaphores = [slot.sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [slot.sync.render_finished];
        let command_buffers = [cmd];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.device.queue_submit(
                self.device.graphics_queue,
                &[submit_info],
                slot.sync.in_flight,
            )?;
        }

        // 7. Present once rendering completes. Degraded results flag a
        //    lazy rebuild for the next frame's step 2.
        let render_finished = slot.sync.render_finished;
        let present_result = match self.swapchain.as_ref() {
            Some(swapchain) => {
                swapchain.present(self.device.present_queue, image_index, render_finished)
            }
            None => {
                return Err(RendererError::VulkanError(
                    "Swapchain missing at present".into(),
                ))
            }
        };
        match present_result {
            Ok(suboptimal) => {
                if suboptimal {
                    self.resize_pending = true;
                }
            }
            Err(RendererError::SwapchainOutOfDate) => {
                self.resize_pending = true;
            }
            Err(e) => return Err(e),
        }

        Ok(())
    }

    /// Begin the buffer, run the render pass with the ordered draw pass
    /// list, end the buffer. Begin/end failures indicate pool or buffer
    /// misuse and are terminal.
    fn record_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        image_index: usize,
        frame_index: usize,
    ) -> Result<()> {
        let dev = &self.device.device;
        let extent = self.targets.extent();

        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::default();
            dev.begin_command_buffer(cmd, &begin_info)?;

            let clear_values = [
                vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: [0.0, 0.0, 0.0, 1.0],
                    },
                },
                vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: 1.0,
                        stencil: 0,
                    },
                },
            ];

            let render_pass_begin = vk::RenderPassBeginInfo::default()
                .render_pass(self.targets.render_pass())
                .framebuffer(self.targets.framebuffer(image_index)?)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D::default(),
                    extent,
                })
                .clear_values(&clear_values);

            dev.cmd_begin_render_pass(cmd, &render_pass_begin, vk::SubpassContents::INLINE);

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            let scissor = vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            };
            dev.cmd_set_viewport(cmd, 0, &[viewport]);
            dev.cmd_set_scissor(cmd, 0, &[scissor]);

            let ctx = RecordContext {
                device: dev,
                command_buffer: cmd,
                frame_index,
            };
            for pass in &self.draw_passes {
                pass.record(&ctx)?;
            }

            dev.cmd_end_render_pass(cmd);
            dev.end_command_buffer(cmd)?;
        }

        Ok(())
    }

    /// Swapchain rebuild: idle the device, tear the old chain fully down
    /// (framebuffers and depth first, then the swapchain), then build
    /// the replacement and its attachments. Deferred while the pending
    /// extent is zero-sized.
    fn rebuild_swapchain(&mut self) -> Result<()> {
        if rebuild_blocked(self.pending_extent) {
            debug!("Swapchain rebuild deferred: window is zero-sized");
            return Ok(());
        }

        info!(
            "Rebuilding swapchain at {}x{}",
            self.pending_extent.width, self.pending_extent.height
        );

        self.device.wait_idle()?;
        self.targets.release_swapchain_dependents();
        self.swapchain = None;

        let swapchain = SwapchainWrapper::new(&self.device, self.pending_extent)?;
        self.targets.rebuild(&self.device, &self.allocator, &swapchain)?;
        self.pending_extent = swapchain.extent;
        self.swapchain = Some(swapchain);
        self.resize_pending = false;

        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        info!("Shutting down PBR renderer...");
        let _ = self.device.wait_idle();
        // Fields drop in declaration order: passes and scene resources
        // first, allocator after everything allocated from it, device
        // last.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_extents_block_the_rebuild() {
        assert!(rebuild_blocked(vk::Extent2D {
            width: 0,
            height: 0
        }));
        assert!(rebuild_blocked(vk::Extent2D {
            width: 800,
            height: 0
        }));
        assert!(!rebuild_blocked(vk::Extent2D {
            width: 800,
            height: 600
        }));
    }

    #[test]
    fn resize_bookkeeping_recovers_after_restore() {
        // Shrink to 0x0: every rebuild attempt stays blocked.
        let mut pending = vk::Extent2D {
            width: 0,
            height: 0,
        };
        assert!(rebuild_blocked(pending));
        assert!(rebuild_blocked(pending)); // still blocked on the next frame

        // Restore to 800x600: the rebuild proceeds with exactly that
        // extent when the surface imposes no fixed size.
        pending = vk::Extent2D {
            width: 800,
            height: 600,
        };
        assert!(!rebuild_blocked(pending));
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };
        let chosen = crate::vulkan::swapchain::choose_extent(&caps, pending);
        assert_eq!((chosen.width, chosen.height), (800, 600));
    }
}
