//! Minimal viewer: a single textured cube under a prefiltered
//! environment sky, with an orbiting camera.
//!
//! Usage: `cargo run --example viewer -- path/to/environment.hdr`

use std::process::ExitCode;
use std::time::Instant;

use ash::vk;
use pbr_renderer::prelude::*;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

fn cube_geometry() -> (Vec<Vertex>, Vec<u32>) {
    let face = |normal: [f32; 3], corners: [[f32; 3]; 4]| -> Vec<Vertex> {
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        corners
            .iter()
            .zip(uvs)
            .map(|(&position, uv0)| Vertex {
                position,
                normal,
                uv0,
                uv1: uv0,
                color: [1.0, 1.0, 1.0, 1.0],
            })
            .collect()
    };

    let mut vertices = Vec::new();
    vertices.extend(face(
        [0.0, 0.0, 1.0],
        [
            [-0.5, -0.5, 0.5],
            [0.5, -0.5, 0.5],
            [0.5, 0.5, 0.5],
            [-0.5, 0.5, 0.5],
        ],
    ));
    vertices.extend(face(
        [0.0, 0.0, -1.0],
        [
            [0.5, -0.5, -0.5],
            [-0.5, -0.5, -0.5],
            [-0.5, 0.5, -0.5],
            [0.5, 0.5, -0.5],
        ],
    ));
    vertices.extend(face(
        [1.0, 0.0, 0.0],
        [
            [0.5, -0.5, 0.5],
            [0.5, -0.5, -0.5],
            [0.5, 0.5, -0.5],
            [0.5, 0.5, 0.5],
        ],
    ));
    vertices.extend(face(
        [-1.0, 0.0, 0.0],
        [
            [-0.5, -0.5, -0.5],
            [-0.5, -0.5, 0.5],
            [-0.5, 0.5, 0.5],
            [-0.5, 0.5, -0.5],
        ],
    ));
    vertices.extend(face(
        [0.0, 1.0, 0.0],
        [
            [-0.5, 0.5, 0.5],
            [0.5, 0.5, 0.5],
            [0.5, 0.5, -0.5],
            [-0.5, 0.5, -0.5],
        ],
    ));
    vertices.extend(face(
        [0.0, -1.0, 0.0],
        [
            [-0.5, -0.5, -0.5],
            [0.5, -0.5, -0.5],
            [0.5, -0.5, 0.5],
            [-0.5, -0.5, 0.5],
        ],
    ));

    let mut indices = Vec::with_capacity(36);
    for quad in 0..6u32 {
        let base = quad * 4;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    (vertices, indices)
}

fn build_demo_scene(renderer: &Renderer) -> Result<Scene> {
    let device = renderer.device();
    let allocator = renderer.allocator();
    let pool = renderer.command_pool();

    let solid = |rgba: [u8; 4], format: vk::Format| -> Result<Texture> {
        Texture::from_data(
            device,
            allocator,
            pool,
            &TextureData::solid_color(rgba),
            format,
        )
    };

    let material = Material {
        base_color: solid([200, 66, 45, 255], vk::Format::R8G8B8A8_SRGB)?,
        // glTF convention: roughness in G, metallic in B.
        metallic_roughness: solid([0, 110, 40, 255], vk::Format::R8G8B8A8_UNORM)?,
        normal: solid([128, 128, 255, 255], vk::Format::R8G8B8A8_UNORM)?,
        occlusion: solid([255, 255, 255, 255], vk::Format::R8G8B8A8_UNORM)?,
        emissive: solid([0, 0, 0, 255], vk::Format::R8G8B8A8_SRGB)?,
    };

    let (vertices, indices) = cube_geometry();
    let vertex_buffer = GpuBuffer::device_local_with_data(
        &device.device,
        allocator,
        pool,
        device.graphics_queue,
        vk::BufferUsageFlags::VERTEX_BUFFER,
        &vertices,
    )?;
    let index_count = indices.len() as u32;
    let index_buffer = GpuBuffer::device_local_with_data(
        &device.device,
        allocator,
        pool,
        device.graphics_queue,
        vk::BufferUsageFlags::INDEX_BUFFER,
        &indices,
    )?;

    Ok(Scene {
        vertex_buffer,
        index_buffer,
        meshes: vec![Mesh {
            primitives: vec![Primitive {
                first_index: 0,
                index_count,
                material_index: None,
            }],
        }],
        nodes: vec![Node {
            mesh: Some(0),
            children: Vec::new(),
        }],
        roots: vec![0],
        materials: vec![material],
    })
}

#[derive(Default)]
struct App {
    window: Option<Window>,
    renderer: Option<Renderer>,
    start: Option<Instant>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let window_attrs = Window::default_attributes()
            .with_title("PBR Renderer - Viewer")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => window,
            Err(e) => {
                log::error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let hdr_path = std::env::args()
            .nth(1)
            .unwrap_or_else(|| "assets/environment.hdr".to_string());
        let config = RendererConfig::new(EnvironmentConfig::new(hdr_path));

        let size = window.inner_size();
        let provider = WindowSurfaceProvider::new(&window, size.width, size.height);

        let setup = Renderer::new(&provider, config)
            .and_then(|mut renderer| {
                let scene = build_demo_scene(&renderer)?;
                renderer.install_scene(scene)?;
                Ok(renderer)
            });

        match setup {
            Ok(renderer) => {
                self.renderer = Some(renderer);
                self.start = Some(Instant::now());
            }
            Err(e) => {
                log::error!("Renderer setup failed: {e}");
                std::process::exit(1);
            }
        }

        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.notify_resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let (Some(renderer), Some(start)) = (&mut self.renderer, self.start) {
                    let angle = start.elapsed().as_secs_f32() * 0.4;
                    let camera_pos =
                        glam::Vec3::new(3.0 * angle.cos(), 1.5, 3.0 * angle.sin());
                    let view =
                        glam::Mat4::look_at_rh(camera_pos, glam::Vec3::ZERO, glam::Vec3::Y);
                    let mut proj = glam::Mat4::perspective_rh(
                        45.0_f32.to_radians(),
                        renderer.aspect_ratio(),
                        0.1,
                        100.0,
                    );
                    proj.y_axis.y *= -1.0; // Vulkan Y-flip

                    if let Err(e) = renderer.draw_frame(view, proj) {
                        log::error!("Fatal render error: {e}");
                        std::process::exit(1);
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {e}");
            return ExitCode::FAILURE;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::default();
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
