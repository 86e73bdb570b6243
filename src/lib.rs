//! Real-time physically based renderer built directly on Vulkan via ash.
//!
//! The crate owns device and resource setup, per-frame synchronization
//! with a configurable render-ahead depth, a single-pass color+depth
//! pipeline drawing a skybox and a PBR scene, and a one-time compute
//! stage that converts an equirectangular HDR image into a mip-mapped
//! environment cubemap.
//!
//! Windowing, scene loading, and camera math live outside the crate:
//! the window hands in a [`vulkan::SurfaceProvider`] and resize
//! notifications, the scene loader hands in a [`renderer::Scene`] built
//! from GPU-resident buffers and [`renderer::Texture`] objects, and the
//! caller passes view/projection matrices into
//! [`renderer::Renderer::draw_frame`].

pub mod config;
pub mod error;
pub mod renderer;
pub mod vulkan;

pub use config::{EnvironmentConfig, RendererConfig, ShaderPaths};
pub use error::{RendererError, Result};
pub use renderer::Renderer;
pub use vulkan::{SurfaceProvider, WindowSurfaceProvider};

/// Common imports for renderer users.
pub mod prelude {
    pub use crate::config::{EnvironmentConfig, RendererConfig, ShaderPaths};
    pub use crate::error::{RendererError, Result};
    pub use crate::renderer::{
        Material, Mesh, Node, Primitive, Renderer, Scene, Texture, TextureData, TextureSpec,
        Vertex,
    };
    pub use crate::vulkan::{GpuBuffer, SurfaceProvider, WindowSurfaceProvider};
}
