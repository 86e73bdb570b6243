//! High-level renderer: frame driver, render targets, scene and texture
//! interfaces, and the one-time environment prefilter stage.

pub mod depth_buffer;
pub mod draw_pass;
pub mod environment;
pub mod frame;
pub mod render_target;
#[allow(clippy::module_inception)]
pub mod renderer;
pub mod scene;
pub mod texture;
pub mod uniform;

pub use depth_buffer::DepthBuffer;
pub use draw_pass::{DrawPass, RecordContext, ScenePass, SkyboxPass};
pub use environment::EnvironmentMap;
pub use frame::{slot_for_frame, FrameSlot, FrameSlots};
pub use render_target::RenderTargetSet;
pub use renderer::Renderer;
pub use scene::{Material, Mesh, Node, Primitive, PrimitiveDraw, Scene, Vertex};
pub use texture::{mip_extent, mip_level_count, Texture, TextureData, TextureSpec, TextureView};
pub use uniform::{CameraMatrices, UniformBuffer};
