//! Low-level Vulkan wrappers. Each type owns exactly the handles it
//! creates and releases them on drop, so every setup error path unwinds
//! cleanly.

pub mod allocator;
pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod framebuffer;
pub mod image;
pub mod instance;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use allocator::Allocator;
pub use buffer::GpuBuffer;
pub use command::CommandPool;
pub use descriptor::{
    scene_pool_sizes, DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, PoolSizes,
};
pub use device::VulkanDevice;
pub use framebuffer::Framebuffer;
pub use image::ImageBarrier;
pub use instance::VulkanInstance;
pub use pipeline::{ComputePipeline, Pipeline, PipelineLayout, VertexInput};
pub use render_pass::RenderPass;
pub use shader::ShaderModule;
pub use surface::{SurfaceProvider, WindowSurfaceProvider};
pub use swapchain::SwapchainWrapper;
pub use sync::FrameSync;
