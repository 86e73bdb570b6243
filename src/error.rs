use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// Renderer error type.
///
/// Only [`RendererError::SwapchainOutOfDate`] is recoverable; the frame
/// driver handles it with a swapchain rebuild and a skipped frame. Every
/// other variant is terminal and should bubble up to the process entry
/// point.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("device initialization failed: {0}")]
    DeviceInitFailed(String),

    #[error("vulkan call failed: {0}")]
    VulkanError(String),

    #[error("swapchain out of date")]
    SwapchainOutOfDate,

    #[error("failed to load shader {path}: {message}")]
    ShaderLoad { path: PathBuf, message: String },

    #[error("malformed scene: {0}")]
    MalformedScene(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("image decode failed: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<vk::Result> for RendererError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_DATE_KHR => RendererError::SwapchainOutOfDate,
            other => RendererError::VulkanError(format!("{other:?}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, RendererError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_date_maps_to_recoverable_variant() {
        let err = RendererError::from(vk::Result::ERROR_OUT_OF_DATE_KHR);
        assert!(matches!(err, RendererError::SwapchainOutOfDate));
    }

    #[test]
    fn other_results_map_to_fatal_variant() {
        let err = RendererError::from(vk::Result::ERROR_DEVICE_LOST);
        assert!(matches!(err, RendererError::VulkanError(_)));
    }
}
