use std::ffi::CString;
use std::path::{Path, PathBuf};

use crate::{RendererError, Result};

/// Workgroup edge length of the equirect-to-cube compute shader. The
/// dispatch grid is `(size / 32, size / 32, 6)`, so the face size must be
/// a multiple of this.
pub const ENV_WORKGROUP_SIZE: u32 = 32;

fn builtin_shader(name: &str) -> PathBuf {
    Path::new(env!("OUT_DIR")).join(name)
}

/// Paths to the compiled SPIR-V shader stages. Entry point is always
/// `main`, and the binding layout must match the descriptor set layouts
/// the renderer creates.
#[derive(Clone, Debug)]
pub struct ShaderPaths {
    pub scene_vertex: PathBuf,
    pub scene_fragment: PathBuf,
    pub skybox_vertex: PathBuf,
    pub skybox_fragment: PathBuf,
    pub equirect_to_cube: PathBuf,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            scene_vertex: builtin_shader("pbr.vert.spv"),
            scene_fragment: builtin_shader("pbr.frag.spv"),
            skybox_vertex: builtin_shader("skybox.vert.spv"),
            skybox_fragment: builtin_shader("skybox.frag.spv"),
            equirect_to_cube: builtin_shader("equirect_to_cube.comp.spv"),
        }
    }
}

/// Environment map settings for the one-time prefilter stage.
#[derive(Clone, Debug)]
pub struct EnvironmentConfig {
    /// Equirectangular HDR source image.
    pub hdr_path: PathBuf,
    /// Cubemap face edge length. Must be a non-zero multiple of
    /// [`ENV_WORKGROUP_SIZE`].
    pub face_size: u32,
}

impl EnvironmentConfig {
    pub fn new(hdr_path: impl Into<PathBuf>) -> Self {
        Self {
            hdr_path: hdr_path.into(),
            face_size: 1024,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_face_size(self.face_size)
    }
}

/// Rejects face sizes the compute dispatch cannot cover exactly. Edge
/// texels would otherwise be left undefined by the 32x32 workgroups.
pub fn validate_face_size(size: u32) -> Result<()> {
    if size == 0 {
        return Err(RendererError::InvalidConfig(
            "environment face size must be non-zero".into(),
        ));
    }
    if size % ENV_WORKGROUP_SIZE != 0 {
        return Err(RendererError::InvalidConfig(format!(
            "environment face size {size} is not a multiple of {ENV_WORKGROUP_SIZE}"
        )));
    }
    Ok(())
}

/// Top-level renderer configuration.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Enable Vulkan validation layers. A requested layer that is not
    /// installed is a fatal setup error.
    pub enable_validation: bool,
    pub validation_layers: Vec<CString>,
    /// Device extensions the logical device must support. A missing
    /// extension is a fatal setup error.
    pub device_extensions: Vec<CString>,
    /// Number of frames the CPU may record ahead of the GPU.
    pub frames_in_flight: usize,
    pub shaders: ShaderPaths,
    pub environment: EnvironmentConfig,
}

impl RendererConfig {
    pub fn new(environment: EnvironmentConfig) -> Self {
        Self {
            enable_validation: cfg!(all(debug_assertions, feature = "validation")),
            validation_layers: vec![c"VK_LAYER_KHRONOS_validation".to_owned()],
            device_extensions: vec![ash::khr::swapchain::NAME.to_owned()],
            frames_in_flight: 2,
            shaders: ShaderPaths::default(),
            environment,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(RendererError::InvalidConfig(
                "frames_in_flight must be at least 1".into(),
            ));
        }
        self.environment.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_size_accepts_workgroup_multiples() {
        for size in [32, 64, 256, 1024, 2048] {
            assert!(validate_face_size(size).is_ok());
        }
    }

    #[test]
    fn face_size_rejects_zero_and_remainders() {
        for size in [0, 1, 31, 33, 100, 1000] {
            assert!(validate_face_size(size).is_err());
        }
    }

    #[test]
    fn zero_frames_in_flight_is_invalid() {
        let mut config = RendererConfig::new(EnvironmentConfig::new("environment.hdr"));
        config.frames_in_flight = 0;
        assert!(config.validate().is_err());
    }
}
