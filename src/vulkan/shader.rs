use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use ash::util::read_spv;
use ash::vk;

use crate::{RendererError, Result};

/// Shader module loaded from a SPIR-V file. Entry point is always
/// `main`; the binding layout is part of the shader interface contract
/// and must match the descriptor set layouts the pipeline is built with.
pub struct ShaderModule {
    device: Arc<ash::Device>,
    handle: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
}

impl ShaderModule {
    pub fn from_file(
        device: Arc<ash::Device>,
        path: &Path,
        stage: vk::ShaderStageFlags,
    ) -> Result<Self> {
        let file = File::open(path).map_err(|e| RendererError::ShaderLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let code = read_spv(&mut BufReader::new(file)).map_err(|e| RendererError::ShaderLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let handle = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(|e| RendererError::ShaderLoad {
                    path: path.to_path_buf(),
                    message: format!("{e:?}"),
                })?
        };

        Ok(Self {
            device,
            handle,
            stage,
        })
    }

    pub fn stage_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage)
            .module(self.handle)
            .name(c"main")
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.handle, None);
        }
    }
}
