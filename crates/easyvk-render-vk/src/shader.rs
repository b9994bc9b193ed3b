// SPDX-License-Identifier: CEPL-1.0
use std::io::Cursor;
use std::path::{Path, PathBuf};

use ash::util::read_spv;
use ash::vk;
use tracing::debug;

use crate::{NativeResultExt, VkError, VkResult};

pub const ENTRY_POINT: &std::ffi::CStr = c"main";

pub struct ShaderModule {
    device: ash::Device,
    handle: vk::ShaderModule,
}

impl ShaderModule {
    /// Loads SPIR-V from `path`.
    pub fn from_file(device: &ash::Device, path: &Path) -> VkResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| VkError::Shader {
            path: path.to_path_buf(),
            source,
        })?;
        let module = Self::from_bytes(device, &bytes).map_err(|e| match e {
            VkError::Shader { source, .. } => VkError::Shader {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        debug!("shader module from {}", path.display());
        Ok(module)
    }

    pub fn from_bytes(device: &ash::Device, bytes: &[u8]) -> VkResult<Self> {
        let code = read_spv(&mut Cursor::new(bytes)).map_err(|source| VkError::Shader {
            path: PathBuf::new(),
            source,
        })?;
        let info = vk::ShaderModuleCreateInfo::default().code(&code);
        let handle = unsafe { device.create_shader_module(&info, None) }
            .native("vkCreateShaderModule")?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    /// Stage description using the `main` entry point. Only valid while this
    /// module is alive.
    pub fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo<'static> {
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage,
            module: self.handle,
            p_name: ENTRY_POINT.as_ptr(),
            ..Default::default()
        }
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        if self.handle != vk::ShaderModule::null() {
            unsafe { self.device.destroy_shader_module(self.handle, None) };
        }
    }
}

/// Directory holding the bundled triangle shaders, resolved at build time.
pub fn bundled_shader_dir() -> &'static Path {
    Path::new(env!("EASYVK_SHADER_DIR"))
}

/// Vertex and fragment shader files for the triangle pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        let dir = bundled_shader_dir();
        Self {
            vertex: dir.join("triangle.vert.spv"),
            fragment: dir.join("triangle.frag.spv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misaligned_spirv_is_rejected_before_any_device_call() {
        let err = read_spv(&mut Cursor::new(&[0x03u8, 0x02, 0x23][..])).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn default_paths_live_in_the_bundled_dir() {
        let p = ShaderPaths::default();
        assert!(p.vertex.starts_with(bundled_shader_dir()));
        assert_eq!(p.vertex.file_name().unwrap(), "triangle.vert.spv");
        assert_eq!(p.fragment.file_name().unwrap(), "triangle.frag.spv");
    }
}
