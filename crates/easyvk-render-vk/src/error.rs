// SPDX-License-Identifier: CEPL-1.0
use std::path::PathBuf;

use ash::vk;
use tracing::error;

#[derive(thiserror::Error, Debug)]
pub enum VkError {
    #[error("{call} failed: {code:?}")]
    Native {
        call: &'static str,
        code: vk::Result,
    },

    #[error("failed to load the Vulkan library: {0}")]
    Loader(#[from] ash::LoadingError),

    #[error("window handle unavailable: {0}")]
    Window(#[from] raw_window_handle::HandleError),

    #[error("physical device {index} lacks a requested queue family")]
    NoQueueFamilies { index: usize },

    #[error("{0} has not been created yet")]
    NotReady(&'static str),

    #[error("failed to load shader {path}: {source}")]
    Shader {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl VkError {
    /// The native result code, when the failure came from a Vulkan call.
    pub fn code(&self) -> Option<vk::Result> {
        match self {
            VkError::Native { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type VkResult<T> = Result<T, VkError>;

/// Tags an `ash` result with the name of the native call and logs failures.
pub trait NativeResultExt<T> {
    fn native(self, call: &'static str) -> VkResult<T>;
}

impl<T> NativeResultExt<T> for Result<T, vk::Result> {
    fn native(self, call: &'static str) -> VkResult<T> {
        self.map_err(|code| {
            error!(call, code = code.as_raw(), "native call failed: {code:?}");
            VkError::Native { call, code }
        })
    }
}

/// Unrecoverable environment failure: log and abort the process.
pub(crate) fn fatal(msg: &str) -> ! {
    error!("{msg}");
    std::process::abort()
}
