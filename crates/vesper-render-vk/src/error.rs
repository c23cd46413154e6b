// SPDX-License-Identifier: CEPL-1.0
use ash::{prelude::VkResult, vk};
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VkError {
    #[error("failed to load the Vulkan loader: {0}")]
    Loading(#[from] ash::LoadingError),
    #[error("no physical device can render and present to this surface")]
    NoSuitableDevice,
    #[error("surface reports no formats")]
    NoSurfaceFormat,
    #[error("failed to read shader {path}: {source}")]
    ShaderRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("shader {path} is not valid SPIR-V: {source}")]
    ShaderDecode {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{op} failed: {result:?}")]
    Call { op: &'static str, result: vk::Result },
}

/// Tags a raw Vulkan result with the name of the call that produced it.
pub(crate) trait VkCall<T> {
    fn call(self, op: &'static str) -> Result<T, VkError>;
}

impl<T> VkCall<T> for VkResult<T> {
    fn call(self, op: &'static str) -> Result<T, VkError> {
        self.map_err(|result| VkError::Call { op, result })
    }
}
